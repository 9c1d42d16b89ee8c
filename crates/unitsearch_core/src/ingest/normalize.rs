//! Conversion of validated raw sheets into the canonical dataset.
//!
//! # Responsibility
//! - Trim text, deduplicate keyword and generation sets.
//! - Coerce weights to numbers and order unit memberships.
//! - Treat absent optional sheets as empty.
//!
//! # Invariants
//! - Output is fully determined by input content (no hash-order dependence).
//! - Rows referencing unknown ids are dropped, never panicked on; the
//!   validator is responsible for rejecting them first.

use crate::ingest::sheet::{cell, RawRow, RawSheet, SheetBundle};
use crate::ingest::validate::parse_weight;
use crate::ingest::{
    MEMBERS_SHEET, MEMBER_ALIASES_SHEET, MEMBER_GENERATIONS_SHEET, UNITS_SHEET,
    UNIT_ALIASES_SHEET, UNIT_MEMBERS_SHEET,
};
use crate::model::dataset::Dataset;
use crate::model::member::Member;
use crate::model::unit::{sort_memberships, Unit, UnitMembership};
use std::collections::BTreeMap;

/// Weight assigned to membership rows with a blank weight cell.
///
/// Large enough that unweighted members sort after weighted ones.
pub const DEFAULT_MEMBERSHIP_WEIGHT: f64 = 9999.0;

/// Tunables for normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeOptions {
    pub default_weight: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            default_weight: DEFAULT_MEMBERSHIP_WEIGHT,
        }
    }
}

/// Normalizes a validated bundle into a [`Dataset`].
///
/// Call [`crate::ingest::validate::validate_bundle`] first; this function does
/// not report problems, it only skips what it cannot place.
pub fn normalize_bundle(bundle: &SheetBundle, options: &NormalizeOptions) -> Dataset {
    let mut members = collect_members(bundle.sheet(MEMBERS_SHEET));
    apply_generations(&mut members, bundle.sheet(MEMBER_GENERATIONS_SHEET));
    apply_member_aliases(&mut members, bundle.sheet(MEMBER_ALIASES_SHEET));

    let mut units = collect_units(bundle.sheet(UNITS_SHEET));
    apply_unit_aliases(&mut units, bundle.sheet(UNIT_ALIASES_SHEET));
    apply_memberships(
        &mut units,
        &members,
        bundle.sheet(UNIT_MEMBERS_SHEET),
        options.default_weight,
    );

    Dataset {
        members: members.into_values().collect(),
        units: units.into_values().collect(),
    }
}

fn rows(sheet: Option<&RawSheet>) -> impl Iterator<Item = &RawRow> {
    sheet
        .into_iter()
        .flat_map(|sheet| sheet.data_rows().map(|(_, row)| row))
}

fn collect_members(sheet: Option<&RawSheet>) -> BTreeMap<String, Member> {
    let mut members = BTreeMap::new();
    for row in rows(sheet) {
        let id = cell(row, "id");
        if id.is_empty() || members.contains_key(id) {
            continue;
        }

        let display_name = non_blank_or(cell(row, "display_name"), id);
        let mut member = Member::new(id, display_name, cell(row, "branch"), cell(row, "status"));
        let inline_alias = cell(row, "alias");
        if !inline_alias.is_empty() {
            member.keywords.insert(inline_alias.to_string());
        }
        members.insert(id.to_string(), member);
    }
    members
}

fn apply_generations(members: &mut BTreeMap<String, Member>, sheet: Option<&RawSheet>) {
    for row in rows(sheet) {
        let generation = cell(row, "generation");
        let Some(member) = members.get_mut(cell(row, "member_id")) else {
            continue;
        };
        if generation.is_empty() {
            continue;
        }

        member.generations.insert(generation.to_string());
        if member.primary_generation.is_none() && is_truthy(cell(row, "is_primary")) {
            member.primary_generation = Some(generation.to_string());
        }
    }
}

fn apply_member_aliases(members: &mut BTreeMap<String, Member>, sheet: Option<&RawSheet>) {
    for row in rows(sheet) {
        let alias = cell(row, "alias");
        if alias.is_empty() {
            continue;
        }
        if let Some(member) = members.get_mut(cell(row, "member_id")) {
            member.keywords.insert(alias.to_string());
        }
    }
}

fn collect_units(sheet: Option<&RawSheet>) -> BTreeMap<String, Unit> {
    let mut units = BTreeMap::new();
    for row in rows(sheet) {
        let id = cell(row, "id");
        if id.is_empty() || units.contains_key(id) {
            continue;
        }

        let mut unit = Unit::new(id, non_blank_or(cell(row, "display_name"), id));
        let note = cell(row, "note");
        if !note.is_empty() {
            unit.note = Some(note.to_string());
        }
        units.insert(id.to_string(), unit);
    }
    units
}

fn apply_unit_aliases(units: &mut BTreeMap<String, Unit>, sheet: Option<&RawSheet>) {
    for row in rows(sheet) {
        let alias = cell(row, "alias");
        if alias.is_empty() {
            continue;
        }
        if let Some(unit) = units.get_mut(cell(row, "unit_id")) {
            unit.aliases.insert(alias.to_string());
        }
    }
}

fn apply_memberships(
    units: &mut BTreeMap<String, Unit>,
    members: &BTreeMap<String, Member>,
    sheet: Option<&RawSheet>,
    default_weight: f64,
) {
    for row in rows(sheet) {
        let member_id = cell(row, "member_id");
        if !members.contains_key(member_id) {
            continue;
        }
        let Some(unit) = units.get_mut(cell(row, "unit_id")) else {
            continue;
        };
        if unit.contains(member_id) {
            continue;
        }

        let weight = parse_weight(cell(row, "weight"))
            .ok()
            .flatten()
            .unwrap_or(default_weight);
        unit.members.push(UnitMembership {
            member_id: member_id.to_string(),
            weight,
        });
    }

    for unit in units.values_mut() {
        sort_memberships(&mut unit.members);
    }
}

fn non_blank_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y" | "t"
    )
}
