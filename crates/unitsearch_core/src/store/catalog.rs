//! Immutable in-memory catalog over one normalized dataset.
//!
//! # Responsibility
//! - Index members and units by id for point lookups.
//! - Serve filtered member listings and ordered unit membership.
//! - Expose facet values for filter selectors.
//!
//! # Invariants
//! - Members and units are held sorted by id.
//! - Unit memberships are held in display order (weight asc, member id asc).

use crate::model::dataset::Dataset;
use crate::model::member::Member;
use crate::model::unit::{sort_memberships, Unit, UnitMembership};
use crate::store::filter::MemberFilter;
use crate::store::NotFound;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Unit metadata plus its members in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitDetail {
    pub id: String,
    pub display_name: String,
    pub note: Option<String>,
    pub aliases: Vec<String>,
    pub members: Vec<UnitMembership>,
}

impl UnitDetail {
    /// Member ids in display order.
    pub fn member_ids(&self) -> Vec<&str> {
        self.members
            .iter()
            .map(|entry| entry.member_id.as_str())
            .collect()
    }
}

/// Distinct filter values present in the catalog, each sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub branches: Vec<String>,
    pub statuses: Vec<String>,
    pub generations: Vec<String>,
}

/// Read-only view over one committed dataset.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    dataset: Dataset,
    member_positions: HashMap<String, usize>,
    unit_positions: HashMap<String, usize>,
    /// Unit positions per member position, ascending.
    units_by_member: Vec<Vec<usize>>,
}

impl Catalog {
    /// Builds a catalog, restoring sort invariants if the caller broke them.
    pub fn new(mut dataset: Dataset) -> Self {
        dataset.members.sort_by(|left, right| left.id.cmp(&right.id));
        dataset.units.sort_by(|left, right| left.id.cmp(&right.id));
        for unit in &mut dataset.units {
            sort_memberships(&mut unit.members);
        }

        let member_positions: HashMap<String, usize> = dataset
            .members
            .iter()
            .enumerate()
            .map(|(position, member)| (member.id.clone(), position))
            .collect();
        let unit_positions: HashMap<String, usize> = dataset
            .units
            .iter()
            .enumerate()
            .map(|(position, unit)| (unit.id.clone(), position))
            .collect();

        let mut units_by_member = vec![Vec::new(); dataset.members.len()];
        for (unit_position, unit) in dataset.units.iter().enumerate() {
            for entry in &unit.members {
                if let Some(member_position) = member_positions.get(&entry.member_id) {
                    units_by_member[*member_position].push(unit_position);
                }
            }
        }

        Self {
            dataset,
            member_positions,
            unit_positions,
            units_by_member,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// All members sorted by id.
    pub fn members(&self) -> &[Member] {
        &self.dataset.members
    }

    /// All units sorted by id.
    pub fn units(&self) -> &[Unit] {
        &self.dataset.units
    }

    pub fn member_count(&self) -> usize {
        self.dataset.members.len()
    }

    pub fn unit_count(&self) -> usize {
        self.dataset.units.len()
    }

    /// Position of a member in [`Catalog::members`].
    pub fn member_position(&self, member_id: &str) -> Option<usize> {
        self.member_positions.get(member_id).copied()
    }

    /// Position of a unit in [`Catalog::units`].
    pub fn unit_position(&self, unit_id: &str) -> Option<usize> {
        self.unit_positions.get(unit_id).copied()
    }

    pub fn member(&self, member_id: &str) -> Result<&Member, NotFound> {
        self.member_position(member_id)
            .map(|position| &self.dataset.members[position])
            .ok_or_else(|| NotFound::member(member_id))
    }

    pub fn unit(&self, unit_id: &str) -> Result<&Unit, NotFound> {
        self.unit_position(unit_id)
            .map(|position| &self.dataset.units[position])
            .ok_or_else(|| NotFound::unit(unit_id))
    }

    /// Members matching `filter`, sorted by id.
    pub fn list_members(&self, filter: &MemberFilter) -> Vec<&Member> {
        self.dataset
            .members
            .iter()
            .filter(|member| filter.matches(member))
            .collect()
    }

    /// Member ids of a unit ordered by weight, ties by member id.
    pub fn unit_members(&self, unit_id: &str) -> Result<Vec<&str>, NotFound> {
        let unit = self.unit(unit_id)?;
        Ok(unit
            .members
            .iter()
            .map(|entry| entry.member_id.as_str())
            .collect())
    }

    /// Owned unit metadata with ordered memberships.
    pub fn unit_detail(&self, unit_id: &str) -> Result<UnitDetail, NotFound> {
        let unit = self.unit(unit_id)?;
        Ok(UnitDetail {
            id: unit.id.clone(),
            display_name: unit.display_name.clone(),
            note: unit.note.clone(),
            aliases: unit.aliases.iter().cloned().collect(),
            members: unit.members.clone(),
        })
    }

    /// Unit ids a member belongs to, sorted.
    pub fn units_of(&self, member_id: &str) -> Result<Vec<&str>, NotFound> {
        let position = self
            .member_position(member_id)
            .ok_or_else(|| NotFound::member(member_id))?;
        Ok(self.units_by_member[position]
            .iter()
            .map(|unit_position| self.dataset.units[*unit_position].id.as_str())
            .collect())
    }

    /// Distinct branch, status and generation values.
    pub fn facets(&self) -> Facets {
        let mut branches = BTreeSet::new();
        let mut statuses = BTreeSet::new();
        let mut generations = BTreeSet::new();
        for member in &self.dataset.members {
            if !member.branch.is_empty() {
                branches.insert(member.branch.clone());
            }
            if !member.status.is_empty() {
                statuses.insert(member.status.clone());
            }
            generations.extend(member.generations.iter().cloned());
        }
        Facets {
            branches: branches.into_iter().collect(),
            statuses: statuses.into_iter().collect(),
            generations: generations.into_iter().collect(),
        }
    }
}
