//! Schema and referential validation of raw sheet bundles.
//!
//! # Responsibility
//! - Reject bundles that cannot be normalized into a consistent roster.
//! - Report every violation with enough context (sheet, column, row, key) to
//!   fix the source without re-running.
//!
//! # Invariants
//! - Validation has no side effects.
//! - A missing required sheet short-circuits all later checks.
//! - Sheets lacking a required column are excluded from value, key and
//!   reference checks so one header problem does not cascade.

use crate::ingest::sheet::{cell, RawSheet, SheetBundle};
use crate::ingest::{
    SheetSchema, MEMBERS_SHEET, MEMBER_ALIASES_SHEET, MEMBER_GENERATIONS_SHEET, REQUIRED_SHEETS,
    SHEET_SCHEMAS, UNITS_SHEET, UNIT_ALIASES_SHEET, UNIT_MEMBERS_SHEET,
};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// What is wrong with a column or cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaIssue {
    /// Column absent from the sheet header.
    MissingColumn,
    /// Key cell is blank.
    BlankValue,
    /// Weight cell is not a finite number.
    InvalidNumber(String),
}

/// Single validation violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required sheets are absent (sorted names).
    MissingSheet { sheets: Vec<String> },
    /// Missing or malformed column.
    Schema {
        sheet: String,
        column: String,
        /// `None` for header problems, `Some(row)` for cell problems.
        row: Option<usize>,
        issue: SchemaIssue,
    },
    /// Primary key repeated within a sheet.
    DuplicateKey {
        sheet: String,
        key: String,
        row: usize,
        first_row: usize,
    },
    /// Reference to an id that does not exist in the target sheet.
    ReferentialIntegrity {
        sheet: String,
        column: String,
        row: usize,
        value: String,
        target: String,
    },
}

impl ValidationError {
    /// Stable code used in log events and by transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingSheet { .. } => "missing_sheet",
            Self::Schema { .. } => "schema",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::ReferentialIntegrity { .. } => "referential_integrity",
        }
    }

    /// Sheet the violation belongs to; the first absent sheet for `MissingSheet`.
    pub fn sheet(&self) -> &str {
        match self {
            Self::MissingSheet { sheets } => sheets.first().map_or("", String::as_str),
            Self::Schema { sheet, .. }
            | Self::DuplicateKey { sheet, .. }
            | Self::ReferentialIntegrity { sheet, .. } => sheet,
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSheet { sheets } => {
                write!(f, "missing required sheet(s): {}", sheets.join(","))
            }
            Self::Schema {
                sheet,
                column,
                row: None,
                issue,
            } => write!(f, "schema error in `{sheet}`.`{column}`: {issue}"),
            Self::Schema {
                sheet,
                column,
                row: Some(row),
                issue,
            } => write!(f, "schema error in `{sheet}`.`{column}` at row {row}: {issue}"),
            Self::DuplicateKey {
                sheet,
                key,
                row,
                first_row,
            } => write!(
                f,
                "duplicate key `{key}` in `{sheet}` at row {row} (first seen at row {first_row})"
            ),
            Self::ReferentialIntegrity {
                sheet,
                column,
                row,
                value,
                target,
            } => write!(
                f,
                "dangling reference `{value}` in `{sheet}`.`{column}` at row {row}: not found in `{target}`"
            ),
        }
    }
}

impl Display for SchemaIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumn => write!(f, "missing column"),
            Self::BlankValue => write!(f, "blank value"),
            Self::InvalidNumber(value) => write!(f, "`{value}` is not a finite number"),
        }
    }
}

impl Error for ValidationError {}

/// Non-empty list of violations, in check order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// First violation in check order.
    pub fn first(&self) -> &ValidationError {
        &self.errors[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.errors
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first())?;
        if self.errors.len() > 1 {
            write!(f, " (+{} more)", self.errors.len() - 1)?;
        }
        Ok(())
    }
}

impl Error for ValidationErrors {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.first())
    }
}

/// Validates a raw bundle against sheet, column, key and reference rules.
///
/// # Errors
/// - `MissingSheet` alone when any required sheet is absent.
/// - Otherwise every `Schema`, `DuplicateKey` and `ReferentialIntegrity`
///   violation found, header problems first.
pub fn validate_bundle(bundle: &SheetBundle) -> Result<(), ValidationErrors> {
    let missing: Vec<String> = REQUIRED_SHEETS
        .iter()
        .filter(|name| !bundle.contains(name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationErrors {
            errors: vec![ValidationError::MissingSheet { sheets: missing }],
        });
    }

    let mut errors = Vec::new();
    let usable = check_columns(bundle, &mut errors);

    for (schema, sheet) in &usable {
        check_cells(schema, sheet, &mut errors);
    }

    let sheet_of = |name: &str| {
        usable
            .iter()
            .find(|(schema, _)| schema.name == name)
            .map(|(_, sheet)| *sheet)
    };

    let member_ids = sheet_of(MEMBERS_SHEET).map(|sheet| unique_ids(MEMBERS_SHEET, sheet, &mut errors));
    let unit_ids = sheet_of(UNITS_SHEET).map(|sheet| unique_ids(UNITS_SHEET, sheet, &mut errors));
    if let Some(sheet) = sheet_of(UNIT_MEMBERS_SHEET) {
        check_unique_memberships(sheet, &mut errors);
    }

    if let Some(member_ids) = &member_ids {
        for name in [MEMBER_GENERATIONS_SHEET, UNIT_MEMBERS_SHEET, MEMBER_ALIASES_SHEET] {
            if let Some(sheet) = sheet_of(name) {
                check_references(name, sheet, "member_id", member_ids, MEMBERS_SHEET, &mut errors);
            }
        }
    }
    if let Some(unit_ids) = &unit_ids {
        for name in [UNIT_MEMBERS_SHEET, UNIT_ALIASES_SHEET] {
            if let Some(sheet) = sheet_of(name) {
                check_references(name, sheet, "unit_id", unit_ids, UNITS_SHEET, &mut errors);
            }
        }
    }

    match ValidationErrors::from_vec(errors) {
        Some(errors) => Err(errors),
        None => Ok(()),
    }
}

/// Parses a weight cell. Blank cells yield `Ok(None)`.
pub(crate) fn parse_weight(value: &str) -> Result<Option<f64>, SchemaIssue> {
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<f64>() {
        Ok(weight) if weight.is_finite() => Ok(Some(weight)),
        _ => Err(SchemaIssue::InvalidNumber(value.to_string())),
    }
}

fn check_columns<'b>(
    bundle: &'b SheetBundle,
    errors: &mut Vec<ValidationError>,
) -> Vec<(SheetSchema, &'b RawSheet)> {
    let mut usable = Vec::new();
    for schema in SHEET_SCHEMAS {
        let Some(sheet) = bundle.sheet(schema.name) else {
            continue;
        };

        let before = errors.len();
        for column in schema.required {
            if !sheet.has_column(column) {
                errors.push(ValidationError::Schema {
                    sheet: schema.name.to_string(),
                    column: column.to_string(),
                    row: None,
                    issue: SchemaIssue::MissingColumn,
                });
            }
        }
        if errors.len() == before {
            usable.push((schema, sheet));
        }
    }
    usable
}

fn check_cells(schema: &SheetSchema, sheet: &RawSheet, errors: &mut Vec<ValidationError>) {
    for (row_index, row) in sheet.data_rows() {
        for column in schema.keys {
            if cell(row, column).is_empty() {
                errors.push(ValidationError::Schema {
                    sheet: schema.name.to_string(),
                    column: column.to_string(),
                    row: Some(row_index),
                    issue: SchemaIssue::BlankValue,
                });
            }
        }

        if schema.name == UNIT_MEMBERS_SHEET {
            if let Err(issue) = parse_weight(cell(row, "weight")) {
                errors.push(ValidationError::Schema {
                    sheet: schema.name.to_string(),
                    column: "weight".to_string(),
                    row: Some(row_index),
                    issue,
                });
            }
        }
    }
}

fn unique_ids<'s>(
    sheet_name: &str,
    sheet: &'s RawSheet,
    errors: &mut Vec<ValidationError>,
) -> BTreeSet<&'s str> {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for (row_index, row) in sheet.data_rows() {
        let id = cell(row, "id");
        if id.is_empty() {
            continue;
        }
        if let Some(first_row) = seen.get(id) {
            errors.push(ValidationError::DuplicateKey {
                sheet: sheet_name.to_string(),
                key: id.to_string(),
                row: row_index,
                first_row: *first_row,
            });
        } else {
            seen.insert(id, row_index);
        }
    }
    seen.into_keys().collect()
}

fn check_unique_memberships(sheet: &RawSheet, errors: &mut Vec<ValidationError>) {
    let mut seen: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for (row_index, row) in sheet.data_rows() {
        let unit_id = cell(row, "unit_id");
        let member_id = cell(row, "member_id");
        if unit_id.is_empty() || member_id.is_empty() {
            continue;
        }
        if let Some(first_row) = seen.get(&(unit_id, member_id)) {
            errors.push(ValidationError::DuplicateKey {
                sheet: UNIT_MEMBERS_SHEET.to_string(),
                key: format!("{unit_id}/{member_id}"),
                row: row_index,
                first_row: *first_row,
            });
        } else {
            seen.insert((unit_id, member_id), row_index);
        }
    }
}

fn check_references(
    sheet_name: &str,
    sheet: &RawSheet,
    column: &str,
    known: &BTreeSet<&str>,
    target: &str,
    errors: &mut Vec<ValidationError>,
) {
    for (row_index, row) in sheet.data_rows() {
        let value = cell(row, column);
        if value.is_empty() || known.contains(value) {
            continue;
        }
        errors.push(ValidationError::ReferentialIntegrity {
            sheet: sheet_name.to_string(),
            column: column.to_string(),
            row: row_index,
            value: value.to_string(),
            target: target.to_string(),
        });
    }
}
