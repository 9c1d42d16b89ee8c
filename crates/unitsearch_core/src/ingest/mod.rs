//! Ingestion of raw spreadsheet-like tables.
//!
//! # Responsibility
//! - Model raw named sheets exactly as an external source hands them over.
//! - Validate sheet presence, columns, keys and references before any write.
//! - Normalize validated rows into the canonical [`crate::model`] records.
//!
//! # Invariants
//! - Nothing outside this module reads raw untyped rows.
//! - Validation is pure; normalization is deterministic.

pub mod normalize;
pub mod sheet;
pub mod validate;

pub const MEMBERS_SHEET: &str = "members";
pub const MEMBER_GENERATIONS_SHEET: &str = "member_generations";
pub const UNITS_SHEET: &str = "units";
pub const UNIT_MEMBERS_SHEET: &str = "unit_members";
pub const MEMBER_ALIASES_SHEET: &str = "member_aliases";
pub const UNIT_ALIASES_SHEET: &str = "unit_aliases";

/// Older exports name the unit alias sheet `units_aliases`.
pub const LEGACY_UNIT_ALIASES_SHEET: &str = "units_aliases";

/// Sheets a bundle must contain for a reload to proceed.
pub const REQUIRED_SHEETS: [&str; 4] = [
    MEMBERS_SHEET,
    MEMBER_GENERATIONS_SHEET,
    UNITS_SHEET,
    UNIT_MEMBERS_SHEET,
];

/// Sheets that are read when present and treated as empty otherwise.
pub const OPTIONAL_SHEETS: [&str; 2] = [MEMBER_ALIASES_SHEET, UNIT_ALIASES_SHEET];

/// Column contract of one sheet.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SheetSchema {
    pub name: &'static str,
    /// Columns that must exist in the header.
    pub required: &'static [&'static str],
    /// Required columns whose cells must also be non-blank.
    pub keys: &'static [&'static str],
}

pub(crate) const SHEET_SCHEMAS: [SheetSchema; 6] = [
    SheetSchema {
        name: MEMBERS_SHEET,
        required: &["id", "display_name", "branch", "status"],
        keys: &["id"],
    },
    SheetSchema {
        name: MEMBER_GENERATIONS_SHEET,
        required: &["member_id", "generation"],
        keys: &["member_id", "generation"],
    },
    SheetSchema {
        name: UNITS_SHEET,
        required: &["id", "display_name"],
        keys: &["id"],
    },
    SheetSchema {
        name: UNIT_MEMBERS_SHEET,
        required: &["unit_id", "member_id", "weight"],
        keys: &["unit_id", "member_id"],
    },
    SheetSchema {
        name: MEMBER_ALIASES_SHEET,
        required: &["member_id", "alias"],
        keys: &["member_id"],
    },
    SheetSchema {
        name: UNIT_ALIASES_SHEET,
        required: &["unit_id", "alias"],
        keys: &["unit_id"],
    },
];
