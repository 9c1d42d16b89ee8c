//! Raw sheet and bundle types.
//!
//! # Responsibility
//! - Hold string-keyed rows in source order.
//! - Resolve sheet names (including the legacy unit alias sheet name).
//!
//! # Invariants
//! - Column names are trimmed wherever they enter a sheet, so header checks
//!   and cell reads always agree on the name.
//! - Cell reads are trimmed; an absent cell reads as blank.
//! - Rows whose every cell is blank are invisible to ingestion.
//! - A headerless sheet without data rows is an empty sheet, not a sheet
//!   with zero columns.

use crate::ingest::{LEGACY_UNIT_ALIASES_SHEET, UNIT_ALIASES_SHEET};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One raw record: column name to cell text.
pub type RawRow = BTreeMap<String, String>;

/// One raw table as exported by the data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSheet {
    /// Header row. When empty, columns are inferred from row keys.
    #[serde(default, deserialize_with = "deserialize_columns")]
    pub columns: Vec<String>,
    /// Records in source order.
    #[serde(default, deserialize_with = "deserialize_rows")]
    pub rows: Vec<RawRow>,
}

impl RawSheet {
    /// Creates an empty sheet with an explicit header.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|column| column_name(column.into()))
                .collect(),
            rows: Vec::new(),
        }
    }

    /// Creates a headerless sheet; columns are inferred from row keys.
    pub fn from_rows(rows: Vec<RawRow>) -> Self {
        Self {
            columns: Vec::new(),
            rows,
        }
    }

    /// Appends one row built from `(column, value)` pairs.
    pub fn push_row<I, K, V>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.rows.push(
            cells
                .into_iter()
                .map(|(key, value)| (column_name(key.into()), value.into()))
                .collect(),
        );
    }

    /// Builder form of [`RawSheet::push_row`].
    pub fn row<I, K, V>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.push_row(cells);
        self
    }

    /// Returns whether `column` is part of the effective header.
    ///
    /// A headerless sheet with no data rows has nothing to contradict any
    /// header and reports every column as present.
    pub fn has_column(&self, column: &str) -> bool {
        if self.columns.is_empty() {
            let mut rows = self.data_rows().peekable();
            if rows.peek().is_none() {
                return true;
            }
            return rows.any(|(_, row)| row.keys().any(|key| key.trim() == column));
        }
        self.columns.iter().any(|declared| declared.trim() == column)
    }

    /// Iterates `(row_index, row)` over rows with at least one non-blank cell.
    ///
    /// `row_index` is the position in [`RawSheet::rows`], so diagnostics
    /// point at the source record even when blank rows are skipped.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &RawRow)> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.values().any(|value| !value.trim().is_empty()))
    }
}

/// Returns the trimmed cell value, or `""` when the cell is absent.
///
/// Falls back to a trimmed key match for rows assembled by hand.
pub fn cell<'a>(row: &'a RawRow, column: &str) -> &'a str {
    row.get(column)
        .or_else(|| {
            row.iter()
                .find(|(key, _)| key.trim() == column)
                .map(|(_, value)| value)
        })
        .map_or("", |value| value.trim())
}

/// Named collection of raw sheets handed to one reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetBundle {
    sheets: BTreeMap<String, RawSheet>,
}

impl SheetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a bundle from its JSON form: `{"members": {"rows": [...]}, ...}`.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Inserts or replaces a sheet.
    pub fn insert(&mut self, name: impl Into<String>, sheet: RawSheet) {
        self.sheets.insert(name.into(), sheet);
    }

    /// Builder form of [`SheetBundle::insert`].
    pub fn with_sheet(mut self, name: impl Into<String>, sheet: RawSheet) -> Self {
        self.insert(name, sheet);
        self
    }

    /// Removes a sheet, returning it when present.
    pub fn remove(&mut self, name: &str) -> Option<RawSheet> {
        self.sheets.remove(name)
    }

    /// Looks up a sheet by canonical name.
    ///
    /// `unit_aliases` falls back to the legacy `units_aliases` name.
    pub fn sheet(&self, name: &str) -> Option<&RawSheet> {
        self.sheets.get(name).or_else(|| {
            if name == UNIT_ALIASES_SHEET {
                self.sheets.get(LEGACY_UNIT_ALIASES_SHEET)
            } else {
                None
            }
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sheet(name).is_some()
    }

    /// Sheet names exactly as inserted, sorted.
    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }
}

// Spreadsheet exports mix text, numbers and empty cells; everything is kept
// as text until normalization.
fn deserialize_rows<'de, D>(deserializer: D) -> Result<Vec<RawRow>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<BTreeMap<String, Value>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(column, value)| (column_name(column), value_to_text(value)))
                .collect()
        })
        .collect())
}

fn deserialize_columns<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(column_name).collect())
}

fn column_name(name: String) -> String {
    let trimmed = name.trim();
    if trimmed.len() == name.len() {
        name
    } else {
        trimmed.to_string()
    }
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text,
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{cell, RawSheet, SheetBundle};

    #[test]
    fn headerless_sheet_infers_columns_from_rows() {
        let sheet = RawSheet::default().row([("id", "m1"), ("display_name", "Alice")]);
        assert!(sheet.has_column("display_name"));
        assert!(!sheet.has_column("branch"));
    }

    #[test]
    fn declared_header_wins_over_row_keys() {
        let sheet = RawSheet::with_columns(["id", "weight"]).row([("id", "m1")]);
        assert!(sheet.has_column("weight"));
    }

    #[test]
    fn blank_rows_are_skipped_but_indices_are_preserved() {
        let sheet = RawSheet::default()
            .row([("id", "m1")])
            .row([("id", "  ")])
            .row([("id", "m3")]);
        let indices: Vec<usize> = sheet.data_rows().map(|(index, _)| index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn cell_trims_and_defaults_to_blank() {
        let sheet = RawSheet::default().row([("id", "  m1 ")]);
        assert_eq!(cell(&sheet.rows[0], "id"), "m1");
        assert_eq!(cell(&sheet.rows[0], "missing"), "");
    }

    #[test]
    fn json_cells_are_stringified() {
        let bundle = SheetBundle::from_json_str(
            r#"{"unit_members": {"rows": [{"unit_id": "u1", "member_id": "m1", "weight": 2, "flag": true, "note": null}]}}"#,
        )
        .unwrap();
        let row = &bundle.sheet("unit_members").unwrap().rows[0];
        assert_eq!(cell(row, "weight"), "2");
        assert_eq!(cell(row, "flag"), "true");
        assert_eq!(cell(row, "note"), "");
    }

    #[test]
    fn padded_header_and_row_keys_are_trimmed() {
        let bundle = SheetBundle::from_json_str(
            r#"{"members": {"columns": ["id", " display_name "], "rows": [{"id": "m1", " display_name ": "Mio"}]}}"#,
        )
        .unwrap();
        let sheet = bundle.sheet("members").unwrap();
        assert_eq!(sheet.columns, vec!["id", "display_name"]);
        assert!(sheet.has_column("display_name"));
        assert_eq!(cell(&sheet.rows[0], "display_name"), "Mio");

        let built = RawSheet::default().row([("id ", "m1")]);
        assert!(built.has_column("id"));
        assert_eq!(cell(&built.rows[0], "id"), "m1");
    }

    #[test]
    fn headerless_sheet_without_data_rows_has_every_column() {
        let sheet = RawSheet::default().row([("id", " ")]);
        assert!(sheet.has_column("member_id"));
        assert!(RawSheet::default().has_column("generation"));
        assert!(!RawSheet::with_columns(["id"]).has_column("generation"));
    }

    #[test]
    fn legacy_unit_alias_sheet_name_resolves() {
        let bundle = SheetBundle::new().with_sheet("units_aliases", RawSheet::default());
        assert!(bundle.contains("unit_aliases"));
    }
}
