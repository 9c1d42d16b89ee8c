//! Member domain model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stable member key as it appears in the `members` sheet.
pub type MemberId = String;

/// Canonical roster entry.
///
/// Set-valued fields use ordered sets so two normalizations of the same
/// input compare equal regardless of row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub display_name: String,
    /// Category label, e.g. a regional branch.
    pub branch: String,
    /// Category label, e.g. `active` or `graduated`.
    pub status: String,
    /// Generation labels the member belongs to.
    pub generations: BTreeSet<String>,
    /// Generation flagged `is_primary`, when the sheet marks one.
    pub primary_generation: Option<String>,
    /// Search keywords: inline alias plus `member_aliases` rows.
    pub keywords: BTreeSet<String>,
}

impl Member {
    /// Creates a member with no generations and no keywords.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        branch: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            branch: branch.into(),
            status: status.into(),
            generations: BTreeSet::new(),
            primary_generation: None,
            keywords: BTreeSet::new(),
        }
    }

    /// Returns display name followed by every keyword.
    pub fn search_terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.display_name.as_str()).chain(self.keywords.iter().map(String::as_str))
    }
}
