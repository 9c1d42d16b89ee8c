//! Member filter predicate shared by listing and search.
//!
//! # Invariants
//! - Each dimension is independent; dimensions combine with AND.
//! - Within a dimension, listed values combine with OR.
//! - An empty dimension, a blank value or the `ALL` sentinel (any case)
//!   places no constraint on that dimension.

use crate::model::member::Member;
use serde::{Deserialize, Serialize};

/// Sentinel sent by filter dropdowns for "no constraint".
pub const ALL_SENTINEL: &str = "ALL";

/// Equality filter over member branch, status and generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFilter {
    #[serde(default)]
    pub branch: Vec<String>,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub generation: Vec<String>,
}

impl MemberFilter {
    /// Filter that accepts every member.
    pub fn any() -> Self {
        Self::default()
    }

    /// Builds a single-value-per-dimension filter; `None` means unconstrained.
    pub fn from_options(
        branch: Option<&str>,
        status: Option<&str>,
        generation: Option<&str>,
    ) -> Self {
        let to_vec = |value: Option<&str>| value.map(str::to_string).into_iter().collect();
        Self {
            branch: to_vec(branch),
            status: to_vec(status),
            generation: to_vec(generation),
        }
    }

    pub fn with_branch(mut self, value: impl Into<String>) -> Self {
        self.branch.push(value.into());
        self
    }

    pub fn with_status(mut self, value: impl Into<String>) -> Self {
        self.status.push(value.into());
        self
    }

    pub fn with_generation(mut self, value: impl Into<String>) -> Self {
        self.generation.push(value.into());
        self
    }

    /// Returns whether no dimension constrains the result.
    pub fn is_unconstrained(&self) -> bool {
        accepted(&self.branch).is_none()
            && accepted(&self.status).is_none()
            && accepted(&self.generation).is_none()
    }

    /// Evaluates the predicate against one member.
    pub fn matches(&self, member: &Member) -> bool {
        if let Some(branches) = accepted(&self.branch) {
            if !branches.contains(&member.branch.as_str()) {
                return false;
            }
        }
        if let Some(statuses) = accepted(&self.status) {
            if !statuses.contains(&member.status.as_str()) {
                return false;
            }
        }
        if let Some(generations) = accepted(&self.generation) {
            if !generations
                .iter()
                .any(|generation| member.generations.contains(*generation))
            {
                return false;
            }
        }
        true
    }
}

/// Accepted values of one dimension, or `None` when it is unconstrained.
fn accepted(values: &[String]) -> Option<Vec<&str>> {
    let mut accepted = Vec::new();
    for value in values {
        let value = value.trim();
        if value.eq_ignore_ascii_case(ALL_SENTINEL) {
            return None;
        }
        if !value.is_empty() {
            accepted.push(value);
        }
    }
    if accepted.is_empty() {
        None
    } else {
        Some(accepted)
    }
}
