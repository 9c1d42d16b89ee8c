//! Unit domain model and membership ordering.
//!
//! # Invariants
//! - `Unit::members` is sorted ascending by weight, ties broken by member id.
//! - Weights are finite.

use crate::model::member::MemberId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Stable unit key as it appears in the `units` sheet.
pub type UnitId = String;

/// One `(unit, member, weight)` association, stored under its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitMembership {
    pub member_id: MemberId,
    /// Ordering key inside the unit. Lower sorts first.
    pub weight: f64,
}

/// Named grouping of members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub display_name: String,
    pub note: Option<String>,
    pub aliases: BTreeSet<String>,
    pub members: Vec<UnitMembership>,
}

impl Unit {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            note: None,
            aliases: BTreeSet::new(),
            members: Vec::new(),
        }
    }

    /// Returns display name followed by every alias.
    pub fn search_terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.display_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Returns whether `member_id` belongs to this unit.
    pub fn contains(&self, member_id: &str) -> bool {
        self.members.iter().any(|entry| entry.member_id == member_id)
    }
}

/// Display order for unit memberships: weight ascending, then member id.
pub fn membership_order(left: &UnitMembership, right: &UnitMembership) -> Ordering {
    left.weight
        .total_cmp(&right.weight)
        .then_with(|| left.member_id.cmp(&right.member_id))
}

/// Sorts memberships into display order.
pub fn sort_memberships(members: &mut [UnitMembership]) {
    members.sort_by(membership_order);
}

#[cfg(test)]
mod tests {
    use super::{sort_memberships, UnitMembership};

    fn entry(member_id: &str, weight: f64) -> UnitMembership {
        UnitMembership {
            member_id: member_id.to_string(),
            weight,
        }
    }

    #[test]
    fn equal_weights_fall_back_to_member_id() {
        let mut members = vec![entry("m3", 2.0), entry("m2", 1.0), entry("m1", 2.0)];
        sort_memberships(&mut members);
        let order: Vec<_> = members.iter().map(|e| e.member_id.as_str()).collect();
        assert_eq!(order, vec!["m2", "m1", "m3"]);
    }

    #[test]
    fn negative_and_fractional_weights_sort_numerically() {
        let mut members = vec![entry("a", 10.0), entry("b", -1.5), entry("c", 2.25)];
        sort_memberships(&mut members);
        let order: Vec<_> = members.iter().map(|e| e.member_id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }
}
