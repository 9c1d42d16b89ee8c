//! Normalized roster dataset and its content fingerprint.
//!
//! # Responsibility
//! - Carry one complete, normalized entity set between ingestion, the durable
//!   mirror and snapshot construction.
//! - Derive a deterministic fingerprint used to detect unchanged reloads.
//!
//! # Invariants
//! - `members` and `units` are sorted by id.
//! - The fingerprint depends only on dataset content, never on input row order.

use crate::model::member::Member;
use crate::model::unit::Unit;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Complete normalized entity set for one reload cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub members: Vec<Member>,
    pub units: Vec<Unit>,
}

impl Dataset {
    /// Number of `(unit, member)` associations across all units.
    pub fn membership_count(&self) -> usize {
        self.units.iter().map(|unit| unit.members.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.units.is_empty()
    }

    /// Returns the hex SHA-256 digest of the dataset content.
    ///
    /// Every string is length-prefixed so adjacent fields cannot collide.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        feed_len(&mut hasher, self.members.len());
        for member in &self.members {
            feed_str(&mut hasher, &member.id);
            feed_str(&mut hasher, &member.display_name);
            feed_str(&mut hasher, &member.branch);
            feed_str(&mut hasher, &member.status);
            feed_set(&mut hasher, member.generations.iter());
            feed_opt(&mut hasher, member.primary_generation.as_deref());
            feed_set(&mut hasher, member.keywords.iter());
        }

        feed_len(&mut hasher, self.units.len());
        for unit in &self.units {
            feed_str(&mut hasher, &unit.id);
            feed_str(&mut hasher, &unit.display_name);
            feed_opt(&mut hasher, unit.note.as_deref());
            feed_set(&mut hasher, unit.aliases.iter());
            feed_len(&mut hasher, unit.members.len());
            for entry in &unit.members {
                feed_str(&mut hasher, &entry.member_id);
                hasher.update(entry.weight.to_bits().to_le_bytes());
            }
        }

        hex::encode(hasher.finalize())
    }
}

fn feed_len(hasher: &mut Sha256, len: usize) {
    hasher.update((len as u64).to_le_bytes());
}

fn feed_str(hasher: &mut Sha256, value: &str) {
    feed_len(hasher, value.len());
    hasher.update(value.as_bytes());
}

fn feed_opt(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(value) => {
            hasher.update([1u8]);
            feed_str(hasher, value);
        }
        None => hasher.update([0u8]),
    }
}

fn feed_set<'a>(hasher: &mut Sha256, values: impl ExactSizeIterator<Item = &'a String>) {
    feed_len(hasher, values.len());
    for value in values {
        feed_str(hasher, value);
    }
}

#[cfg(test)]
mod tests {
    use super::Dataset;
    use crate::model::member::Member;
    use crate::model::unit::{Unit, UnitMembership};

    fn sample() -> Dataset {
        let mut unit = Unit::new("u1", "Unit One");
        unit.members.push(UnitMembership {
            member_id: "m1".to_string(),
            weight: 1.0,
        });
        Dataset {
            members: vec![Member::new("m1", "Alice", "A", "active")],
            units: vec![unit],
        }
    }

    #[test]
    fn fingerprint_is_stable_for_equal_content() {
        assert_eq!(sample().fingerprint(), sample().fingerprint());
        assert_eq!(sample().fingerprint().len(), 64);
    }

    #[test]
    fn fingerprint_changes_with_weight() {
        let mut changed = sample();
        changed.units[0].members[0].weight = 2.0;
        assert_ne!(sample().fingerprint(), changed.fingerprint());
    }

    #[test]
    fn fingerprint_separates_adjacent_fields() {
        let mut left = sample();
        left.members[0].display_name = "ab".to_string();
        left.members[0].branch = "c".to_string();
        let mut right = sample();
        right.members[0].display_name = "a".to_string();
        right.members[0].branch = "bc".to_string();
        assert_ne!(left.fingerprint(), right.fingerprint());
    }
}
