//! Canonical roster model shared by store, index and similarity layers.
//!
//! # Responsibility
//! - Define the typed records produced by normalization.
//! - Keep one serializable dataset shape for the durable mirror and snapshots.
//!
//! # Invariants
//! - Every member and unit is identified by a stable, trimmed string id.
//! - Unit memberships are always kept in display order (weight, member id).

pub mod dataset;
pub mod member;
pub mod unit;
