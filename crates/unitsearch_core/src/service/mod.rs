//! Reload orchestration and the read-side facade.
//!
//! # Responsibility
//! - Turn sheet bundles into committed snapshots.
//! - Keep transport layers decoupled from ingestion, storage and indexes.

pub mod roster_service;
pub mod snapshot;

pub use roster_service::{ReloadOutcome, RosterError, RosterResult, RosterService, RosterStatus};
pub use snapshot::Snapshot;
