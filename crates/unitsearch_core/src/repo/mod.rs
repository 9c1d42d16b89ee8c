//! Durable roster persistence.
//!
//! # Responsibility
//! - Define the write/read contract the service commits datasets through.
//! - Keep SQLite query details out of the reload orchestration.
//!
//! # Invariants
//! - `replace_dataset` is all-or-nothing: on error the previously stored
//!   dataset stays readable.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod roster_repo;

pub use roster_repo::{
    CommitInfo, MemoryRosterRepository, PersistedDataset, RepoError, RepoResult,
    RosterRepository, SqliteRosterRepository,
};
