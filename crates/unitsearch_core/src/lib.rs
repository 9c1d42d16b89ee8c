//! Core roster ingestion, search and similarity for unitsearch.
//! This crate owns every reload and query invariant; front ends only call it.

pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod similarity;
pub mod store;

pub use config::{ConfigError, RosterConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use ingest::sheet::{RawSheet, SheetBundle};
pub use ingest::validate::{validate_bundle, SchemaIssue, ValidationError, ValidationErrors};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::dataset::Dataset;
pub use model::member::{Member, MemberId};
pub use model::unit::{Unit, UnitId, UnitMembership};
pub use repo::{
    CommitInfo, MemoryRosterRepository, PersistedDataset, RepoError, RepoResult,
    RosterRepository, SqliteRosterRepository,
};
pub use search::index::{MatchKind, MemberHit, SearchPage, SearchQuery, UnitHit};
pub use service::{ReloadOutcome, RosterError, RosterResult, RosterService, RosterStatus, Snapshot};
pub use similarity::matrix::{SimilarMember, SimilarityWeighting};
pub use store::catalog::{Facets, UnitDetail};
pub use store::filter::MemberFilter;
pub use store::{EntityKind, NotFound};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
