//! Roster reload orchestration and query facade.
//!
//! # Responsibility
//! - Run validate -> normalize -> persist -> swap as one reload.
//! - Serialize reloads and serve reads from the committed snapshot.
//!
//! # Invariants
//! - A failed reload leaves the served snapshot and the stored dataset as
//!   they were.
//! - Readers hold the snapshot lock only to clone the `Arc`.
//! - `generation` increases by one per committed change and never otherwise.

use crate::config::RosterConfig;
use crate::db::DbError;
use crate::ingest::normalize::normalize_bundle;
use crate::ingest::sheet::SheetBundle;
use crate::ingest::validate::{validate_bundle, ValidationErrors};
use crate::model::member::Member;
use crate::repo::{CommitInfo, RepoError, RosterRepository};
use crate::search::index::{MemberHit, SearchPage, SearchQuery, UnitHit};
use crate::service::snapshot::Snapshot;
use crate::similarity::matrix::SimilarMember;
use crate::store::catalog::{Facets, UnitDetail};
use crate::store::filter::MemberFilter;
use crate::store::NotFound;
use log::{error, info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};
use std::time::Instant;

pub type RosterResult<T> = Result<T, RosterError>;

/// Service error for reload and query use-cases.
#[derive(Debug)]
pub enum RosterError {
    /// Reload input was rejected; nothing changed.
    Validation(ValidationErrors),
    NotFound(NotFound),
    /// Another reload is in flight.
    Busy,
    /// Nothing has been committed yet.
    NotLoaded,
    Repo(RepoError),
}

impl RosterError {
    /// Stable machine-readable code for logs and transports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(errors) => errors.first().code(),
            Self::NotFound(_) => "not_found",
            Self::Busy => "busy",
            Self::NotLoaded => "not_loaded",
            Self::Repo(_) => "repo_error",
        }
    }
}

impl Display for RosterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(errors) => write!(f, "reload rejected: {errors}"),
            Self::NotFound(err) => write!(f, "{err}"),
            Self::Busy => write!(f, "another reload is in progress"),
            Self::NotLoaded => write!(f, "roster data not loaded"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RosterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::NotFound(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Busy | Self::NotLoaded => None,
        }
    }
}

impl From<ValidationErrors> for RosterError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<NotFound> for RosterError {
    fn from(value: NotFound) -> Self {
        Self::NotFound(value)
    }
}

impl From<RepoError> for RosterError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DbError> for RosterError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

/// Result of one reload call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadOutcome {
    pub generation: u64,
    pub fingerprint: String,
    /// `false` when the bundle matched the committed dataset.
    pub changed: bool,
    pub member_count: usize,
    pub unit_count: usize,
    pub membership_count: usize,
    pub duration_ms: u64,
}

/// Summary of the snapshot currently served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterStatus {
    pub loaded: bool,
    pub generation: u64,
    pub fingerprint: Option<String>,
    pub member_count: usize,
    pub unit_count: usize,
    pub membership_count: usize,
}

/// Reloadable roster over a repository implementation.
pub struct RosterService<R: RosterRepository> {
    config: RosterConfig,
    writer: Mutex<R>,
    current: RwLock<Arc<Snapshot>>,
}

impl<R: RosterRepository> RosterService<R> {
    /// Creates a service that serves nothing until the first reload.
    pub fn new(repo: R, config: RosterConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(repo),
            current: RwLock::new(Arc::new(Snapshot::unloaded())),
        }
    }

    /// Creates a service and serves the last dataset the repository committed.
    pub fn open(repo: R, config: RosterConfig) -> RosterResult<Self> {
        let started_at = Instant::now();
        let persisted = match repo.load_dataset() {
            Ok(persisted) => persisted,
            Err(err) => {
                error!(
                    "event=warm_start module=service status=error error_code=repo_read_failed error={}",
                    err
                );
                return Err(err.into());
            }
        };

        let service = Self::new(repo, config);
        let Some(persisted) = persisted else {
            info!("event=warm_start module=service status=empty");
            return Ok(service);
        };

        let mut commit = persisted.commit;
        let fingerprint = persisted.dataset.fingerprint();
        if fingerprint != commit.fingerprint {
            warn!(
                "event=warm_start module=service status=fingerprint_mismatch generation={}",
                commit.generation
            );
            commit.fingerprint = fingerprint;
        }

        let snapshot = Snapshot::build(persisted.dataset, commit, service.config.weighting);
        info!(
            "event=warm_start module=service status=ok generation={} members={} units={} duration_ms={}",
            snapshot.generation(),
            snapshot.catalog().member_count(),
            snapshot.catalog().unit_count(),
            started_at.elapsed().as_millis()
        );
        service.install(Arc::new(snapshot));
        Ok(service)
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    /// Returns the committed snapshot for several consistent reads.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validates, normalizes, persists and publishes `bundle`, waiting for
    /// any reload already in flight.
    pub fn reload(&self, bundle: &SheetBundle) -> RosterResult<ReloadOutcome> {
        let mut repo = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.reload_locked(&mut repo, bundle)
    }

    /// Same as [`Self::reload`], but fails with [`RosterError::Busy`] instead
    /// of waiting.
    pub fn try_reload(&self, bundle: &SheetBundle) -> RosterResult<ReloadOutcome> {
        let mut repo = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                info!("event=reload module=service status=rejected error_code=busy");
                return Err(RosterError::Busy);
            }
        };
        self.reload_locked(&mut repo, bundle)
    }

    fn reload_locked(
        &self,
        repo: &mut R,
        bundle: &SheetBundle,
    ) -> RosterResult<ReloadOutcome> {
        let started_at = Instant::now();
        info!(
            "event=reload module=service status=start sheets={}",
            bundle.sheet_names().count()
        );

        if let Err(errors) = validate_bundle(bundle) {
            let first = errors.first();
            error!(
                "event=reload module=service status=error error_code={} sheet={} violations={} duration_ms={}",
                first.code(),
                first.sheet(),
                errors.len(),
                started_at.elapsed().as_millis()
            );
            return Err(errors.into());
        }

        let dataset = normalize_bundle(bundle, &self.config.normalize_options());
        let fingerprint = dataset.fingerprint();
        let previous = self.snapshot();

        if previous.fingerprint() == Some(fingerprint.as_str()) {
            let outcome = outcome_for(&previous, false, &started_at);
            info!(
                "event=reload module=service status=unchanged generation={} duration_ms={}",
                outcome.generation, outcome.duration_ms
            );
            return Ok(outcome);
        }

        let commit = CommitInfo {
            generation: previous.generation() + 1,
            fingerprint,
        };
        let snapshot = Snapshot::build(dataset, commit.clone(), self.config.weighting);
        if let Err(err) = repo.replace_dataset(snapshot.catalog().dataset(), &commit) {
            error!(
                "event=reload module=service status=error error_code=repo_write_failed generation={} duration_ms={}",
                commit.generation,
                started_at.elapsed().as_millis()
            );
            return Err(err.into());
        }

        let snapshot = Arc::new(snapshot);
        self.install(Arc::clone(&snapshot));
        let outcome = outcome_for(&snapshot, true, &started_at);
        info!(
            "event=reload module=service status=ok generation={} members={} units={} memberships={} duration_ms={}",
            outcome.generation,
            outcome.member_count,
            outcome.unit_count,
            outcome.membership_count,
            outcome.duration_ms
        );
        Ok(outcome)
    }

    fn install(&self, snapshot: Arc<Snapshot>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    fn loaded(&self) -> RosterResult<Arc<Snapshot>> {
        let snapshot = self.snapshot();
        if snapshot.is_loaded() {
            Ok(snapshot)
        } else {
            Err(RosterError::NotLoaded)
        }
    }

    /// Ranked, filtered and paginated member search.
    pub fn search(&self, query: &SearchQuery) -> RosterResult<SearchPage<MemberHit>> {
        let snapshot = self.loaded()?;
        let applied_limit = self.config.search_limit(query.limit);
        Ok(snapshot
            .member_index()
            .search(snapshot.catalog(), query, applied_limit))
    }

    /// Ranked unit search over display names and aliases.
    pub fn search_units(
        &self,
        text: &str,
        limit: Option<u32>,
        offset: u32,
    ) -> RosterResult<SearchPage<UnitHit>> {
        let snapshot = self.loaded()?;
        let applied_limit = self.config.search_limit(limit);
        Ok(snapshot
            .unit_index()
            .search(snapshot.catalog(), text, applied_limit, offset))
    }

    pub fn get_member(&self, member_id: &str) -> RosterResult<Member> {
        let snapshot = self.loaded()?;
        let member = snapshot.catalog().member(member_id)?;
        Ok(member.clone())
    }

    /// Unit metadata with members ordered by weight, ties by member id.
    pub fn get_unit(&self, unit_id: &str) -> RosterResult<UnitDetail> {
        let snapshot = self.loaded()?;
        Ok(snapshot.catalog().unit_detail(unit_id)?)
    }

    pub fn unit_members(&self, unit_id: &str) -> RosterResult<Vec<String>> {
        let snapshot = self.loaded()?;
        let ids = snapshot.catalog().unit_members(unit_id)?;
        Ok(ids.into_iter().map(str::to_string).collect())
    }

    /// Unit ids a member belongs to, sorted.
    pub fn member_units(&self, member_id: &str) -> RosterResult<Vec<String>> {
        let snapshot = self.loaded()?;
        let ids = snapshot.catalog().units_of(member_id)?;
        Ok(ids.into_iter().map(str::to_string).collect())
    }

    pub fn list_members(&self, filter: &MemberFilter) -> RosterResult<Vec<Member>> {
        let snapshot = self.loaded()?;
        Ok(snapshot
            .catalog()
            .list_members(filter)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Members sharing units with `member_id`, best first.
    ///
    /// `top_n` falls back to the configured default and is clamped to the
    /// configured maximum.
    pub fn similarity(
        &self,
        member_id: &str,
        top_n: Option<u32>,
    ) -> RosterResult<Vec<SimilarMember>> {
        let snapshot = self.loaded()?;
        let top_n = self.config.similarity_top(top_n) as usize;
        Ok(snapshot.matrix().similar(member_id, top_n)?)
    }

    pub fn facets(&self) -> RosterResult<Facets> {
        let snapshot = self.loaded()?;
        Ok(snapshot.catalog().facets())
    }

    /// Never fails; reports `loaded = false` before the first commit.
    pub fn status(&self) -> RosterStatus {
        let snapshot = self.snapshot();
        let catalog = snapshot.catalog();
        RosterStatus {
            loaded: snapshot.is_loaded(),
            generation: snapshot.generation(),
            fingerprint: snapshot.fingerprint().map(str::to_string),
            member_count: catalog.member_count(),
            unit_count: catalog.unit_count(),
            membership_count: catalog.dataset().membership_count(),
        }
    }

    /// Consumes the service and returns its repository.
    pub fn into_repository(self) -> R {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn outcome_for(snapshot: &Snapshot, changed: bool, started_at: &Instant) -> ReloadOutcome {
    let catalog = snapshot.catalog();
    ReloadOutcome {
        generation: snapshot.generation(),
        fingerprint: snapshot.fingerprint().unwrap_or_default().to_string(),
        changed,
        member_count: catalog.member_count(),
        unit_count: catalog.unit_count(),
        membership_count: catalog.dataset().membership_count(),
        duration_ms: u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::{RosterError, RosterService};
    use crate::config::RosterConfig;
    use crate::ingest::normalize::{normalize_bundle, NormalizeOptions};
    use crate::ingest::sheet::{RawSheet, SheetBundle};
    use crate::repo::{CommitInfo, MemoryRosterRepository};
    use crate::similarity::matrix::SimilarityWeighting;

    fn bundle() -> SheetBundle {
        SheetBundle::new()
            .with_sheet(
                "members",
                RawSheet::default().row([
                    ("id", "m1"),
                    ("display_name", "Alice"),
                    ("branch", "EN"),
                    ("status", "active"),
                ]),
            )
            .with_sheet(
                "member_generations",
                RawSheet::with_columns(["member_id", "generation"]),
            )
            .with_sheet("units", RawSheet::with_columns(["id", "display_name"]))
            .with_sheet(
                "unit_members",
                RawSheet::with_columns(["unit_id", "member_id", "weight"]),
            )
    }

    #[test]
    fn queries_fail_before_first_reload() {
        let service = RosterService::new(MemoryRosterRepository::new(), RosterConfig::default());
        let err = service.get_member("m1").unwrap_err();
        assert!(matches!(err, RosterError::NotLoaded));
        assert_eq!(err.code(), "not_loaded");
        assert!(!service.status().loaded);
    }

    #[test]
    fn reload_increments_generation_only_on_change() {
        let service = RosterService::new(MemoryRosterRepository::new(), RosterConfig::default());
        let first = service.reload(&bundle()).unwrap();
        assert!(first.changed);
        assert_eq!(first.generation, 1);

        let again = service.reload(&bundle()).unwrap();
        assert!(!again.changed);
        assert_eq!(again.generation, 1);
        assert_eq!(again.fingerprint, first.fingerprint);
    }

    #[test]
    fn validation_error_code_comes_from_first_violation() {
        let service = RosterService::new(MemoryRosterRepository::new(), RosterConfig::default());
        let mut broken = bundle();
        broken.remove("units");
        let err = service.reload(&broken).unwrap_err();
        assert_eq!(err.code(), "missing_sheet");
    }

    #[test]
    fn open_serves_stored_dataset_and_repairs_stale_fingerprint() {
        let dataset = normalize_bundle(&bundle(), &NormalizeOptions::default());
        let expected = dataset.fingerprint();
        let repo = MemoryRosterRepository::with_dataset(
            dataset,
            CommitInfo {
                generation: 7,
                fingerprint: "stale".to_string(),
            },
        );
        let config = RosterConfig {
            weighting: SimilarityWeighting::InverseWeight,
            ..RosterConfig::default()
        };

        let service = RosterService::open(repo, config).unwrap();
        let snapshot = service.snapshot();
        assert_eq!(snapshot.generation(), 7);
        assert_eq!(snapshot.fingerprint(), Some(expected.as_str()));
        assert_eq!(snapshot.matrix().weighting(), SimilarityWeighting::InverseWeight);
        assert_eq!(service.get_member("m1").unwrap().display_name, "Alice");
    }
}
