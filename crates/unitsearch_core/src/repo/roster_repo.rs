//! Roster repository contract with SQLite and in-memory implementations.
//!
//! # Responsibility
//! - Replace the stored dataset and its commit marker in one transaction.
//! - Load the last committed dataset for warm start.
//!
//! # Invariants
//! - At most one commit row exists; it always describes the stored rows.
//! - Loaded datasets come back sorted by id with memberships in display order.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::dataset::Dataset;
use crate::model::member::Member;
use crate::model::unit::{Unit, UnitMembership};
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const REQUIRED_TABLES: [&str; 7] = [
    "members",
    "member_generations",
    "member_keywords",
    "units",
    "unit_aliases",
    "unit_members",
    "roster_commits",
];

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "roster repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table: {table}"),
            Self::InvalidData(message) => write!(f, "invalid persisted roster data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Identity of one committed dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Monotonic commit counter, starting at 1.
    pub generation: u64,
    /// Content fingerprint of the committed dataset.
    pub fingerprint: String,
}

/// Stored dataset together with the commit that wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedDataset {
    pub dataset: Dataset,
    pub commit: CommitInfo,
}

/// Storage contract used by the reload pipeline.
pub trait RosterRepository: Send {
    /// Replaces every stored entity with `dataset` and records `commit`.
    fn replace_dataset(&mut self, dataset: &Dataset, commit: &CommitInfo) -> RepoResult<()>;
    /// Returns the last committed dataset, or `None` if nothing was committed.
    fn load_dataset(&self) -> RepoResult<Option<PersistedDataset>>;
}

/// SQLite-backed roster repository owning its connection.
pub struct SqliteRosterRepository {
    conn: Connection,
}

impl SqliteRosterRepository {
    /// Wraps a connection returned by [`crate::db::open_db`] or
    /// [`crate::db::open_db_in_memory`].
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_roster_connection_ready(&conn)?;
        Ok(Self { conn })
    }
}

impl RosterRepository for SqliteRosterRepository {
    fn replace_dataset(&mut self, dataset: &Dataset, commit: &CommitInfo) -> RepoResult<()> {
        let started_at = Instant::now();
        let generation = i64::try_from(commit.generation).map_err(|_| {
            RepoError::InvalidData(format!("generation {} out of range", commit.generation))
        })?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = write_dataset(&tx, dataset).and_then(|()| {
            tx.execute(
                "INSERT INTO roster_commits (id, generation, fingerprint)
                 VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                    generation = excluded.generation,
                    fingerprint = excluded.fingerprint,
                    committed_at = (strftime('%s', 'now') * 1000);",
                params![generation, commit.fingerprint.as_str()],
            )?;
            Ok(())
        });

        match result.and_then(|()| tx.commit().map_err(RepoError::from)) {
            Ok(()) => {
                info!(
                    "event=repo_replace module=repo status=ok generation={} members={} units={} duration_ms={}",
                    commit.generation,
                    dataset.members.len(),
                    dataset.units.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=repo_replace module=repo status=error generation={} duration_ms={} error_code=repo_write_failed error={}",
                    commit.generation,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn load_dataset(&self) -> RepoResult<Option<PersistedDataset>> {
        let commit: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT generation, fingerprint FROM roster_commits WHERE id = 1;",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((generation, fingerprint)) = commit else {
            debug!("event=repo_load module=repo status=empty");
            return Ok(None);
        };
        let generation = u64::try_from(generation).map_err(|_| {
            RepoError::InvalidData(format!("negative commit generation {generation}"))
        })?;

        let mut members = load_members(&self.conn)?;
        let mut units = load_units(&self.conn)?;
        load_member_sets(&self.conn, &mut members)?;
        load_unit_aliases(&self.conn, &mut units)?;
        load_memberships(&self.conn, &members, &mut units)?;

        let dataset = Dataset {
            members: members.into_values().collect(),
            units: units.into_values().collect(),
        };
        debug!(
            "event=repo_load module=repo status=ok generation={} members={} units={}",
            generation,
            dataset.members.len(),
            dataset.units.len()
        );
        Ok(Some(PersistedDataset {
            dataset,
            commit: CommitInfo {
                generation,
                fingerprint,
            },
        }))
    }
}

/// Keeps the last committed dataset in process memory.
///
/// Useful when durability is not needed and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRosterRepository {
    stored: Option<PersistedDataset>,
}

impl MemoryRosterRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an already committed dataset.
    pub fn with_dataset(dataset: Dataset, commit: CommitInfo) -> Self {
        Self {
            stored: Some(PersistedDataset { dataset, commit }),
        }
    }
}

impl RosterRepository for MemoryRosterRepository {
    fn replace_dataset(&mut self, dataset: &Dataset, commit: &CommitInfo) -> RepoResult<()> {
        self.stored = Some(PersistedDataset {
            dataset: dataset.clone(),
            commit: commit.clone(),
        });
        Ok(())
    }

    fn load_dataset(&self) -> RepoResult<Option<PersistedDataset>> {
        Ok(self.stored.clone())
    }
}

fn write_dataset(tx: &Transaction<'_>, dataset: &Dataset) -> RepoResult<()> {
    tx.execute_batch(
        "DELETE FROM unit_members;
         DELETE FROM unit_aliases;
         DELETE FROM units;
         DELETE FROM member_keywords;
         DELETE FROM member_generations;
         DELETE FROM members;",
    )?;

    let mut insert_member = tx.prepare(
        "INSERT INTO members (id, display_name, branch, status, primary_generation)
         VALUES (?1, ?2, ?3, ?4, ?5);",
    )?;
    let mut insert_generation =
        tx.prepare("INSERT INTO member_generations (member_id, generation) VALUES (?1, ?2);")?;
    let mut insert_keyword =
        tx.prepare("INSERT INTO member_keywords (member_id, keyword) VALUES (?1, ?2);")?;
    for member in &dataset.members {
        insert_member.execute(params![
            member.id.as_str(),
            member.display_name.as_str(),
            member.branch.as_str(),
            member.status.as_str(),
            member.primary_generation.as_deref(),
        ])?;
        for generation in &member.generations {
            insert_generation.execute(params![member.id.as_str(), generation.as_str()])?;
        }
        for keyword in &member.keywords {
            insert_keyword.execute(params![member.id.as_str(), keyword.as_str()])?;
        }
    }

    let mut insert_unit =
        tx.prepare("INSERT INTO units (id, display_name, note) VALUES (?1, ?2, ?3);")?;
    let mut insert_alias =
        tx.prepare("INSERT INTO unit_aliases (unit_id, alias) VALUES (?1, ?2);")?;
    let mut insert_membership = tx.prepare(
        "INSERT INTO unit_members (unit_id, member_id, weight) VALUES (?1, ?2, ?3);",
    )?;
    for unit in &dataset.units {
        insert_unit.execute(params![
            unit.id.as_str(),
            unit.display_name.as_str(),
            unit.note.as_deref(),
        ])?;
        for alias in &unit.aliases {
            insert_alias.execute(params![unit.id.as_str(), alias.as_str()])?;
        }
        for entry in &unit.members {
            if !entry.weight.is_finite() {
                return Err(RepoError::InvalidData(format!(
                    "non-finite weight for {}/{}",
                    unit.id, entry.member_id
                )));
            }
            insert_membership.execute(params![
                unit.id.as_str(),
                entry.member_id.as_str(),
                entry.weight,
            ])?;
        }
    }

    Ok(())
}

fn load_members(conn: &Connection) -> RepoResult<BTreeMap<String, Member>> {
    let mut stmt = conn.prepare(
        "SELECT id, display_name, branch, status, primary_generation
         FROM members
         ORDER BY id ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut members = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get("id")?;
        let display_name: String = row.get("display_name")?;
        let branch: String = row.get("branch")?;
        let status: String = row.get("status")?;
        let mut member = Member::new(id.as_str(), display_name, branch, status);
        member.primary_generation = row.get("primary_generation")?;
        members.insert(id, member);
    }
    Ok(members)
}

fn load_member_sets(conn: &Connection, members: &mut BTreeMap<String, Member>) -> RepoResult<()> {
    let mut stmt = conn.prepare("SELECT member_id, generation FROM member_generations;")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let member_id: String = row.get(0)?;
        let member = members
            .get_mut(&member_id)
            .ok_or_else(|| dangling("member_generations", &member_id))?;
        member.generations.insert(row.get(1)?);
    }

    let mut stmt = conn.prepare("SELECT member_id, keyword FROM member_keywords;")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let member_id: String = row.get(0)?;
        let member = members
            .get_mut(&member_id)
            .ok_or_else(|| dangling("member_keywords", &member_id))?;
        member.keywords.insert(row.get(1)?);
    }
    Ok(())
}

fn load_units(conn: &Connection) -> RepoResult<BTreeMap<String, Unit>> {
    let mut stmt = conn.prepare("SELECT id, display_name, note FROM units ORDER BY id ASC;")?;
    let mut rows = stmt.query([])?;
    let mut units = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get("id")?;
        let display_name: String = row.get("display_name")?;
        let mut unit = Unit::new(id.as_str(), display_name);
        unit.note = row.get("note")?;
        units.insert(id, unit);
    }
    Ok(units)
}

fn load_unit_aliases(conn: &Connection, units: &mut BTreeMap<String, Unit>) -> RepoResult<()> {
    let mut stmt = conn.prepare("SELECT unit_id, alias FROM unit_aliases;")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let unit_id: String = row.get(0)?;
        let unit = units
            .get_mut(&unit_id)
            .ok_or_else(|| dangling("unit_aliases", &unit_id))?;
        unit.aliases.insert(row.get(1)?);
    }
    Ok(())
}

fn load_memberships(
    conn: &Connection,
    members: &BTreeMap<String, Member>,
    units: &mut BTreeMap<String, Unit>,
) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "SELECT unit_id, member_id, weight
         FROM unit_members
         ORDER BY unit_id ASC, weight ASC, member_id ASC;",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let unit_id: String = row.get("unit_id")?;
        let member_id: String = row.get("member_id")?;
        let weight: f64 = row.get("weight")?;
        if !members.contains_key(&member_id) {
            return Err(dangling("unit_members", &member_id));
        }
        let unit = units
            .get_mut(&unit_id)
            .ok_or_else(|| dangling("unit_members", &unit_id))?;
        unit.members.push(UnitMembership { member_id, weight });
    }
    Ok(())
}

fn dangling(table: &str, id: &str) -> RepoError {
    RepoError::InvalidData(format!("{table} references unknown id `{id}`"))
}

fn ensure_roster_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

#[cfg(test)]
mod tests {
    use super::{CommitInfo, MemoryRosterRepository, RepoError, RosterRepository, SqliteRosterRepository};
    use crate::model::dataset::Dataset;
    use crate::model::member::Member;
    use crate::model::unit::{Unit, UnitMembership};
    use rusqlite::Connection;

    fn dataset() -> Dataset {
        let mut alice = Member::new("m1", "Alice", "EN", "active");
        alice.generations.insert("1".to_string());
        alice.primary_generation = Some("1".to_string());
        alice.keywords.insert("Ally".to_string());
        let mut unit = Unit::new("u1", "Unit One");
        unit.aliases.insert("U-1".to_string());
        unit.note = Some("debut".to_string());
        unit.members.push(UnitMembership {
            member_id: "m1".to_string(),
            weight: 2.5,
        });
        Dataset {
            members: vec![alice, Member::new("m2", "Bob", "JP", "retired")],
            units: vec![unit],
        }
    }

    fn commit(generation: u64) -> CommitInfo {
        CommitInfo {
            generation,
            fingerprint: format!("fp-{generation}"),
        }
    }

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteRosterRepository::try_new(conn).err().unwrap();
        assert!(matches!(err, RepoError::UninitializedConnection { .. }));
    }

    #[test]
    fn sqlite_round_trips_dataset_and_commit() {
        let conn = crate::db::open_db_in_memory().unwrap();
        let mut repo = SqliteRosterRepository::try_new(conn).unwrap();
        assert!(repo.load_dataset().unwrap().is_none());

        repo.replace_dataset(&dataset(), &commit(1)).unwrap();
        let loaded = repo.load_dataset().unwrap().unwrap();
        assert_eq!(loaded.commit, commit(1));
        assert_eq!(loaded.dataset, dataset());
    }

    #[test]
    fn replace_drops_previous_rows() {
        let conn = crate::db::open_db_in_memory().unwrap();
        let mut repo = SqliteRosterRepository::try_new(conn).unwrap();
        repo.replace_dataset(&dataset(), &commit(1)).unwrap();

        let smaller = Dataset {
            members: vec![Member::new("m9", "Zed", "EN", "active")],
            units: Vec::new(),
        };
        repo.replace_dataset(&smaller, &commit(2)).unwrap();

        let loaded = repo.load_dataset().unwrap().unwrap();
        assert_eq!(loaded.commit.generation, 2);
        assert_eq!(loaded.dataset, smaller);
    }

    #[test]
    fn failed_replace_keeps_previous_commit() {
        let conn = crate::db::open_db_in_memory().unwrap();
        let mut repo = SqliteRosterRepository::try_new(conn).unwrap();
        repo.replace_dataset(&dataset(), &commit(1)).unwrap();

        let mut broken = dataset();
        broken.units[0].members[0].weight = f64::NAN;
        assert!(repo.replace_dataset(&broken, &commit(2)).is_err());

        let loaded = repo.load_dataset().unwrap().unwrap();
        assert_eq!(loaded.commit, commit(1));
        assert_eq!(loaded.dataset, dataset());
    }

    #[test]
    fn memory_repository_keeps_last_commit() {
        let mut repo = MemoryRosterRepository::new();
        assert!(repo.load_dataset().unwrap().is_none());
        repo.replace_dataset(&dataset(), &commit(3)).unwrap();
        assert_eq!(repo.load_dataset().unwrap().unwrap().commit.generation, 3);
    }
}
