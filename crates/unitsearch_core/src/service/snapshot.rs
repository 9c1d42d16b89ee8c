//! One committed, immutable query state.
//!
//! # Responsibility
//! - Bundle catalog, search indexes and incidence matrix built from the same
//!   dataset so readers never see them out of step.
//!
//! # Invariants
//! - Every part is derived from `catalog` during [`Snapshot::build`] and never
//!   mutated afterwards.
//! - An unloaded snapshot has no commit and empty parts.

use crate::model::dataset::Dataset;
use crate::repo::CommitInfo;
use crate::search::index::{MemberIndex, UnitIndex};
use crate::similarity::matrix::{IncidenceMatrix, SimilarityWeighting};
use crate::store::catalog::Catalog;
use log::debug;
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    commit: Option<CommitInfo>,
    catalog: Catalog,
    members: MemberIndex,
    units: UnitIndex,
    matrix: IncidenceMatrix,
}

impl Snapshot {
    /// State served before the first commit.
    pub fn unloaded() -> Self {
        Self::default()
    }

    /// Builds catalog, indexes and matrix for a committed dataset.
    pub fn build(dataset: Dataset, commit: CommitInfo, weighting: SimilarityWeighting) -> Self {
        let started_at = Instant::now();
        let catalog = Catalog::new(dataset);
        let members = MemberIndex::build(&catalog);
        let units = UnitIndex::build(&catalog);
        let matrix = IncidenceMatrix::build(&catalog, weighting);
        debug!(
            "event=snapshot_build module=service status=ok generation={} members={} units={} tokens={} nonzero={} weighting={} duration_ms={}",
            commit.generation,
            catalog.member_count(),
            catalog.unit_count(),
            members.text().token_count(),
            matrix.nonzero_count(),
            matrix.weighting().as_str(),
            started_at.elapsed().as_millis()
        );

        Self {
            commit: Some(commit),
            catalog,
            members,
            units,
            matrix,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.commit.is_some()
    }

    pub fn commit(&self) -> Option<&CommitInfo> {
        self.commit.as_ref()
    }

    /// Commit generation, 0 when nothing was committed yet.
    pub fn generation(&self) -> u64 {
        self.commit.as_ref().map_or(0, |commit| commit.generation)
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.commit
            .as_ref()
            .map(|commit| commit.fingerprint.as_str())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn member_index(&self) -> &MemberIndex {
        &self.members
    }

    pub fn unit_index(&self) -> &UnitIndex {
        &self.units
    }

    pub fn matrix(&self) -> &IncidenceMatrix {
        &self.matrix
    }
}
