//! Sparse incidence matrix and cosine ranking.
//!
//! # Invariants
//! - Row order equals catalog member order (id ascending); column order
//!   equals catalog unit order.
//! - Cell values are non-negative, so cosine scores lie in `[0, 1]`.
//! - Ranking: score descending, member id ascending; the query member and
//!   zero scores are never returned.

use crate::store::catalog::Catalog;
use crate::store::NotFound;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// How a membership contributes to its matrix cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityWeighting {
    /// 1.0 for every membership.
    #[default]
    Binary,
    /// `1 / (1 + weight)`: lower weights contribute more.
    InverseWeight,
}

impl SimilarityWeighting {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::InverseWeight => "inverse_weight",
        }
    }

    fn cell_value(self, weight: f64) -> f64 {
        match self {
            Self::Binary => 1.0,
            Self::InverseWeight => {
                let value = 1.0 / (1.0 + weight.max(0.0));
                if value.is_finite() {
                    value
                } else {
                    0.0
                }
            }
        }
    }
}

/// One ranked similarity result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarMember {
    pub member_id: String,
    pub score: f64,
}

/// Sparse member x unit matrix with precomputed row norms.
#[derive(Debug, Clone, Default)]
pub struct IncidenceMatrix {
    member_ids: Vec<String>,
    unit_ids: Vec<String>,
    member_rows: BTreeMap<String, usize>,
    /// Per row: `(column, value)` sorted by column.
    rows: Vec<Vec<(usize, f64)>>,
    /// Per column: `(row, value)` sorted by row.
    columns: Vec<Vec<(usize, f64)>>,
    norms: Vec<f64>,
    weighting: SimilarityWeighting,
}

impl IncidenceMatrix {
    /// Builds the matrix with one row per catalog member, including members
    /// that belong to no unit.
    pub fn build(catalog: &Catalog, weighting: SimilarityWeighting) -> Self {
        let member_ids: Vec<String> = catalog.members().iter().map(|m| m.id.clone()).collect();
        let unit_ids: Vec<String> = catalog.units().iter().map(|u| u.id.clone()).collect();
        let member_rows: BTreeMap<String, usize> = member_ids
            .iter()
            .enumerate()
            .map(|(row, id)| (id.clone(), row))
            .collect();

        let mut rows = vec![Vec::new(); member_ids.len()];
        let mut columns = vec![Vec::new(); unit_ids.len()];
        for (column, unit) in catalog.units().iter().enumerate() {
            for entry in &unit.members {
                let Some(row) = member_rows.get(&entry.member_id) else {
                    continue;
                };
                let value = weighting.cell_value(entry.weight);
                if value > 0.0 {
                    rows[*row].push((column, value));
                    columns[column].push((*row, value));
                }
            }
        }
        // Columns are visited in order, so rows are already sorted by column;
        // postings need sorting by row.
        for postings in &mut columns {
            postings.sort_by_key(|(row, _)| *row);
        }

        let norms = rows
            .iter()
            .map(|cells| cells.iter().map(|(_, v)| v * v).sum::<f64>().sqrt())
            .collect();

        Self {
            member_ids,
            unit_ids,
            member_rows,
            rows,
            columns,
            norms,
            weighting,
        }
    }

    pub fn weighting(&self) -> SimilarityWeighting {
        self.weighting
    }

    pub fn row_count(&self) -> usize {
        self.member_ids.len()
    }

    pub fn column_count(&self) -> usize {
        self.unit_ids.len()
    }

    /// Number of non-zero cells.
    pub fn nonzero_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Cell value for `(member, unit)`; 0 when either id is unknown.
    pub fn cell(&self, member_id: &str, unit_id: &str) -> f64 {
        let Some(row) = self.member_rows.get(member_id) else {
            return 0.0;
        };
        let Ok(column) = self.unit_ids.binary_search_by(|id| id.as_str().cmp(unit_id)) else {
            return 0.0;
        };
        self.rows[*row]
            .iter()
            .find(|(cell_column, _)| *cell_column == column)
            .map_or(0.0, |(_, value)| *value)
    }

    /// Cosine similarity between two members' rows.
    ///
    /// Returns 0 when either row is all zeros.
    pub fn cosine(&self, left_id: &str, right_id: &str) -> Result<f64, NotFound> {
        let left = self.row_of(left_id)?;
        let right = self.row_of(right_id)?;
        let denominator = self.norms[left] * self.norms[right];
        if denominator == 0.0 {
            return Ok(0.0);
        }

        let dot = sparse_dot(&self.rows[left], &self.rows[right]);
        Ok(clamp_score(dot / denominator))
    }

    /// Ranks every other member by cosine similarity to `member_id`.
    ///
    /// # Errors
    /// - `NotFound` when `member_id` is not a matrix row.
    pub fn similar(&self, member_id: &str, top_n: usize) -> Result<Vec<SimilarMember>, NotFound> {
        let query_row = self.row_of(member_id)?;
        let query_norm = self.norms[query_row];
        if top_n == 0 || query_norm == 0.0 {
            return Ok(Vec::new());
        }

        let mut dots: BTreeMap<usize, f64> = BTreeMap::new();
        for (column, query_value) in &self.rows[query_row] {
            for (row, value) in &self.columns[*column] {
                if *row != query_row {
                    *dots.entry(*row).or_insert(0.0) += query_value * value;
                }
            }
        }

        let mut scored: Vec<(usize, f64)> = dots
            .into_iter()
            .filter_map(|(row, dot)| {
                let denominator = query_norm * self.norms[row];
                if denominator == 0.0 {
                    return None;
                }
                let score = clamp_score(dot / denominator);
                (score > 0.0).then_some((row, score))
            })
            .collect();

        scored.sort_by(|left, right| compare_scored(left, right, &self.member_ids));
        scored.truncate(top_n);

        Ok(scored
            .into_iter()
            .map(|(row, score)| SimilarMember {
                member_id: self.member_ids[row].clone(),
                score,
            })
            .collect())
    }

    fn row_of(&self, member_id: &str) -> Result<usize, NotFound> {
        self.member_rows
            .get(member_id)
            .copied()
            .ok_or_else(|| NotFound::member(member_id))
    }
}

fn sparse_dot(left: &[(usize, f64)], right: &[(usize, f64)]) -> f64 {
    let (mut i, mut j, mut dot) = (0, 0, 0.0);
    while i < left.len() && j < right.len() {
        match left[i].0.cmp(&right[j].0) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                dot += left[i].1 * right[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}

fn compare_scored(left: &(usize, f64), right: &(usize, f64), member_ids: &[String]) -> Ordering {
    right
        .1
        .total_cmp(&left.1)
        .then_with(|| member_ids[left.0].cmp(&member_ids[right.0]))
}
