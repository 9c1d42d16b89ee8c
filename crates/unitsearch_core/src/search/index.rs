//! In-memory keyword index for members and units.
//!
//! # Responsibility
//! - Keep every display name and keyword as an individual lowercase term.
//! - Keep an inverted token -> position map for whole-word hits.
//! - Shape search pages (`items`, `total`, applied limit and offset).
//!
//! # Invariants
//! - Positions refer to the sorted member/unit slices of the source catalog.
//! - Empty (or blank) query text matches every entry.
//! - `total` counts matches before pagination.

use crate::model::member::Member;
use crate::model::unit::Unit;
use crate::store::catalog::Catalog;
use crate::store::filter::MemberFilter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Page size used when the caller does not pass one.
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

static TOKEN_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid token separator regex"));

/// How an entry matched the query. Higher ranks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Blank query; every entry matches.
    All,
    /// Query is a substring of some term.
    Substring,
    /// Query equals one token of some term.
    Token,
    /// Query equals a whole term.
    Exact,
}

/// Member search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free text; matched case-insensitively.
    pub text: String,
    pub filter: MemberFilter,
    /// Maximum hits per page. `None` uses the configured default.
    pub limit: Option<u32>,
    /// Number of hits to skip.
    pub offset: u32,
}

impl SearchQuery {
    /// Creates an unfiltered first-page query.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: MemberFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }
}

/// One page of ranked results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage<T> {
    pub items: Vec<T>,
    /// Matches before pagination.
    pub total: usize,
    pub applied_limit: u32,
    pub offset: u32,
}

impl<T> SearchPage<T> {
    fn empty(applied_limit: u32, offset: u32) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            applied_limit,
            offset,
        }
    }
}

/// Member search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberHit {
    pub member: Member,
    pub match_kind: MatchKind,
}

/// Unit search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitHit {
    pub unit_id: String,
    pub display_name: String,
    pub match_kind: MatchKind,
}

/// Lowercase term and token index over an ordered list of documents.
#[derive(Debug, Clone, Default)]
pub struct TextIndex {
    terms: Vec<Vec<String>>,
    tokens: BTreeMap<String, Vec<usize>>,
}

impl TextIndex {
    /// Indexes documents in order; each document is a list of terms.
    pub fn build<'a, D, T>(documents: D) -> Self
    where
        D: IntoIterator<Item = T>,
        T: IntoIterator<Item = &'a str>,
    {
        let mut index = Self::default();
        for (position, document) in documents.into_iter().enumerate() {
            let mut terms = Vec::new();
            for term in document {
                let term = normalize_text(term);
                if term.is_empty() {
                    continue;
                }
                for token in tokenize(&term) {
                    let postings = index.tokens.entry(token.to_string()).or_default();
                    if postings.last() != Some(&position) {
                        postings.push(position);
                    }
                }
                terms.push(term);
            }
            index.terms.push(terms);
        }
        index
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of distinct tokens.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Document positions containing `token` as a whole word.
    pub fn postings(&self, token: &str) -> &[usize] {
        self.tokens.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns `(position, match_kind)` for every matching document,
    /// ranked by match kind descending, then position ascending.
    pub fn lookup(&self, text: &str) -> Vec<(usize, MatchKind)> {
        let needle = normalize_text(text);
        if needle.is_empty() {
            return (0..self.terms.len())
                .map(|position| (position, MatchKind::All))
                .collect();
        }

        let mut best: Vec<Option<MatchKind>> = vec![None; self.terms.len()];
        for position in self.postings(&needle) {
            best[*position] = Some(MatchKind::Token);
        }
        for (position, terms) in self.terms.iter().enumerate() {
            if terms.iter().any(|term| *term == needle) {
                best[position] = Some(MatchKind::Exact);
            } else if best[position].is_none() && terms.iter().any(|term| term.contains(&needle)) {
                best[position] = Some(MatchKind::Substring);
            }
        }

        let mut matches: Vec<(usize, MatchKind)> = best
            .into_iter()
            .enumerate()
            .filter_map(|(position, kind)| kind.map(|kind| (position, kind)))
            .collect();
        matches.sort_by_key(|(position, kind)| (Reverse(*kind), *position));
        matches
    }
}

/// Search index over catalog members: display name plus keywords.
#[derive(Debug, Clone, Default)]
pub struct MemberIndex {
    text: TextIndex,
}

impl MemberIndex {
    pub fn build(catalog: &Catalog) -> Self {
        Self {
            text: TextIndex::build(catalog.members().iter().map(Member::search_terms)),
        }
    }

    pub fn text(&self) -> &TextIndex {
        &self.text
    }

    /// Runs `query` against `catalog`, which must be the catalog this
    /// index was built from.
    ///
    /// `applied_limit` is the already-clamped page size.
    pub fn search(
        &self,
        catalog: &Catalog,
        query: &SearchQuery,
        applied_limit: u32,
    ) -> SearchPage<MemberHit> {
        let members = catalog.members();
        let matches: Vec<(usize, MatchKind)> = self
            .text
            .lookup(&query.text)
            .into_iter()
            .filter(|(position, _)| {
                members
                    .get(*position)
                    .is_some_and(|member| query.filter.matches(member))
            })
            .collect();

        paginate(matches, applied_limit, query.offset, |position, match_kind| {
            MemberHit {
                member: members[position].clone(),
                match_kind,
            }
        })
    }
}

/// Search index over catalog units: display name plus aliases.
#[derive(Debug, Clone, Default)]
pub struct UnitIndex {
    text: TextIndex,
}

impl UnitIndex {
    pub fn build(catalog: &Catalog) -> Self {
        Self {
            text: TextIndex::build(catalog.units().iter().map(Unit::search_terms)),
        }
    }

    pub fn search(
        &self,
        catalog: &Catalog,
        text: &str,
        applied_limit: u32,
        offset: u32,
    ) -> SearchPage<UnitHit> {
        let units = catalog.units();
        let matches: Vec<(usize, MatchKind)> = self
            .text
            .lookup(text)
            .into_iter()
            .filter(|(position, _)| *position < units.len())
            .collect();

        paginate(matches, applied_limit, offset, |position, match_kind| UnitHit {
            unit_id: units[position].id.clone(),
            display_name: units[position].display_name.clone(),
            match_kind,
        })
    }
}

fn paginate<T>(
    matches: Vec<(usize, MatchKind)>,
    applied_limit: u32,
    offset: u32,
    mut to_item: impl FnMut(usize, MatchKind) -> T,
) -> SearchPage<T> {
    if matches.is_empty() {
        return SearchPage::empty(applied_limit, offset);
    }

    let total = matches.len();
    let items = matches
        .into_iter()
        .skip(offset as usize)
        .take(applied_limit as usize)
        .map(|(position, kind)| to_item(position, kind))
        .collect();

    SearchPage {
        items,
        total,
        applied_limit,
        offset,
    }
}

fn normalize_text(value: &str) -> String {
    value.trim().to_lowercase()
}

fn tokenize(term: &str) -> impl Iterator<Item = &str> {
    TOKEN_SEPARATOR_RE
        .split(term)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{tokenize, MatchKind, TextIndex};

    fn index() -> TextIndex {
        TextIndex::build(vec![
            vec!["Alice Liddell", "Al"],
            vec!["Bob", "Bobby-Tables"],
            vec!["Carol"],
        ])
    }

    #[test]
    fn tokenize_splits_on_punctuation_and_spaces() {
        let tokens: Vec<_> = tokenize("bobby-tables  o'neil").collect();
        assert_eq!(tokens, vec!["bobby", "tables", "o", "neil"]);
    }

    #[test]
    fn exact_beats_token_beats_substring() {
        let index = index();
        let hits = index.lookup("al");
        assert_eq!(hits[0], (0, MatchKind::Exact));

        let hits = index.lookup("TABLES");
        assert_eq!(hits, vec![(1, MatchKind::Token)]);

        let hits = index.lookup("aro");
        assert_eq!(hits, vec![(2, MatchKind::Substring)]);
    }

    #[test]
    fn ties_are_ordered_by_position() {
        let hits = index().lookup("l");
        let positions: Vec<usize> = hits.iter().map(|(position, _)| *position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn blank_query_matches_everything() {
        let hits = index().lookup("   ");
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|(_, kind)| *kind == MatchKind::All));
    }

    #[test]
    fn postings_are_deduplicated_per_document() {
        let index = TextIndex::build(vec![vec!["bob bob", "bob"]]);
        assert_eq!(index.postings("bob"), &[0]);
    }
}
