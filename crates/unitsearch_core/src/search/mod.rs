//! Full-text search over the committed catalog.
//!
//! # Responsibility
//! - Build lowercase term and token indexes from a catalog snapshot.
//! - Rank, filter and paginate member (and unit) matches deterministically.
//!
//! # Invariants
//! - An index is only ever queried together with the catalog it was built from.
//! - Result order is relevance descending, then id ascending.

pub mod index;
