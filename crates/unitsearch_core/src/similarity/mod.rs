//! Member similarity from shared unit membership.
//!
//! # Responsibility
//! - Derive a member x unit incidence matrix from a catalog snapshot.
//! - Rank members by cosine similarity to a query member.
//!
//! # Invariants
//! - The matrix is rebuilt with every committed snapshot and never mutated.
//! - A member in no unit has similarity 0 with every other member.

pub mod matrix;
