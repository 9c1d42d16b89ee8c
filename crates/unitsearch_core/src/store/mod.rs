//! Committed roster entity set and its read APIs.
//!
//! # Responsibility
//! - Hold one immutable, typed entity set per committed reload.
//! - Answer point lookups, filtered listings and ordered unit membership.
//!
//! # Invariants
//! - A [`catalog::Catalog`] never changes after construction; replacement
//!   happens by swapping whole snapshots in the service layer.
//! - Lookups of unknown ids fail with [`NotFound`], never panic.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod catalog;
pub mod filter;

/// Entity family of a failed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Member,
    Unit,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Unit => "unit",
        }
    }
}

/// Lookup of an id that is not part of the committed entity set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFound {
    pub kind: EntityKind,
    pub id: String,
}

impl NotFound {
    pub fn member(id: &str) -> Self {
        Self {
            kind: EntityKind::Member,
            id: id.to_string(),
        }
    }

    pub fn unit(id: &str) -> Self {
        Self {
            kind: EntityKind::Unit,
            id: id.to_string(),
        }
    }
}

impl Display for NotFound {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found: {}", self.kind.as_str(), self.id)
    }
}

impl Error for NotFound {}
