//! Store layer: repository contracts and the SQLite implementation.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for roster, parts and
//!   admin export.
//! - Enforce row-level rules inside the store, so callers cannot bypass them.
//!
//! # Invariants
//! - Part writes are idempotent upserts keyed on `(pair_id, part_name)`.
//! - Reads of pairs the viewer may not see behave like absent rows.
//! - Writes by anyone but the part's role fail with `PermissionDenied`.

use crate::db::DbError;
use crate::model::part::PartValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod export_repo;
pub mod part_repo;
pub mod roster_repo;
mod store;

pub use store::SqliteStore;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic store error for roster, part and export operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(PartValidationError),
    Db(DbError),
    /// Referenced pair does not exist.
    PairNotFound(String),
    /// Pair id already provisioned.
    DuplicatePair(String),
    /// Row-level rule rejected the caller.
    PermissionDenied {
        email: String,
        action: &'static str,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::PairNotFound(pair_id) => write!(f, "pair not found: {pair_id}"),
            Self::DuplicatePair(pair_id) => write!(f, "pair already exists: {pair_id}"),
            Self::PermissionDenied { email, action } => {
                write!(f, "permission denied: `{email}` may not {action}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::PairNotFound(_)
            | Self::DuplicatePair(_)
            | Self::PermissionDenied { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<PartValidationError> for RepoError {
    fn from(value: PartValidationError) -> Self {
        Self::Validation(value)
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
