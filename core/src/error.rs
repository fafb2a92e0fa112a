//! Error taxonomy shared by every core operation.
//!
//! Validation failures are raised before any statement runs. Conflict and
//! not-found outcomes are expected results of the writers and are turned
//! into `false` by [`crate::service::KitchenService`]. Storage errors carry
//! the underlying SQLite failure; the enclosing transaction has already been
//! rolled back by the time the caller sees one.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open database at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for the outcomes the boundary reports as a plain failure
    /// rather than an error: duplicates and missing targets.
    #[must_use]
    pub fn is_soft_failure(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::NotFound(_))
    }

    /// Map a UNIQUE violation raised mid-transaction to [`Error::Conflict`].
    ///
    /// Writers check for duplicates before inserting, so this only fires
    /// when another connection wins the race for the same key.
    pub(crate) fn unique_as_conflict(err: rusqlite::Error, what: impl Into<String>) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Self::Conflict(what.into())
            }
            _ => Self::Storage(err),
        }
    }
}
