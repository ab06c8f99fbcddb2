//! Domain error kinds.
//!
//! Errors are classified by what the caller should do with them:
//! - NotFound / DuplicateKey / InvalidInput: primary-entity failures, the
//!   operation failed and the caller must handle it.
//! - NoCallersAvailable: assignment was skipped, not failed — lead creation
//!   and import continue without an owner.
//! - Notifier failures never reach callers at all; they are logged where
//!   they happen.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no active callers available for assignment")]
    NoCallersAvailable,

    #[error(transparent)]
    Db(#[from] DbError),
}

impl CrmError {
    /// Map a storage error, turning unique-constraint violations into the
    /// distinct `DuplicateKey` kind so callers can retry or report them.
    pub fn from_db(err: DbError, key_desc: &str) -> CrmError {
        if err.is_unique_violation() {
            CrmError::DuplicateKey(key_desc.to_string())
        } else {
            CrmError::Db(err)
        }
    }
}

pub type CrmResult<T> = Result<T, CrmError>;
