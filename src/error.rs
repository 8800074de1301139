// SPDX-License-Identifier: MIT
//! Error taxonomy for the project store.
//!
//! Four caller-visible conditions (clone, not-found, conflict, validation)
//! plus an internal catch-all. Mutating entry points must surface the
//! publish outcome through this type — a push rejection is never swallowed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Checkout failed: remote unreachable, branch missing, or the
    /// credential was rejected by the host. Fatal for the request.
    #[error("clone failed: {reason}")]
    Clone { reason: String },

    /// A requested entity file is absent. Recoverable — maps to a
    /// 4xx-style response at the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote rejected the push because the branch advanced past the
    /// session's base commit. The caller must restart the whole
    /// read-mutate-commit cycle from a fresh clone.
    #[error("push conflict: {reason}")]
    Conflict { reason: String },

    /// Malformed input: missing required fields, a bad entity id, or a
    /// manifest without the expected structure.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// Publish failed for a reason other than a concurrent writer
    /// (authentication, transport). The remote was left untouched.
    #[error("publish failed: {reason}")]
    Publish { reason: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    pub fn validation(reason: impl Into<String>) -> Self {
        StoreError::Validation {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound(what.into())
    }

    /// Classify a libgit2 error raised during clone into the taxonomy.
    pub(crate) fn from_clone(err: git2::Error) -> Self {
        StoreError::Clone {
            reason: err.message().to_string(),
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
