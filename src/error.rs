// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup error taxonomy.
//!
//! Every public backup and merge operation reports failure through
//! [`BackupError`]. No failure leaves local data in a state other than the
//! one it had before the operation began.

use crate::{remote::RemoteError, store::StoreError};

/// All possible error types for backup and merge operations.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Remote operation attempted without valid credentials.
    #[error("not authenticated with remote store")]
    AuthenticationRequired,

    /// Snapshot fails structural or application tag validation.
    #[error("invalid backup data format: {0}")]
    InvalidBackupFormat(String),

    /// Transfer against remote store fails.
    #[error(transparent)]
    RemoteIo(#[from] RemoteError),

    /// Snapshot records cannot be merged.
    ///
    /// Well-formed snapshots never trigger this. Seeing it means the snapshot
    /// passed structural validation, but its records do not follow the record
    /// model, e.g., a session without a date.
    #[error("merge computation failed: {source}")]
    MergeComputation {
        #[source]
        source: serde_json::Error,
    },

    /// Merged result cannot be read from, or written back to local storage.
    #[error(transparent)]
    Persistence(#[from] StoreError),

    /// Another merge is still running against the same local state.
    #[error("another merge operation is already in progress")]
    OperationInProgress,
}

/// Friendly result alias :3
pub type Result<T, E = BackupError> = std::result::Result<T, E>;
