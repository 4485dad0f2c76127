// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup orchestration.
//!
//! [`BackupService`] ties local persistence, the remote store, and the merge
//! executor together into the operations a user actually performs: sign in,
//! back up, look through backups, preview and merge one of them, and clean up
//! old ones.
//!
//! Every operation that touches the remote store requires the user to be
//! signed in first, and fails with [`BackupError::AuthenticationRequired`]
//! otherwise.

use crate::{
    error::{BackupError, Result},
    executor::{MergeExecutor, MergeOutcome},
    merge::preview::MergePreview,
    record::Snapshot,
    remote::{RemoteStore, SnapshotInfo},
    store::LocalStore,
};

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

/// Manage backups of local state against a remote store.
#[derive(Debug)]
pub struct BackupService<S, R>
where
    S: LocalStore,
    R: RemoteStore,
{
    executor: MergeExecutor<S>,
    remote: R,
    upload_safety_backup: bool,
}

impl<S, R> BackupService<S, R>
where
    S: LocalStore,
    R: RemoteStore,
{
    /// Construct new backup service.
    pub fn new(store: S, remote: R) -> Self {
        Self {
            executor: MergeExecutor::new(store),
            remote,
            upload_safety_backup: false,
        }
    }

    /// Upload the safety backup of every successful merge to remote store.
    pub fn upload_safety_backup(mut self, enable: bool) -> Self {
        self.upload_safety_backup = enable;
        self
    }

    /// Merge executor backing this service.
    pub fn executor(&self) -> &MergeExecutor<S> {
        &self.executor
    }

    /// Remote store backing this service.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Sign in to remote store.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::RemoteIo`] if credentials cannot be stored.
    pub async fn authenticate(&self) -> Result<()> {
        self.remote.authenticate().await?;
        info!("signed in to remote store");
        Ok(())
    }

    /// Sign out of remote store.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::RemoteIo`] if credentials cannot be removed.
    pub async fn sign_out(&self) -> Result<()> {
        self.remote.sign_out().await?;
        info!("signed out of remote store");
        Ok(())
    }

    /// Check if user is signed in to remote store.
    pub async fn is_authenticated(&self) -> bool {
        self.remote.is_authenticated().await
    }

    async fn ensure_authenticated(&self) -> Result<()> {
        if !self.remote.is_authenticated().await {
            return Err(BackupError::AuthenticationRequired);
        }

        Ok(())
    }

    /// Export local state as a new snapshot without uploading it.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::Persistence`] if local state cannot be loaded.
    pub async fn create_full_backup(&self, now: DateTime<Utc>) -> Result<Snapshot> {
        let state = self.executor.store().load_all().await?;
        Ok(Snapshot::export(&state, now))
    }

    /// Export local state, and upload it to remote store.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::AuthenticationRequired`] if not signed in.
    /// - Return [`BackupError::Persistence`] if local state cannot be loaded.
    /// - Return [`BackupError::RemoteIo`] if upload fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn upload_backup(&self, now: DateTime<Utc>) -> Result<SnapshotInfo> {
        self.ensure_authenticated().await?;
        let snapshot = self.create_full_backup(now).await?;
        let info = self.remote.upload(&snapshot).await?;
        info!("backed up {} sessions as {}", snapshot.data.sessions.len(), info.id);

        Ok(info)
    }

    /// List snapshots in remote store, newest first.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::AuthenticationRequired`] if not signed in.
    /// - Return [`BackupError::RemoteIo`] if listing fails.
    pub async fn list_backups(&self) -> Result<Vec<SnapshotInfo>> {
        self.ensure_authenticated().await?;
        Ok(self.remote.list_snapshots().await?)
    }

    /// Preview merge of remote snapshot into local state.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::AuthenticationRequired`] if not signed in.
    /// - Return [`BackupError::RemoteIo`] if download fails.
    /// - Return any error of [`MergeExecutor::preview`].
    #[instrument(skip(self), level = "debug")]
    pub async fn preview_backup(&self, id: &str) -> Result<MergePreview> {
        self.ensure_authenticated().await?;
        let raw = self.remote.download(id).await?;
        self.executor.preview(&raw).await
    }

    /// Merge remote snapshot into local state.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::AuthenticationRequired`] if not signed in.
    /// - Return [`BackupError::RemoteIo`] if download fails.
    /// - Return any error of [`MergeExecutor::execute`].
    #[instrument(skip(self), level = "debug")]
    pub async fn merge_backup(&self, id: &str, now: DateTime<Utc>) -> Result<MergeOutcome> {
        self.ensure_authenticated().await?;
        let raw = self.remote.download(id).await?;
        let outcome = self.executor.execute(&raw, now).await?;

        if self.upload_safety_backup {
            match self.remote.upload(&outcome.safety_backup).await {
                Ok(info) => info!("uploaded pre-merge safety backup as {}", info.id),
                Err(error) => warn!("cannot upload pre-merge safety backup: {error}"),
            }
        }

        Ok(outcome)
    }

    /// Delete snapshot from remote store.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::AuthenticationRequired`] if not signed in.
    /// - Return [`BackupError::RemoteIo`] if deletion fails.
    pub async fn delete_backup(&self, id: &str) -> Result<()> {
        self.ensure_authenticated().await?;
        self.remote.delete(id).await?;
        info!("deleted backup {id}");
        Ok(())
    }
}
