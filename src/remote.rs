// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote snapshot store.
//!
//! Backups leave the device through a [`RemoteStore`]: an opaque object store
//! that can list, download, upload, and delete snapshots once the user has
//! authenticated against it.
//!
//! # Directory Remote
//!
//! [`DirectoryRemote`] implements the remote store over a plain directory,
//! which is meant to be a folder synced by some cloud drive client. Each
//! snapshot is one pretty-printed JSON file named
//! `meditation-backup-<timestamp>.json`. The file stem doubles as the
//! snapshot id.
//!
//! Authentication is modeled by a credential token file that lives outside
//! the backup directory. Signing in writes the token, signing out removes it.
//!
//! Downloads hand back raw JSON on purpose. Remote data is untrusted, and it
//! is the executor's job to validate it before anything else looks at it.

use crate::record::Snapshot;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, info, instrument};

const SNAPSHOT_PREFIX: &str = "meditation-backup-";
const SNAPSHOT_EXTENSION: &str = "json";

/// Listing entry of one remote snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub id: String,
    pub name: String,
    pub created_time: DateTime<Utc>,
    pub size: u64,
}

/// Layer of indirection for remote snapshot storage.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Acquire credentials.
    async fn authenticate(&self) -> Result<()>;

    /// Drop credentials.
    async fn sign_out(&self) -> Result<()>;

    /// Check if credentials are available.
    async fn is_authenticated(&self) -> bool;

    /// List available snapshots, newest first.
    async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>>;

    /// Download raw snapshot content.
    async fn download(&self, id: &str) -> Result<Value>;

    /// Upload new snapshot.
    async fn upload(&self, snapshot: &Snapshot) -> Result<SnapshotInfo>;

    /// Delete snapshot.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Remote store backed by a (synced) directory.
#[derive(Debug, Clone)]
pub struct DirectoryRemote {
    root: PathBuf,
    token: PathBuf,
}

impl DirectoryRemote {
    /// Construct new directory remote.
    ///
    /// Nothing is touched on disk until [`RemoteStore::authenticate`] is
    /// called.
    pub fn new(root: impl Into<PathBuf>, token: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            token: token.into(),
        }
    }

    /// Path to backup directory.
    pub fn path(&self) -> &Path {
        self.root.as_path()
    }

    fn snapshot_path(&self, id: &str) -> Result<PathBuf> {
        // INVARIANT: Snapshot ids never escape the backup directory.
        if !id.starts_with(SNAPSHOT_PREFIX)
            || id.contains(['/', '\\'])
            || id.contains("..")
        {
            return Err(RemoteError::InvalidId(id.into()));
        }

        Ok(self.root.join(format!("{id}.{SNAPSHOT_EXTENSION}")))
    }

    async fn describe(&self, path: &Path) -> Result<Option<SnapshotInfo>> {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return Ok(None);
        };
        let Some(id) = name
            .strip_suffix(SNAPSHOT_EXTENSION)
            .and_then(|stem| stem.strip_suffix('.'))
            .filter(|stem| stem.starts_with(SNAPSHOT_PREFIX))
        else {
            return Ok(None);
        };

        let metadata = fs::metadata(path).await.map_err(|err| RemoteError::Io {
            source: err,
            path: path.to_path_buf(),
        })?;
        if !metadata.is_file() {
            return Ok(None);
        }

        let created_time = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .map_err(|err| RemoteError::Io {
                source: err,
                path: path.to_path_buf(),
            })?;

        Ok(Some(SnapshotInfo {
            id: id.into(),
            name: name.into(),
            created_time,
            size: metadata.len(),
        }))
    }
}

#[async_trait]
impl RemoteStore for DirectoryRemote {
    #[instrument(skip(self), level = "debug")]
    async fn authenticate(&self) -> Result<()> {
        info!("authenticate against backup directory {:?}", self.root.display());
        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| RemoteError::Io {
                source: err,
                path: self.root.clone(),
            })?;

        if let Some(parent) = self.token.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| RemoteError::Io {
                    source: err,
                    path: parent.to_path_buf(),
                })?;
        }

        let issued_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        fs::write(&self.token, issued_at)
            .await
            .map_err(|err| RemoteError::Io {
                source: err,
                path: self.token.clone(),
            })
    }

    async fn sign_out(&self) -> Result<()> {
        match fs::remove_file(&self.token).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RemoteError::Io {
                source: err,
                path: self.token.clone(),
            }),
        }
    }

    async fn is_authenticated(&self) -> bool {
        fs::try_exists(&self.token).await.unwrap_or(false)
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(RemoteError::Io {
                    source: err,
                    path: self.root.clone(),
                })
            }
        };

        let mut snapshots = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|err| RemoteError::Io {
                source: err,
                path: self.root.clone(),
            })?;
            let Some(entry) = entry else {
                break;
            };

            if let Some(info) = self.describe(&entry.path()).await? {
                snapshots.push(info);
            }
        }

        snapshots.sort_by(|a, b| {
            b.created_time
                .cmp(&a.created_time)
                .then_with(|| b.id.cmp(&a.id))
        });
        debug!("found {} snapshots", snapshots.len());

        Ok(snapshots)
    }

    #[instrument(skip(self), level = "debug")]
    async fn download(&self, id: &str) -> Result<Value> {
        let path = self.snapshot_path(id)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(RemoteError::NotFound(id.into()))
            }
            Err(err) => return Err(RemoteError::Io { source: err, path }),
        };

        serde_json::from_slice(&bytes).map_err(|err| RemoteError::Decode {
            source: err,
            id: id.into(),
        })
    }

    #[instrument(skip(self, snapshot), level = "debug")]
    async fn upload(&self, snapshot: &Snapshot) -> Result<SnapshotInfo> {
        let contents = serde_json::to_vec_pretty(snapshot).map_err(RemoteError::Encode)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| RemoteError::Io {
                source: err,
                path: self.root.clone(),
            })?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string();
        let mut id = format!("{SNAPSHOT_PREFIX}{stamp}");
        let mut suffix = 1;
        while fs::try_exists(self.snapshot_path(&id)?).await.unwrap_or(false) {
            id = format!("{SNAPSHOT_PREFIX}{stamp}-{suffix}");
            suffix += 1;
        }

        let path = self.snapshot_path(&id)?;
        fs::write(&path, contents)
            .await
            .map_err(|err| RemoteError::Io {
                source: err,
                path: path.clone(),
            })?;
        info!("uploaded snapshot {id}");

        self.describe(&path)
            .await?
            .ok_or_else(|| RemoteError::NotFound(id))
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.snapshot_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(RemoteError::NotFound(id.into())),
            Err(err) => Err(RemoteError::Io { source: err, path }),
        }
    }
}

/// All possible error types for remote store interaction.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Snapshot id does not name a snapshot file.
    #[error("invalid snapshot id {0:?}")]
    InvalidId(String),

    /// Snapshot does not exist.
    #[error("snapshot {0:?} not found")]
    NotFound(String),

    /// Transfer fails.
    #[error("remote transfer failed at {:?}: {source}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Downloaded snapshot is not JSON.
    #[error("snapshot {id:?} is not valid JSON: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        id: String,
    },

    /// Snapshot cannot be encoded for upload.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Friendly result alias :3
pub type Result<T, E = RemoteError> = std::result::Result<T, E>;
