// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local persistence.
//!
//! Meditrack keeps its local state in three records: sessions, settings, and
//! progress. The merge engine never touches storage directly. It consumes and
//! produces plain [`LocalState`] values, and leaves reading and writing to a
//! [`LocalStore`].
//!
//! # Data Directory Layout
//!
//! [`FileStore`] keeps each record as a JSON file inside one data directory,
//! which defaults to `$XDG_DATA_HOME/meditrack`:
//!
//! - `meditation_sessions.json`
//! - `app_settings.json`
//! - `user_progress.json`
//!
//! A missing file is not an error. It simply means the record was never
//! saved, so its default value is used instead.
//!
//! # Batch Writes
//!
//! [`LocalStore::save_all`] treats all three records as one batch. The file
//! store first stages every record into a temporary file, and only starts
//! swapping staged files in once every write succeeded. Each original is
//! moved aside to a `.bak` file before its replacement lands. If any swap
//! fails, the swapped originals are moved back, and the staged files are
//! removed, so a failed batch leaves every original file as it was.

use crate::{
    progress::Progress,
    record::{default_settings, LocalState, Session, Settings},
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::{fs, sync::Mutex};
use tracing::{debug, instrument, warn};

const SESSIONS_FILE: &str = "meditation_sessions.json";
const SETTINGS_FILE: &str = "app_settings.json";
const PROGRESS_FILE: &str = "user_progress.json";

/// Layer of indirection for local persistence.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Load session collection.
    async fn load_sessions(&self) -> Result<Vec<Session>>;

    /// Load settings mapping.
    async fn load_settings(&self) -> Result<Settings>;

    /// Load progress aggregate.
    async fn load_progress(&self) -> Result<Progress>;

    /// Replace session collection.
    async fn save_sessions(&self, sessions: &[Session]) -> Result<()>;

    /// Replace settings mapping.
    async fn save_settings(&self, settings: &Settings) -> Result<()>;

    /// Replace progress aggregate.
    async fn save_progress(&self, progress: &Progress) -> Result<()>;

    /// Replace all records as one batch.
    ///
    /// If any individual write fails, the whole batch fails.
    async fn save_all(&self, state: &LocalState) -> Result<()>;

    /// Load all records.
    async fn load_all(&self) -> Result<LocalState> {
        let (sessions, settings, progress) = futures::try_join!(
            self.load_sessions(),
            self.load_settings(),
            self.load_progress()
        )?;

        Ok(LocalState {
            sessions,
            settings,
            progress,
        })
    }
}

/// Local persistence through JSON files in a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open data directory, creating it if missing.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::CreateDataDir`] if data directory cannot be
    ///   created.
    #[instrument(skip(root), level = "debug")]
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        debug!("open data directory: {:?}", root.display());
        fs::create_dir_all(&root)
            .await
            .map_err(|err| StoreError::CreateDataDir {
                source: err,
                path: root.clone(),
            })?;

        Ok(Self { root })
    }

    /// Path to data directory.
    pub fn path(&self) -> &Path {
        self.root.as_path()
    }

    async fn read<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let path = self.root.join(name);
        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|err| StoreError::Decode { source: err, path }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Read { source: err, path }),
        }
    }

    async fn write<T>(&self, name: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let staged = self.stage(name, encode(value)?).await?;
        self.commit(&staged, name).await
    }

    async fn stage(&self, name: &str, bytes: Vec<u8>) -> Result<PathBuf> {
        let path = self.root.join(format!("{name}.tmp"));
        fs::write(&path, bytes)
            .await
            .map_err(|err| StoreError::Write {
                source: err,
                path: path.clone(),
            })?;

        Ok(path)
    }

    async fn commit(&self, staged: &Path, name: &str) -> Result<()> {
        let path = self.root.join(name);
        fs::rename(staged, &path)
            .await
            .map_err(|err| StoreError::Write { source: err, path })
    }

    /// Replace record file with staged file, keeping the original aside.
    ///
    /// Returns path of the kept original, or `None` if there was none.
    async fn swap(&self, staged: &Path, name: &str) -> Result<Option<PathBuf>> {
        let path = self.root.join(name);
        let backup = self.root.join(format!("{name}.bak"));
        let kept = match fs::rename(&path, &backup).await {
            Ok(()) => Some(backup),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(StoreError::Write { source: err, path }),
        };

        if let Err(err) = self.commit(staged, name).await {
            self.restore(name, kept.as_deref()).await;
            return Err(err);
        }

        Ok(kept)
    }

    async fn roll_back(&self, swapped: &[(&str, Option<PathBuf>)]) {
        for (name, backup) in swapped.iter().rev() {
            self.restore(name, backup.as_deref()).await;
        }
    }

    /// Put kept original back in place, or remove the record if it had none.
    async fn restore(&self, name: &str, backup: Option<&Path>) {
        let path = self.root.join(name);
        let result = match backup {
            Some(backup) => fs::rename(backup, &path).await,
            None => fs::remove_file(&path).await,
        };

        if let Err(err) = result {
            warn!("cannot restore {:?}: {err}", path.display());
        }
    }
}

async fn discard<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!("cannot remove {:?}: {err}", path.display()),
        }
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn load_sessions(&self) -> Result<Vec<Session>> {
        Ok(self.read(SESSIONS_FILE).await?.unwrap_or_default())
    }

    async fn load_settings(&self) -> Result<Settings> {
        Ok(self.read(SETTINGS_FILE).await?.unwrap_or_else(default_settings))
    }

    async fn load_progress(&self) -> Result<Progress> {
        Ok(self.read(PROGRESS_FILE).await?.unwrap_or_default())
    }

    async fn save_sessions(&self, sessions: &[Session]) -> Result<()> {
        self.write(SESSIONS_FILE, sessions).await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write(SETTINGS_FILE, settings).await
    }

    async fn save_progress(&self, progress: &Progress) -> Result<()> {
        self.write(PROGRESS_FILE, progress).await
    }

    #[instrument(skip(self, state), level = "debug")]
    async fn save_all(&self, state: &LocalState) -> Result<()> {
        // INVARIANT: Encode everything before the first byte hits the disk.
        let batch = [
            (SESSIONS_FILE, encode(&state.sessions)?),
            (SETTINGS_FILE, encode(&state.settings)?),
            (PROGRESS_FILE, encode(&state.progress)?),
        ];

        let mut staged = Vec::with_capacity(batch.len());
        for (name, bytes) in batch {
            match self.stage(name, bytes).await {
                Ok(path) => staged.push((path, name)),
                Err(err) => {
                    discard(staged.iter().map(|(path, _)| path.as_path())).await;
                    return Err(err);
                }
            }
        }

        let mut swapped = Vec::with_capacity(staged.len());
        for (path, name) in &staged {
            match self.swap(path, name).await {
                Ok(backup) => swapped.push((*name, backup)),
                Err(err) => {
                    self.roll_back(&swapped).await;
                    discard(staged.iter().map(|(path, _)| path.as_path())).await;
                    return Err(err);
                }
            }
        }

        discard(swapped.iter().filter_map(|(_, backup)| backup.as_deref())).await;
        debug!("saved {} sessions to {:?}", state.sessions.len(), self.root.display());

        Ok(())
    }
}

/// Local persistence in memory.
///
/// Counts every write attempt, and can be told to reject writes. Useful for
/// previews that should never touch disk, and for exercising failure paths.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<LocalState>>,
    writes: Arc<AtomicUsize>,
    reject_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Construct new in-memory store holding given state.
    pub fn new(state: LocalState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            ..Self::default()
        }
    }

    /// Number of write attempts so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every following write fail, or succeed again.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Copy of currently stored state.
    pub async fn state(&self) -> LocalState {
        self.state.lock().await.clone()
    }

    fn begin_write(&self) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected);
        }

        Ok(())
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn load_sessions(&self) -> Result<Vec<Session>> {
        Ok(self.state.lock().await.sessions.clone())
    }

    async fn load_settings(&self) -> Result<Settings> {
        Ok(self.state.lock().await.settings.clone())
    }

    async fn load_progress(&self) -> Result<Progress> {
        Ok(self.state.lock().await.progress.clone())
    }

    async fn save_sessions(&self, sessions: &[Session]) -> Result<()> {
        self.begin_write()?;
        self.state.lock().await.sessions = sessions.to_vec();
        Ok(())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.begin_write()?;
        self.state.lock().await.settings = settings.clone();
        Ok(())
    }

    async fn save_progress(&self, progress: &Progress) -> Result<()> {
        self.begin_write()?;
        self.state.lock().await.progress = progress.clone();
        Ok(())
    }

    async fn save_all(&self, state: &LocalState) -> Result<()> {
        self.begin_write()?;
        *self.state.lock().await = state.clone();
        Ok(())
    }
}

fn encode<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    serde_json::to_vec(value).map_err(StoreError::Encode)
}

/// All possible error types for local persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Data directory cannot be created.
    #[error("failed to create data directory at {:?}", path.display())]
    CreateDataDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Record file cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Record file does not hold valid JSON for its record.
    #[error("failed to decode {:?}", path.display())]
    Decode {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Record cannot be encoded.
    #[error("failed to encode record")]
    Encode(#[source] serde_json::Error),

    /// Record file cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Store refuses writes.
    #[error("local store rejected write")]
    WriteRejected,
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
