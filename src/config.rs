// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that meditrack uses to
//! simplify the process of serialization and deserialization. File I/O is
//! left to the caller to figure out.
//!
//! # General Layout
//!
//! ```toml
//! [storage]
//! data_dir = "$XDG_DATA_HOME/meditrack"
//!
//! [remote]
//! backup_dir = "~/Drive/meditrack"
//! upload_safety_backup = false
//! ```

use crate::path::{default_backup_dir, default_data_dir, NoWayHome};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Name of file that marks the remote store as authenticated.
const REMOTE_TOKEN_FILE: &str = "remote-session";

/// Meditrack configuration.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Local persistence settings.
    pub storage: StorageSettings,

    /// Remote store settings.
    pub remote: RemoteSettings,
}

impl Config {
    /// Construct configuration from default paths.
    ///
    /// # Errors
    ///
    /// - Return [`NoWayHome`] if default paths cannot be determined.
    pub fn try_default() -> Result<Self, NoWayHome> {
        Ok(Self {
            storage: StorageSettings {
                data_dir: default_data_dir()?,
            },
            remote: RemoteSettings {
                backup_dir: default_backup_dir()?,
                upload_safety_backup: false,
            },
        })
    }

    /// Path to credential token of remote store.
    ///
    /// The token lives next to local data, never inside the backup directory.
    pub fn remote_token_path(&self) -> PathBuf {
        self.storage.data_dir.join(REMOTE_TOKEN_FILE)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        config.storage.data_dir = expand_path(&config.storage.data_dir)?;
        config.remote.backup_dir = expand_path(&config.remote.backup_dir)?;

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Local persistence settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Directory holding session, settings, and progress files.
    pub data_dir: PathBuf,
}

/// Remote store settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RemoteSettings {
    /// Directory acting as remote object store for backup snapshots.
    pub backup_dir: PathBuf,

    /// Upload the pre-merge safety backup after a successful merge.
    #[serde(default)]
    pub upload_safety_backup: bool,
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
