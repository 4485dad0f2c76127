// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations for the configuration file, the local data
//! directory, and the directory-backed remote store.

use std::path::PathBuf;

/// Determine default absolute path to local data directory.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/meditrack` as the default
/// absolute path for local session, settings, and progress files. Does not
/// check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if data directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("meditrack"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to backup directory of remote store.
///
/// Backups land in `$XDG_DATA_HOME/meditrack/backups` unless configured
/// otherwise. Pointing this at a synced drive folder is what makes the
/// backups leave the device.
///
/// # Errors
///
/// - Return [`NoWayHome`] if data directory path cannot be determined.
pub fn default_backup_dir() -> Result<PathBuf> {
    default_data_dir().map(|path| path.join("backups"))
}

/// Determine default absolute path to configuration file.
///
/// Uses `$XDG_CONFIG_HOME/meditrack/config.toml`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("meditrack").join("config.toml"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
