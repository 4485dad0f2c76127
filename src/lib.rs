// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Meditation habit tracking with two-way backup reconciliation.
//!
//! Meditrack records morning and evening meditation sittings, derives streak
//! statistics from them, and backs everything up to a remote store. The
//! interesting part is getting data back: a backup is never restored by
//! overwriting local data. Instead, the backup is __merged__ into local data
//! so that nothing recorded on either side gets lost.
//!
//! # Layout
//!
//! - [`record`]: sessions, settings, local state, and snapshots.
//! - [`progress`]: streak statistics derived from sessions.
//! - [`merge`]: pure conflict resolution, collection merging, and previews.
//! - [`executor`]: validated, all-or-nothing commit of one merge.
//! - [`backup`]: user-facing backup operations over both stores.
//! - [`store`] and [`remote`]: local and remote persistence.
//! - [`config`] and [`path`]: configuration file and default locations.

pub mod backup;
pub mod config;
pub mod error;
pub mod executor;
pub mod merge;
pub mod path;
pub mod progress;
pub mod record;
pub mod remote;
pub mod store;

pub use backup::BackupService;
pub use error::{BackupError, Result};
pub use executor::{MergeExecutor, MergeOutcome, MergePhase, MergeSummary};
pub use record::{LocalState, MergeKey, Session, SessionKind, Settings, Snapshot};
