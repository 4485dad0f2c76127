// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Merge execution.
//!
//! The executor owns the lifetime of one merge operation. It takes a raw
//! snapshot straight from the remote store, and walks it through the
//! following phases:
//!
//! 1. __Validating__: the snapshot must be an object with a nested `data`
//!    object, carry `version`, `timestamp`, and `app` fields, and be tagged
//!    with [`APP_TAG`]. Local state is loaded, and exported as a safety
//!    backup.
//! 2. __Merging__: snapshot records are decoded, and merged against local
//!    state entirely in memory.
//! 3. __Persisting__: merged sessions, merged settings, and progress
//!    recomputed from merged sessions are written back as one batch.
//!
//! Any failure moves the operation to [`MergePhase::Failed`] without
//! advancing further. Nothing is written before the persisting phase, so a
//! failed operation leaves local data exactly as it was.
//!
//! # Safety Backup
//!
//! The safety backup is handed back to the caller, and never restored
//! automatically. Recovering from it is a manual decision.
//!
//! # Mutual Exclusion
//!
//! An executor runs at most one merge at a time. A merge requested while
//! another is in flight fails fast with [`BackupError::OperationInProgress`]
//! instead of queueing up behind it.

use crate::{
    error::{BackupError, Result},
    merge::{
        collect::ConflictRecord,
        plan,
        preview::{generate_preview, MergePreview},
        MergePlan,
    },
    progress::Progress,
    record::{LocalState, Snapshot, APP_TAG},
    store::LocalStore,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Top-level fields every snapshot must carry.
const REQUIRED_FIELDS: [&str; 3] = ["version", "timestamp", "app"];

/// Phase of one merge operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MergePhase {
    #[default]
    Idle,
    Validating,
    Merging,
    Persisting,
    Done,
    Failed,
}

impl MergePhase {
    /// Check if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Check if transition to target phase is allowed.
    pub fn can_advance_to(&self, next: MergePhase) -> bool {
        use MergePhase::*;

        match (self, next) {
            (Idle, Validating) | (Validating, Merging) | (Merging, Persisting) | (Persisting, Done) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl Display for MergePhase {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Merging => "merging",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// State machine of one merge operation.
#[derive(Debug, Default)]
pub(crate) struct MergeOperation {
    phase: MergePhase,
}

impl MergeOperation {
    pub(crate) fn phase(&self) -> MergePhase {
        self.phase
    }

    pub(crate) fn advance(&mut self, next: MergePhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal merge transition {} -> {next}",
            self.phase
        );
        debug!("merge phase {} -> {next}", self.phase);
        self.phase = next;
    }
}

/// Counts and decisions of a committed merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub new_sessions: usize,
    pub conflicts_resolved: usize,
    pub settings_changed: bool,
    pub conflicts: Vec<ConflictRecord>,
}

impl Display for MergeSummary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str("Backup merged successfully!")?;
        if self.new_sessions > 0 || self.conflicts_resolved > 0 {
            write!(fmt, "\n\n• {} new sessions added", self.new_sessions)?;
            if self.conflicts_resolved > 0 {
                write!(fmt, "\n• {} conflicts resolved", self.conflicts_resolved)?;
            }
        }

        Ok(())
    }
}

/// Result of a committed merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// What the merge did.
    pub summary: MergeSummary,

    /// Export of local state as it was right before the merge.
    pub safety_backup: Snapshot,

    /// Local state as it was written back.
    pub state: LocalState,
}

/// Validate, merge, and persist remote snapshots against local state.
#[derive(Debug)]
pub struct MergeExecutor<S>
where
    S: LocalStore,
{
    store: S,
    in_flight: Mutex<()>,
}

impl<S> MergeExecutor<S>
where
    S: LocalStore,
{
    /// Construct new merge executor over local store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            in_flight: Mutex::new(()),
        }
    }

    /// Local store merges are committed to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Preview merge of raw snapshot without writing anything.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::InvalidBackupFormat`] if snapshot fails
    ///   validation.
    /// - Return [`BackupError::MergeComputation`] if snapshot records cannot
    ///   be decoded.
    /// - Return [`BackupError::Persistence`] if local state cannot be loaded.
    #[instrument(skip(self, raw), level = "debug")]
    pub async fn preview(&self, raw: &Value) -> Result<MergePreview> {
        validate_snapshot(raw)?;
        let remote = decode_snapshot(raw)?;
        let local = self.store.load_all().await?;

        Ok(generate_preview(&local, &remote))
    }

    /// Merge raw snapshot into local state, and persist the result.
    ///
    /// Progress is recomputed from merged sessions as of the UTC date of
    /// `now`, which also timestamps the safety backup.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::OperationInProgress`] if another merge is
    ///   still running on this executor.
    /// - Return [`BackupError::InvalidBackupFormat`] if snapshot fails
    ///   validation.
    /// - Return [`BackupError::MergeComputation`] if snapshot records cannot
    ///   be decoded.
    /// - Return [`BackupError::Persistence`] if local state cannot be loaded,
    ///   or merged state cannot be written.
    #[instrument(skip(self, raw), level = "debug")]
    pub async fn execute(&self, raw: &Value, now: DateTime<Utc>) -> Result<MergeOutcome> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| BackupError::OperationInProgress)?;

        let mut operation = MergeOperation::default();
        match self.run(&mut operation, raw, now).await {
            Ok(outcome) => {
                operation.advance(MergePhase::Done);
                info!(
                    "merged backup: {} new sessions, {} conflicts resolved",
                    outcome.summary.new_sessions, outcome.summary.conflicts_resolved
                );
                Ok(outcome)
            }
            Err(error) => {
                warn!("merge failed while {}: {error}", operation.phase());
                operation.advance(MergePhase::Failed);
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        operation: &mut MergeOperation,
        raw: &Value,
        now: DateTime<Utc>,
    ) -> Result<MergeOutcome> {
        operation.advance(MergePhase::Validating);
        validate_snapshot(raw)?;
        let local = self.store.load_all().await?;
        let safety_backup = Snapshot::export(&local, now);

        operation.advance(MergePhase::Merging);
        let remote = decode_snapshot(raw)?;
        let MergePlan { sessions, settings } = plan(&local, &remote.data);
        let summary = MergeSummary {
            new_sessions: sessions.new_from_remote,
            conflicts_resolved: sessions.conflicts_resolved,
            settings_changed: settings.changed(),
            conflicts: sessions.conflicts,
        };

        operation.advance(MergePhase::Persisting);
        let state = LocalState {
            progress: Progress::from_sessions(&sessions.merged, now.date_naive()),
            sessions: sessions.merged,
            settings: settings.merged,
        };
        self.store.save_all(&state).await?;

        Ok(MergeOutcome {
            summary,
            safety_backup,
            state,
        })
    }
}

/// Validate structure and application tag of raw snapshot.
///
/// # Errors
///
/// - Return [`BackupError::InvalidBackupFormat`] on any violation.
pub fn validate_snapshot(raw: &Value) -> Result<()> {
    let Some(object) = raw.as_object() else {
        return Err(invalid("snapshot is not a JSON object"));
    };

    if !object.get("data").is_some_and(Value::is_object) {
        return Err(invalid("snapshot has no data object"));
    }

    for field in REQUIRED_FIELDS {
        if !object.contains_key(field) {
            return Err(invalid(format!("snapshot has no {field:?} field")));
        }
    }

    for field in ["version", "timestamp"] {
        if !object[field].is_string() && !object[field].is_null() {
            return Err(invalid(format!("snapshot field {field:?} is not a string")));
        }
    }

    match object["app"].as_str() {
        Some(APP_TAG) => Ok(()),
        Some(app) => Err(invalid(format!("snapshot belongs to {app:?}, not {APP_TAG:?}"))),
        None => Err(invalid("snapshot app tag is not a string")),
    }
}

fn decode_snapshot(raw: &Value) -> Result<Snapshot> {
    Snapshot::deserialize(raw).map_err(|err| BackupError::MergeComputation { source: err })
}

fn invalid(reason: impl Into<String>) -> BackupError {
    BackupError::InvalidBackupFormat(reason.into())
}
