// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Merge previews.
//!
//! A preview tells the user what a merge would do before anything gets
//! written. It is computed from the same merge plan the executor commits, so
//! the preview and the eventual merge can never disagree. Generating a
//! preview has no side effects, and can be repeated as often as needed.

use crate::{
    merge::{
        collect::{ConflictRecord, SettingChange},
        plan, MergePlan,
    },
    record::{LocalState, Snapshot, SNAPSHOT_VERSION},
};

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Summary used when a merge would change nothing.
pub const NO_CHANGES: &str = "No changes needed - your data is already up to date";

/// Backup date used when snapshot timestamp is missing or unreadable.
pub const UNKNOWN_DATE: &str = "Unknown date";

/// Number of conflicts rendered in full by [`MergePreview`]'s display.
const CONFLICT_SAMPLE: usize = 3;

/// Human readable projection of a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePreview {
    pub backup_date: String,
    pub backup_version: String,
    pub sessions: SessionsPreview,
    pub settings: SettingsPreview,
    pub summary: String,
}

/// Session side of a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsPreview {
    pub new_sessions: usize,
    pub conflicts_resolved: usize,
    pub total_after_merge: usize,
    pub conflicts: Vec<ConflictRecord>,
}

/// Settings side of a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsPreview {
    pub changed: bool,
    pub changes: Vec<SettingChange>,
}

/// Preview merging a remote snapshot into local state.
pub fn generate_preview(local: &LocalState, remote: &Snapshot) -> MergePreview {
    let MergePlan { sessions, settings } = plan(local, &remote.data);
    let summary = summarize(
        sessions.new_from_remote,
        sessions.conflicts_resolved,
        settings.changes.len(),
    );

    MergePreview {
        backup_date: remote
            .created_at()
            .map(|created_at| created_at.format("%-m/%-d/%Y").to_string())
            .unwrap_or_else(|| UNKNOWN_DATE.into()),
        backup_version: remote
            .version
            .clone()
            .unwrap_or_else(|| SNAPSHOT_VERSION.into()),
        sessions: SessionsPreview {
            new_sessions: sessions.new_from_remote,
            conflicts_resolved: sessions.conflicts_resolved,
            total_after_merge: sessions.merged.len(),
            conflicts: sessions.conflicts,
        },
        settings: SettingsPreview {
            changed: settings.changed(),
            changes: settings.changes,
        },
        summary,
    }
}

/// Assemble one sentence out of non-zero merge counts.
pub fn summarize(new_sessions: usize, conflicts: usize, settings_changes: usize) -> String {
    let parts: Vec<String> = [
        (new_sessions, "new session", "will be added"),
        (conflicts, "conflict", "will be resolved"),
        (settings_changes, "setting", "will be updated"),
    ]
    .into_iter()
    .filter(|(count, _, _)| *count > 0)
    .map(|(count, noun, verb)| format!("{count} {noun}{} {verb}", plural(count)))
    .collect();

    if parts.is_empty() {
        return NO_CHANGES.into();
    }

    parts.join(", ")
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

impl Display for MergePreview {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "Backup from {} (version {})", self.backup_date, self.backup_version)?;
        writeln!(fmt, "{}", self.summary)?;
        writeln!(fmt)?;
        writeln!(fmt, "New sessions:       {}", self.sessions.new_sessions)?;
        writeln!(fmt, "Conflicts resolved: {}", self.sessions.conflicts_resolved)?;
        writeln!(fmt, "Total after merge:  {}", self.sessions.total_after_merge)?;

        if !self.sessions.conflicts.is_empty() {
            writeln!(fmt)?;
            writeln!(fmt, "Conflict resolution details:")?;
            for conflict in self.sessions.conflicts.iter().take(CONFLICT_SAMPLE) {
                writeln!(
                    fmt,
                    "  {} - {}: {} (keep {})",
                    conflict.date.format("%-m/%-d/%Y"),
                    conflict.kind,
                    conflict.description(),
                    conflict.winner_side,
                )?;
            }

            let remaining = self.sessions.conflicts.len().saturating_sub(CONFLICT_SAMPLE);
            if remaining > 0 {
                writeln!(fmt, "  +{remaining} more conflicts...")?;
            }
        }

        if self.settings.changed {
            writeln!(fmt)?;
            writeln!(fmt, "Settings changes:")?;
            for change in &self.settings.changes {
                writeln!(
                    fmt,
                    "  {}: added {} ({})",
                    change.key,
                    change.value,
                    change.reason.describe(),
                )?;
            }
        }

        Ok(())
    }
}
