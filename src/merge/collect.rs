// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Collection merging.
//!
//! Merge session collections and settings maps of two independently evolved
//! datasets.
//!
//! # Sessions
//!
//! Session merging is left-biased. Every local session is seeded into its
//! merge key slot first. Each remote session then either fills an empty slot,
//! or competes against the occupant through [`resolve`]. Every occupied slot
//! counts as a resolved conflict, even when both sides hold identical records.
//!
//! The merged collection is ordered by date, then morning before evening.
//!
//! # Settings
//!
//! Settings merging is conservative. Local values always take precedence, so
//! remote values are only adopted for keys that are missing or null locally.

use crate::{
    merge::resolve::{resolve, ReasonCode, Resolution, Side},
    record::{MergeKey, Session, SessionKind, Settings},
};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::{btree_map::Entry, BTreeMap};
use tracing::warn;

/// One resolved session conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    pub local: Session,
    pub remote: Session,
    pub winner_side: Side,
    pub reason: ReasonCode,
}

impl ConflictRecord {
    /// Session that won the conflict.
    pub fn winner(&self) -> &Session {
        match self.winner_side {
            Side::Local => &self.local,
            Side::Remote => &self.remote,
        }
    }

    /// Human readable explanation of the decision.
    pub fn description(&self) -> &'static str {
        self.reason.describe(self.winner_side)
    }
}

/// Result of merging two session collections.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMerge {
    pub merged: Vec<Session>,
    pub new_from_remote: usize,
    pub conflicts_resolved: usize,
    pub conflicts: Vec<ConflictRecord>,
}

/// Merge remote sessions into local sessions.
///
/// Both collections should hold at most one session per merge key. If local
/// holds duplicates anyway, the last one seeds the slot.
pub fn merge_sessions(local: &[Session], remote: &[Session]) -> SessionMerge {
    let mut slots: BTreeMap<MergeKey, Session> = BTreeMap::new();
    for session in local {
        if slots.insert(session.key(), session.clone()).is_some() {
            warn!("duplicate local session for {}, keeping last", session.key());
        }
    }

    let mut outcome = SessionMerge::default();
    for incoming in remote {
        match slots.entry(incoming.key()) {
            Entry::Vacant(slot) => {
                slot.insert(incoming.clone());
                outcome.new_from_remote += 1;
            }
            Entry::Occupied(mut slot) => {
                let Resolution { side, reason, .. } = resolve(slot.get(), incoming);
                let record = ConflictRecord {
                    date: incoming.date,
                    kind: incoming.kind,
                    local: slot.get().clone(),
                    remote: incoming.clone(),
                    winner_side: side,
                    reason,
                };

                if side == Side::Remote {
                    slot.insert(incoming.clone());
                }
                outcome.conflicts.push(record);
                outcome.conflicts_resolved += 1;
            }
        }
    }

    outcome.merged = slots.into_values().collect();
    outcome
}

/// What happened to a settings key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingAction {
    Added,
}

/// Why a settings key changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    MissingInLocal,
}

impl ChangeReason {
    /// Human readable explanation of the change.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::MissingInLocal => "Missing in local settings",
        }
    }
}

/// One adopted remote setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingChange {
    pub key: String,
    pub action: SettingAction,
    pub value: Value,
    pub reason: ChangeReason,
}

/// Result of merging two settings maps.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsMerge {
    pub merged: Settings,
    pub changes: Vec<SettingChange>,
}

impl SettingsMerge {
    /// Check if any remote value was adopted.
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Merge remote settings into local settings.
///
/// Remote values fill keys that are missing or null locally. Null remote
/// values carry nothing to adopt, and are skipped.
pub fn merge_settings(local: &Settings, remote: &Settings) -> SettingsMerge {
    let mut merged = local.clone();
    let mut changes = Vec::new();

    for (key, value) in remote {
        if value.is_null() {
            continue;
        }

        // INVARIANT: Present non-null local values are never overwritten.
        if local.get(key).is_some_and(|current| !current.is_null()) {
            continue;
        }

        merged.insert(key.clone(), value.clone());
        changes.push(SettingChange {
            key: key.clone(),
            action: SettingAction::Added,
            value: value.clone(),
            reason: ChangeReason::MissingInLocal,
        });
    }

    SettingsMerge { merged, changes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashSet;

    fn session(day: &str, kind: SessionKind, completed_at: Option<i64>, duration: u32) -> Session {
        let mut session = Session::new(day.parse().unwrap(), kind);
        session.completed = completed_at.is_some();
        session.completed_at = completed_at;
        session.duration = duration;
        session
    }

    fn settings(value: Value) -> Settings {
        match value {
            Value::Object(map) => map,
            _ => panic!("settings fixture must be an object"),
        }
    }

    fn fixture_pair() -> (Vec<Session>, Vec<Session>) {
        let local = vec![
            session("2024-01-01", SessionKind::Morning, Some(1000), 10),
            session("2024-01-01", SessionKind::Evening, None, 0),
            session("2024-01-03", SessionKind::Morning, Some(5000), 20),
            session("2024-01-04", SessionKind::Evening, Some(7000), 15),
        ];
        let remote = vec![
            session("2024-01-01", SessionKind::Morning, Some(2000), 30),
            session("2024-01-01", SessionKind::Evening, Some(1500), 5),
            session("2024-01-02", SessionKind::Evening, Some(3000), 12),
            session("2024-01-03", SessionKind::Morning, Some(4000), 40),
            session("2024-01-04", SessionKind::Evening, Some(7000), 15),
        ];
        (local, remote)
    }

    #[test]
    fn merge_sessions_remote_more_recent_wins() {
        let local = vec![session("2024-01-01", SessionKind::Morning, Some(1000), 10)];
        let remote = vec![session("2024-01-01", SessionKind::Morning, Some(2000), 30)];

        let result = merge_sessions(&local, &remote);
        assert_eq!(result.merged, remote);
        assert_eq!(result.new_from_remote, 0);
        assert_eq!(result.conflicts_resolved, 1);
        assert_eq!(result.conflicts[0].winner_side, Side::Remote);
        assert_eq!(result.conflicts[0].reason, ReasonCode::MoreRecentCompletion);
        assert_eq!(result.conflicts[0].winner(), &remote[0]);
    }

    #[test]
    fn merge_sessions_adds_missing_slot_unchanged() {
        let local = vec![session("2024-01-01", SessionKind::Morning, Some(1000), 10)];
        let incoming = session("2024-01-02", SessionKind::Evening, Some(3000), 12);

        let result = merge_sessions(&local, &[incoming.clone()]);
        assert_eq!(result.new_from_remote, 1);
        assert_eq!(result.conflicts_resolved, 0);
        assert!(result.merged.contains(&incoming));
    }

    #[test]
    fn merge_sessions_identical_slots_still_resolve() {
        let local = vec![session("2024-01-04", SessionKind::Evening, Some(7000), 15)];

        let result = merge_sessions(&local, &local);
        assert_eq!(result.merged, local);
        assert_eq!(result.new_from_remote, 0);
        assert_eq!(result.conflicts_resolved, 1);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].winner_side, Side::Local);
        assert_eq!(result.conflicts[0].reason, ReasonCode::MoreRecentCompletion);
    }

    #[test]
    fn merge_sessions_orders_by_date_then_kind() {
        let (local, remote) = fixture_pair();

        let result: Vec<String> = merge_sessions(&local, &remote)
            .merged
            .iter()
            .map(|session| session.key().to_string())
            .collect();
        let expect = vec![
            "2024-01-01 morning",
            "2024-01-01 evening",
            "2024-01-02 evening",
            "2024-01-03 morning",
            "2024-01-04 evening",
        ];
        assert_eq!(result, expect);
    }

    #[test]
    fn merge_sessions_counts_are_consistent() {
        let (local, remote) = fixture_pair();

        let result = merge_sessions(&local, &remote);
        let touched: HashSet<MergeKey> = result
            .conflicts
            .iter()
            .map(|conflict| conflict.winner().key())
            .collect();
        let untouched = local
            .iter()
            .filter(|session| !touched.contains(&session.key()))
            .count();

        assert_eq!(result.new_from_remote, 1);
        assert_eq!(result.conflicts_resolved, 4);
        assert_eq!(
            result.new_from_remote + result.conflicts_resolved + untouched,
            result.merged.len()
        );
    }

    #[test]
    fn merge_sessions_keys_are_unique() {
        let (local, remote) = fixture_pair();

        let result = merge_sessions(&local, &remote);
        let keys: HashSet<MergeKey> = result.merged.iter().map(Session::key).collect();
        assert_eq!(keys.len(), result.merged.len());
    }

    #[test]
    fn merge_sessions_remerge_is_noop() {
        let (local, remote) = fixture_pair();

        let first = merge_sessions(&local, &remote);
        let second = merge_sessions(&first.merged, &remote);
        assert_eq!(second.merged, first.merged);
        assert_eq!(second.new_from_remote, 0);
    }

    #[test]
    fn merge_sessions_leaves_inputs_alone() {
        let (local, remote) = fixture_pair();
        let (local_before, remote_before) = (local.clone(), remote.clone());

        let _ = merge_sessions(&local, &remote);
        assert_eq!(local, local_before);
        assert_eq!(remote, remote_before);
    }

    #[test]
    fn merge_settings_keeps_local_values() {
        let local = settings(json!({ "morningReminderTime": "07:00" }));
        let remote = settings(json!({ "morningReminderTime": "06:00", "language": "hindi" }));

        let result = merge_settings(&local, &remote);
        let expect = settings(json!({ "morningReminderTime": "07:00", "language": "hindi" }));
        assert_eq!(result.merged, expect);
        assert_eq!(
            result.changes,
            vec![SettingChange {
                key: "language".into(),
                action: SettingAction::Added,
                value: json!("hindi"),
                reason: ChangeReason::MissingInLocal,
            }]
        );
        assert!(result.changed());
    }

    #[test]
    fn merge_settings_fills_null_local_values() {
        let local = settings(json!({ "theme": null, "notificationsEnabled": false }));
        let remote = settings(json!({ "theme": "dark", "notificationsEnabled": true, "extra": null }));

        let result = merge_settings(&local, &remote);
        assert_eq!(result.merged["theme"], json!("dark"));
        assert_eq!(result.merged["notificationsEnabled"], json!(false));
        assert!(!result.merged.contains_key("extra"));
        assert_eq!(result.changes.len(), 1);
    }

    #[test]
    fn merge_settings_identical_maps_change_nothing() {
        let local = crate::record::default_settings();

        let result = merge_settings(&local, &local);
        assert_eq!(result.merged, local);
        assert!(!result.changed());
    }

    #[test]
    fn setting_change_wire_format() -> anyhow::Result<()> {
        let change = SettingChange {
            key: "language".into(),
            action: SettingAction::Added,
            value: json!("hindi"),
            reason: ChangeReason::MissingInLocal,
        };

        let result = serde_json::to_value(change)?;
        let expect = json!({
            "key": "language",
            "action": "added",
            "value": "hindi",
            "reason": "missing_in_local"
        });
        assert_eq!(result, expect);

        Ok(())
    }
}
