// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Record model.
//!
//! Meditrack tracks two meditation sittings per day: one in the morning, and
//! one in the evening. Each sitting is a [`Session`]. Besides sessions, the
//! user keeps a flat mapping of [`Settings`], and a derived [`Progress`]
//! aggregate that is always recomputed from sessions.
//!
//! # Merge Keys
//!
//! A session is identified by its `id`, but two devices can record the same
//! sitting under different ids. Reconciliation therefore ignores the id and
//! identifies sessions by their __merge key__: the pair of calendar date and
//! session kind. A collection holds at most one session per merge key.
//!
//! # Snapshots
//!
//! A [`Snapshot`] is the immutable point-in-time export of local state that
//! gets exchanged with the remote store. Merging never mutates a snapshot, it
//! only produces new local state.

use crate::progress::Progress;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Application tag every snapshot must carry.
pub const APP_TAG: &str = "meditation-tracker";

/// Snapshot format version written by this crate.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Setting that marks a user who never completed a session.
pub const FIRST_TIME_USER: &str = "isFirstTimeUser";

/// Flat key-value mapping of user settings.
///
/// The merge engine does not enforce any schema on settings.
pub type Settings = Map<String, Value>;

/// Settings of a fresh install.
pub fn default_settings() -> Settings {
    let mut settings = Settings::new();
    settings.insert("morningReminderTime".into(), "07:00".into());
    settings.insert("eveningReminderTime".into(), "19:00".into());
    settings.insert("notificationsEnabled".into(), false.into());
    settings.insert("theme".into(), "auto".into());
    settings.insert(FIRST_TIME_USER.into(), true.into());
    settings
}

/// Time of day a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Morning sitting.
    Morning,

    /// Evening sitting.
    Evening,
}

impl SessionKind {
    /// Lowercase name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Evening => "evening",
        }
    }
}

impl Display for SessionKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

impl FromStr for SessionKind {
    type Err = UnknownSessionKind;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            "morning" => Ok(Self::Morning),
            "evening" => Ok(Self::Evening),
            other => Err(UnknownSessionKind(other.into())),
        }
    }
}

/// Session kind is neither "morning" nor "evening".
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown session kind {0:?}, expected \"morning\" or \"evening\"")]
pub struct UnknownSessionKind(pub String);

/// Logical slot of a session.
///
/// Ordered by date first, then morning before evening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MergeKey {
    pub date: NaiveDate,
    pub kind: SessionKind,
}

impl Display for MergeKey {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{} {}", self.date, self.kind)
    }
}

/// A record of one meditation sitting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Stable identity, conventionally `<date>_<type>`.
    pub id: String,

    /// Calendar date of the sitting.
    pub date: NaiveDate,

    /// Morning or evening sitting.
    #[serde(rename = "type")]
    pub kind: SessionKind,

    /// Whether the sitting was completed.
    #[serde(default)]
    pub completed: bool,

    /// Completion time in epoch milliseconds.
    #[serde(default)]
    pub completed_at: Option<i64>,

    /// Length of the sitting in minutes.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub duration: u32,
}

impl Session {
    /// Construct new incomplete session for given slot.
    pub fn new(date: NaiveDate, kind: SessionKind) -> Self {
        Self {
            id: format!("{date}_{kind}"),
            date,
            kind,
            completed: false,
            completed_at: None,
            duration: 0,
        }
    }

    /// Merge key of this session.
    pub fn key(&self) -> MergeKey {
        MergeKey {
            date: self.date,
            kind: self.kind,
        }
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or_default())
}

/// Local state container.
///
/// Everything meditrack persists locally. Loaded and saved as a whole through
/// a [`LocalStore`](crate::store::LocalStore).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LocalState {
    pub sessions: Vec<Session>,
    pub settings: Settings,
    pub progress: Progress,
}

impl Default for LocalState {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            settings: default_settings(),
            progress: Progress::default(),
        }
    }
}

impl LocalState {
    /// Mark the session in target slot as completed.
    ///
    /// Creates the session if the slot is empty, and clears the
    /// `isFirstTimeUser` setting. Progress is left untouched, call
    /// [`LocalState::refresh_progress`] afterwards.
    pub fn complete_session(
        &mut self,
        date: NaiveDate,
        kind: SessionKind,
        duration: u32,
        completed_at: i64,
    ) -> &Session {
        let key = MergeKey { date, kind };
        let index = match self.sessions.iter().position(|session| session.key() == key) {
            Some(index) => index,
            None => {
                self.sessions.push(Session::new(date, kind));
                self.sessions.len() - 1
            }
        };

        self.settings.insert(FIRST_TIME_USER.into(), false.into());

        let session = &mut self.sessions[index];
        session.completed = true;
        session.completed_at = Some(completed_at);
        session.duration = duration;
        session
    }

    /// Recompute progress from current sessions.
    pub fn refresh_progress(&mut self, today: NaiveDate) {
        self.progress = Progress::from_sessions(&self.sessions, today);
    }
}

/// Point-in-time export of local state exchanged with the remote store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Snapshot {
    /// Snapshot format version.
    #[serde(default)]
    pub version: Option<String>,

    /// ISO-8601 creation time.
    #[serde(default)]
    pub timestamp: Option<String>,

    /// Application tag, always [`APP_TAG`] for valid snapshots.
    pub app: String,

    /// Exported records.
    pub data: SnapshotData,
}

impl Snapshot {
    /// Export local state as a new snapshot.
    pub fn export(state: &LocalState, now: DateTime<Utc>) -> Self {
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        Self {
            version: Some(SNAPSHOT_VERSION.into()),
            timestamp: Some(timestamp.clone()),
            app: APP_TAG.into(),
            data: SnapshotData {
                sessions: state.sessions.clone(),
                progress: state.progress.clone(),
                settings: state.settings.clone(),
                exported_at: Some(timestamp),
            },
        }
    }

    /// Parse snapshot creation time.
    ///
    /// Returns `None` if the timestamp is missing or not RFC 3339.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|timestamp| DateTime::parse_from_rfc3339(timestamp).ok())
            .map(|timestamp| timestamp.with_timezone(&Utc))
    }
}

/// Records carried by a snapshot.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct SnapshotData {
    #[serde(default)]
    pub sessions: Vec<Session>,

    #[serde(default)]
    pub progress: Progress,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
}
