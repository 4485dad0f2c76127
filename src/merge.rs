// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup reconciliation.
//!
//! Meditrack reconciles two independently evolved copies of the same dataset:
//! the local copy, and a snapshot downloaded from the remote store. There is
//! no common ancestor to compare against, so this is a plain __two-way
//! merge__ that leans toward local data whenever the evidence is even.
//!
//! # Merge Pipeline
//!
//! 1. [`resolve`] picks a winner between two versions of one session slot.
//! 2. [`collect`] merges whole session collections and settings maps through
//!    the resolver, and records every decision it makes.
//! 3. [`preview`] turns those decisions into something a human can confirm.
//!
//! All three stages are pure functions over in-memory records. Nothing in
//! this module performs I/O or owns state. Committing a merge is the job of
//! the [`executor`](crate::executor).
//!
//! # Idempotence
//!
//! Merging the result of a merge against the same snapshot again adds
//! nothing. Every remote session either already sits in its slot unchanged,
//! or loses to the same local session by the same rule as before.

pub mod collect;
pub mod preview;
pub mod resolve;

use crate::{
    merge::collect::{merge_sessions, merge_settings, SessionMerge, SettingsMerge},
    record::{LocalState, SnapshotData},
};

/// Session and settings merge of one local state and one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub sessions: SessionMerge,
    pub settings: SettingsMerge,
}

/// Plan merge of snapshot records into local state.
///
/// Progress is not part of the plan. It is derived from sessions, and gets
/// recomputed once the merged sessions are known.
pub fn plan(local: &LocalState, remote: &SnapshotData) -> MergePlan {
    MergePlan {
        sessions: merge_sessions(&local.sessions, &remote.sessions),
        settings: merge_settings(&local.settings, &remote.settings),
    }
}
