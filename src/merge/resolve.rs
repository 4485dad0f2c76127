// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Conflict resolution between two versions of one session slot.
//!
//! Rules are applied in a fixed order, and the first applicable rule picks
//! the winner:
//!
//! 1. Both sides carry a completion time: the later one wins, ties favor
//!    local.
//! 2. Exactly one side is completed: the completed side wins.
//! 3. Durations differ: the longer sitting wins.
//! 4. Local wins.
//!
//! Resolution is a pure function of its two inputs. Re-resolving the same
//! pair always gives the same answer, which is what makes re-merging against
//! the same snapshot a no-op.

use crate::record::Session;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Side of a two-way merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Data already on this device.
    Local,

    /// Data from the downloaded snapshot.
    Remote,
}

impl Display for Side {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// Rule that decided a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    MoreRecentCompletion,
    OnlyOneCompleted,
    LongerDuration,
    DefaultLocal,
}

impl ReasonCode {
    /// Human readable explanation of a decision.
    pub fn describe(&self, side: Side) -> &'static str {
        match (self, side) {
            (Self::MoreRecentCompletion, _) => "More recent completion time",
            (Self::OnlyOneCompleted, Side::Local) => "Local session is completed",
            (Self::OnlyOneCompleted, Side::Remote) => "Backup session is completed",
            (Self::LongerDuration, _) => "Longer duration",
            (Self::DefaultLocal, _) => "Default to local data",
        }
    }
}

impl Display for ReasonCode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::MoreRecentCompletion => "more_recent_completion",
            Self::OnlyOneCompleted => "only_one_completed",
            Self::LongerDuration => "longer_duration",
            Self::DefaultLocal => "default_local",
        })
    }
}

/// Outcome of resolving one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub winner: &'a Session,
    pub side: Side,
    pub reason: ReasonCode,
}

/// Pick the winner between two versions of the same session slot.
///
/// Both sessions must share the same merge key.
pub fn resolve<'a>(local: &'a Session, remote: &'a Session) -> Resolution<'a> {
    debug_assert_eq!(local.key(), remote.key(), "resolving sessions of different slots");

    let (side, reason) = match (local.completed_at, remote.completed_at) {
        (Some(local_at), Some(remote_at)) => (
            prefer_local(local_at >= remote_at),
            ReasonCode::MoreRecentCompletion,
        ),
        _ if local.completed != remote.completed => {
            (prefer_local(local.completed), ReasonCode::OnlyOneCompleted)
        }
        _ if local.duration != remote.duration => (
            prefer_local(local.duration >= remote.duration),
            ReasonCode::LongerDuration,
        ),
        _ => (Side::Local, ReasonCode::DefaultLocal),
    };

    let winner = match side {
        Side::Local => local,
        Side::Remote => remote,
    };

    Resolution {
        winner,
        side,
        reason,
    }
}

fn prefer_local(local_wins: bool) -> Side {
    if local_wins {
        Side::Local
    } else {
        Side::Remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SessionKind;
    use simple_test_case::test_case;

    fn session(completed: bool, completed_at: Option<i64>, duration: u32) -> Session {
        let mut session = Session::new("2024-01-01".parse().unwrap(), SessionKind::Morning);
        session.completed = completed;
        session.completed_at = completed_at;
        session.duration = duration;
        session
    }

    #[test_case(session(true, Some(2000), 5), session(true, Some(1000), 50), Side::Local, ReasonCode::MoreRecentCompletion; "local completed later")]
    #[test_case(session(true, Some(1000), 10), session(true, Some(2000), 30), Side::Remote, ReasonCode::MoreRecentCompletion; "remote completed later")]
    #[test_case(session(true, Some(1000), 10), session(true, Some(1000), 30), Side::Local, ReasonCode::MoreRecentCompletion; "completion tie favors local")]
    #[test_case(session(true, Some(1000), 0), session(false, None, 60), Side::Local, ReasonCode::OnlyOneCompleted; "only local completed")]
    #[test_case(session(false, None, 60), session(true, None, 0), Side::Remote, ReasonCode::OnlyOneCompleted; "only remote completed")]
    #[test_case(session(false, None, 10), session(false, None, 20), Side::Remote, ReasonCode::LongerDuration; "remote sat longer")]
    #[test_case(session(true, None, 20), session(true, Some(5), 10), Side::Local, ReasonCode::LongerDuration; "one timestamp missing falls through")]
    #[test_case(session(false, None, 10), session(false, None, 10), Side::Local, ReasonCode::DefaultLocal; "everything equal")]
    #[test]
    fn resolve_rule_order(local: Session, remote: Session, side: Side, reason: ReasonCode) {
        let result = resolve(&local, &remote);
        assert_eq!(result.side, side);
        assert_eq!(result.reason, reason);

        let expect = match side {
            Side::Local => &local,
            Side::Remote => &remote,
        };
        assert_eq!(result.winner, expect);
    }

    #[test]
    fn resolve_is_deterministic() {
        let local = session(true, Some(1000), 10);
        let remote = session(true, Some(2000), 30);

        let first = resolve(&local, &remote);
        for _ in 0..10 {
            assert_eq!(resolve(&local, &remote), first);
        }
    }

    #[test]
    fn reason_descriptions() {
        assert_eq!(
            ReasonCode::OnlyOneCompleted.describe(Side::Remote),
            "Backup session is completed"
        );
        assert_eq!(
            ReasonCode::DefaultLocal.describe(Side::Local),
            "Default to local data"
        );
        assert_eq!(ReasonCode::LongerDuration.to_string(), "longer_duration");
    }
}
