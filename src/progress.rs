// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Streak statistics.
//!
//! Progress is a projection of the session collection. It is never merged,
//! and must be recomputed from scratch whenever the session set changes.

use crate::record::{Session, SessionKind};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Streak counts and totals derived from completed sessions.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Progress {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_sessions: u32,
    pub morning_streak: u32,
    pub evening_streak: u32,
    pub last_session_date: Option<NaiveDate>,
}

impl Progress {
    /// Compute progress over completed sessions as of `today`.
    ///
    /// A day counts toward a streak if at least one of its sessions was
    /// completed. The current streak is the run of consecutive days ending at
    /// the most recent completed day, and drops to zero once that day lies
    /// more than one day before `today`. Morning and evening streaks count
    /// the run ending at the most recent completed session of that kind.
    pub fn from_sessions(sessions: &[Session], today: NaiveDate) -> Self {
        let completed: Vec<&Session> = sessions.iter().filter(|session| session.completed).collect();
        let days: BTreeSet<NaiveDate> = completed.iter().map(|session| session.date).collect();
        let Some(most_recent) = days.last().copied() else {
            return Self::default();
        };

        let runs = run_lengths(&days);
        let current_streak = if (today - most_recent).num_days() > 1 {
            0
        } else {
            runs.first().copied().unwrap_or_default()
        };

        Self {
            current_streak,
            longest_streak: runs.iter().copied().max().unwrap_or_default(),
            total_sessions: u32::try_from(completed.len()).unwrap_or(u32::MAX),
            morning_streak: kind_streak(&completed, SessionKind::Morning),
            evening_streak: kind_streak(&completed, SessionKind::Evening),
            last_session_date: Some(most_recent),
        }
    }
}

impl Display for Progress {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "current streak: {} days", self.current_streak)?;
        writeln!(fmt, "longest streak: {} days", self.longest_streak)?;
        writeln!(fmt, "morning streak: {} days", self.morning_streak)?;
        writeln!(fmt, "evening streak: {} days", self.evening_streak)?;
        writeln!(fmt, "total sessions: {}", self.total_sessions)?;
        match self.last_session_date {
            Some(date) => write!(fmt, "last session:   {date}"),
            None => write!(fmt, "last session:   never"),
        }
    }
}

fn kind_streak(completed: &[&Session], kind: SessionKind) -> u32 {
    let days: BTreeSet<NaiveDate> = completed
        .iter()
        .filter(|session| session.kind == kind)
        .map(|session| session.date)
        .collect();
    run_lengths(&days).first().copied().unwrap_or_default()
}

/// Lengths of consecutive-day runs, most recent run first.
fn run_lengths(days: &BTreeSet<NaiveDate>) -> Vec<u32> {
    let mut runs: Vec<u32> = Vec::new();
    let mut previous: Option<NaiveDate> = None;

    for day in days.iter().rev().copied() {
        let consecutive = previous.is_some_and(|later| (later - day).num_days() == 1);
        match runs.last_mut() {
            Some(run) if consecutive => *run += 1,
            _ => runs.push(1),
        }
        previous = Some(day);
    }

    runs
}
