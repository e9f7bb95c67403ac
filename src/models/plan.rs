// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Plan and availability entry models for storage.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Plan row joined with its owner's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: i64,
    pub owner_id: i64,
    /// Public-facing random token
    pub identifier: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub duration_days: i64,
    /// Shortest availability entry the plan accepts
    pub min_availability_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub owner_display_name: String,
    pub owner_avatar_url: String,
}

impl Plan {
    /// Midnight UTC of the start date.
    pub fn start_time(&self) -> DateTime<Utc> {
        start_of_day(self.start_date)
    }

    /// Exact end of the plan (start + duration days).
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time() + Duration::days(self.duration_days)
    }

    pub fn start_unix(&self) -> i64 {
        self.start_time().timestamp()
    }

    pub fn end_unix(&self) -> i64 {
        self.start_unix() + self.duration_days * SECONDS_PER_DAY
    }
}

/// Midnight UTC of a calendar date.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Availability entry joined with its author's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PlanEntry {
    pub id: i64,
    pub plan_id: i64,
    pub user_id: i64,
    /// Start of the window (unix seconds)
    pub start_time_unix: i64,
    pub duration_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub user_display_name: String,
    pub user_avatar_url: String,
}

impl PlanEntry {
    /// Exclusive end of the window (unix seconds).
    pub fn end_time_unix(&self) -> i64 {
        self.start_time_unix.saturating_add(self.duration_seconds)
    }
}

/// A plan about to be inserted.
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub owner_id: i64,
    pub identifier: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub duration_days: i64,
    pub min_availability_seconds: i64,
}

/// An entry about to be inserted.
#[derive(Debug, Clone, Copy)]
pub struct NewEntry {
    pub plan_id: i64,
    pub user_id: i64,
    pub start_time_unix: i64,
    pub duration_seconds: i64,
}

impl NewEntry {
    /// Exclusive end of the window, or `None` if it does not fit in an `i64`.
    pub fn end_time_unix(&self) -> Option<i64> {
        self.start_time_unix.checked_add(self.duration_seconds)
    }
}
