// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Aggregation of participants' availability into candidate meeting windows.

use crate::models::PlanEntry;
use serde::Serialize;
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A stretch of time during which the same number of participants are free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AvailabilityWindow {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub start_unix: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub end_unix: i64,
    pub available_count: u32,
}

impl AvailabilityWindow {
    pub fn duration_seconds(&self) -> i64 {
        self.end_unix - self.start_unix
    }
}

/// Result of aggregating a plan's entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AvailabilitySummary {
    /// Distinct users with at least one entry
    pub participants: u32,
    /// Windows where the most participants overlap, at least the plan minimum long
    pub best_windows: Vec<AvailabilityWindow>,
}

/// Sweep all entries and report the best meeting windows.
///
/// Entries are half-open intervals, so an entry ending exactly when another
/// begins does not count as overlap.
pub fn aggregate(entries: &[PlanEntry], min_seconds: i64) -> AvailabilitySummary {
    let mut participants: Vec<i64> = entries.iter().map(|e| e.user_id).collect();
    participants.sort_unstable();
    participants.dedup();

    let segments = merge_adjacent(sweep(entries));
    let max_count = segments
        .iter()
        .map(|w| w.available_count)
        .max()
        .unwrap_or(0);

    let best_windows = segments
        .into_iter()
        .filter(|w| w.available_count == max_count)
        .filter(|w| w.duration_seconds() > 0 && w.duration_seconds() >= min_seconds)
        .collect();

    AvailabilitySummary {
        participants: u32::try_from(participants.len()).unwrap_or(u32::MAX),
        best_windows,
    }
}

/// Split the timeline into segments with a constant number of distinct
/// available users. Gaps with nobody available are omitted.
fn sweep(entries: &[PlanEntry]) -> Vec<AvailabilityWindow> {
    // (time, delta, user); ends sort before starts at the same instant.
    let mut events: Vec<(i64, i32, i64)> = Vec::with_capacity(entries.len() * 2);
    for entry in entries.iter().filter(|e| e.duration_seconds > 0) {
        events.push((entry.start_time_unix, 1, entry.user_id));
        events.push((entry.end_time_unix(), -1, entry.user_id));
    }
    events.sort_unstable();

    let mut active: HashMap<i64, u32> = HashMap::new();
    let mut segments = Vec::new();
    let mut cursor: Option<i64> = None;

    let mut i = 0;
    while i < events.len() {
        let time = events[i].0;

        if let Some(start) = cursor {
            if !active.is_empty() && time > start {
                segments.push(AvailabilityWindow {
                    start_unix: start,
                    end_unix: time,
                    available_count: u32::try_from(active.len()).unwrap_or(u32::MAX),
                });
            }
        }

        while i < events.len() && events[i].0 == time {
            let (_, delta, user) = events[i];
            if delta > 0 {
                *active.entry(user).or_insert(0) += 1;
            } else if let Some(count) = active.get_mut(&user) {
                *count -= 1;
                if *count == 0 {
                    active.remove(&user);
                }
            }
            i += 1;
        }

        cursor = Some(time);
    }

    segments
}

fn merge_adjacent(segments: Vec<AvailabilityWindow>) -> Vec<AvailabilityWindow> {
    let mut merged: Vec<AvailabilityWindow> = Vec::with_capacity(segments.len());
    for segment in segments {
        match merged.last_mut() {
            Some(last)
                if last.end_unix == segment.start_unix
                    && last.available_count == segment.available_count =>
            {
                last.end_unix = segment.end_unix;
            }
            _ => merged.push(segment),
        }
    }
    merged
}
