// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plan and entry validation.
//!
//! Every rejection is an `AppError::Validation` carrying a message meant for
//! the caller. Overlap with existing entries is checked by the store at insert
//! time, not here.

use crate::error::AppError;
use crate::models::plan::start_of_day;
use crate::models::{NewEntry, NewPlan, Plan};
use chrono::{DateTime, Utc};

/// Check a plan before it is persisted.
///
/// `now` is the current time; a plan may start today but not earlier.
pub fn validate_plan(plan: &NewPlan, now: DateTime<Utc>) -> Result<(), AppError> {
    if start_of_day(plan.start_date) < start_of_day(now.date_naive()) {
        return Err(invalid("Date cannot be in the past"));
    }
    if plan.duration_days <= 0 {
        return Err(invalid("Duration cannot be zero days"));
    }
    if plan.title.trim().is_empty() {
        return Err(invalid("Title cannot be empty"));
    }
    if plan.identifier.is_empty() {
        return Err(invalid("No identifier"));
    }
    if plan.min_availability_seconds < 0 {
        return Err(invalid("Minimum availability cannot be negative"));
    }
    Ok(())
}

/// Check an entry against the plan it is being added to.
pub fn validate_entry(plan: &Plan, entry: &NewEntry) -> Result<(), AppError> {
    if entry.start_time_unix <= 0 {
        return Err(invalid("Start time must be a positive unix timestamp"));
    }
    if entry.duration_seconds <= 0 {
        return Err(invalid("Duration must be positive"));
    }
    if entry.start_time_unix < plan.start_unix() {
        return Err(invalid("Start time cannot be before the plan start date"));
    }
    if plan.end_unix() < entry.start_time_unix {
        return Err(invalid("Start time cannot be after the plan end date"));
    }
    match entry.end_time_unix() {
        Some(end) if end <= plan.end_unix() => {}
        _ => return Err(invalid("This entry would end after the plan ends")),
    }
    if entry.duration_seconds < plan.min_availability_seconds {
        return Err(invalid(&format!(
            "Entry duration cannot be shorter than the plan's minimum ({} seconds)",
            plan.min_availability_seconds
        )));
    }
    Ok(())
}

fn invalid(message: &str) -> AppError {
    AppError::Validation(message.to_string())
}
