// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plan and entry routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::{
    AvailabilitySummary, EntryResponse, PlanDraft, PlanResponse, ProfileResponse,
};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

/// Default minimum availability for new plans, in seconds.
pub const DEFAULT_MIN_AVAILABILITY_SECONDS: i64 = 300;

/// Plan routes (require authentication).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(get_me))
        .route("/plans", get(list_plans).put(create_plan))
        .route(
            "/plans/{identifier}",
            get(get_plan).put(add_entry).delete(delete_plan),
        )
        .route("/plans/{identifier}/entries", get(list_entries))
        .route(
            "/plans/{identifier}/entries/{entry_id}",
            delete(delete_entry),
        )
        .route("/plans/{identifier}/availability", get(get_availability))
}

// ─── Requests ────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(max = 200, message = "Title cannot be longer than 200 characters"))]
    pub title: String,
    /// Formatted yyyy-m-d
    pub start_date: String,
    #[validate(range(max = 366, message = "Duration cannot be longer than 366 days"))]
    pub duration_days: i64,
    #[serde(default = "default_min_availability")]
    #[validate(range(max = 86_400, message = "Minimum availability cannot exceed one day"))]
    pub min_availability_seconds: i64,
}

fn default_min_availability() -> i64 {
    DEFAULT_MIN_AVAILABILITY_SECONDS
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddEntryRequest {
    pub start_time_unix: i64,
    /// At most 366 days, the longest plan
    #[validate(range(
        min = 1,
        max = 31_622_400,
        message = "Duration must be between one second and 366 days"
    ))]
    pub duration_seconds: i64,
}

/// Unwrap a JSON body, reporting malformed input as a validation error.
fn json_body<T: Validate>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    let Json(body) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    body.validate()?;
    Ok(body)
}

// ─── User ────────────────────────────────────────────────────

/// Current user with linked providers.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>> {
    Ok(Json(state.user_service.profile(&auth.user).await?))
}

// ─── Plans ───────────────────────────────────────────────────

async fn create_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    payload: std::result::Result<Json<CreatePlanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlanResponse>)> {
    let request = json_body(payload)?;

    let start_date = NaiveDate::parse_from_str(request.start_date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Start date must be formatted as yyyy-m-d".to_string()))?;

    let draft = PlanDraft {
        title: request.title,
        start_date,
        duration_days: request.duration_days,
        min_availability_seconds: request.min_availability_seconds,
    };
    let plan = state.plan_service.create_plan(&auth.user, draft).await?;

    Ok((StatusCode::CREATED, Json(plan)))
}

async fn list_plans(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<PlanResponse>>> {
    Ok(Json(state.plan_service.list_plans(&auth.user).await?))
}

async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<Json<PlanResponse>> {
    Ok(Json(state.plan_service.get_plan(&identifier).await?))
}

async fn delete_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(identifier): Path<String>,
) -> Result<StatusCode> {
    state
        .plan_service
        .delete_plan(&identifier, &auth.user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<Json<AvailabilitySummary>> {
    Ok(Json(state.plan_service.availability(&identifier).await?))
}

// ─── Entries ─────────────────────────────────────────────────

async fn add_entry(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(identifier): Path<String>,
    payload: std::result::Result<Json<AddEntryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EntryResponse>)> {
    let request = json_body(payload)?;
    let entry = state
        .plan_service
        .add_entry(
            &identifier,
            &auth.user,
            request.start_time_unix,
            request.duration_seconds,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(identifier): Path<String>,
) -> Result<Json<Vec<EntryResponse>>> {
    Ok(Json(
        state
            .plan_service
            .list_entries(&identifier, &auth.user)
            .await?,
    ))
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((identifier, entry_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let entry_id = parse_entry_id(&entry_id)?;
    state
        .plan_service
        .delete_entry(&identifier, entry_id, &auth.user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_entry_id(raw: &str) -> Result<i64> {
    raw.parse::<u64>()
        .ok()
        .and_then(|id| i64::try_from(id).ok())
        .ok_or_else(|| AppError::BadRequest("Entry ID is not an unsigned integer".to_string()))
}
