// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plan service: creation, lookup, deletion and availability entries.
//!
//! Every mutating operation loads the referenced row, checks ownership where
//! applicable, validates, persists, and maps the stored row to a response
//! shape that hides internal row ids.

use crate::db::PlanRepository;
use crate::error::AppError;
use crate::models::{NewEntry, NewPlan, Plan, PlanEntry, User};
use crate::services::availability::{self, AvailabilitySummary};
use crate::services::validation::{validate_entry, validate_plan};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{NaiveDate, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Bytes of randomness in a plan identifier.
const IDENTIFIER_BYTES: usize = 16;

/// Public profile of a user, as shown to other participants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PublicUser {
    pub display_name: String,
    pub avatar_url: String,
}

/// A plan as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PlanResponse {
    pub owner: PublicUser,
    pub identifier: String,
    pub title: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_date: NaiveDate,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub duration_days: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub min_availability_seconds: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub start_unix: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub end_unix: i64,
    pub entries: Vec<EntryResponse>,
}

/// An availability entry as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EntryResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub entry_id: i64,
    pub user: PublicUser,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub start_at_unix: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub duration_seconds: i64,
}

impl EntryResponse {
    fn from_entry(entry: PlanEntry) -> Self {
        Self {
            entry_id: entry.id,
            user: PublicUser {
                display_name: entry.user_display_name,
                avatar_url: entry.user_avatar_url,
            },
            start_at_unix: entry.start_time_unix,
            duration_seconds: entry.duration_seconds,
        }
    }
}

impl PlanResponse {
    fn from_plan(plan: Plan, entries: Vec<PlanEntry>) -> Self {
        Self {
            start_unix: plan.start_unix(),
            end_unix: plan.end_unix(),
            owner: PublicUser {
                display_name: plan.owner_display_name,
                avatar_url: plan.owner_avatar_url,
            },
            identifier: plan.identifier,
            title: plan.title,
            start_date: plan.start_date,
            duration_days: plan.duration_days,
            min_availability_seconds: plan.min_availability_seconds,
            entries: entries.into_iter().map(EntryResponse::from_entry).collect(),
        }
    }
}

/// Parameters of a plan to create.
#[derive(Debug, Clone)]
pub struct PlanDraft {
    pub title: String,
    pub start_date: NaiveDate,
    pub duration_days: i64,
    pub min_availability_seconds: i64,
}

/// Service for plan lifecycle and availability entries.
#[derive(Clone)]
pub struct PlanService {
    plans: Arc<dyn PlanRepository>,
}

impl PlanService {
    pub fn new(plans: Arc<dyn PlanRepository>) -> Self {
        Self { plans }
    }

    /// Create a plan owned by `owner` under a fresh public identifier.
    pub async fn create_plan(
        &self,
        owner: &User,
        draft: PlanDraft,
    ) -> Result<PlanResponse, AppError> {
        let new_plan = NewPlan {
            owner_id: owner.id,
            identifier: generate_identifier()?,
            title: draft.title.trim().to_string(),
            start_date: draft.start_date,
            duration_days: draft.duration_days,
            min_availability_seconds: draft.min_availability_seconds,
        };
        validate_plan(&new_plan, Utc::now())?;

        let plan = self.plans.create_plan(&new_plan).await?;
        tracing::info!(
            identifier = %plan.identifier,
            owner_id = owner.id,
            "Plan created"
        );

        Ok(PlanResponse::from_plan(plan, Vec::new()))
    }

    /// Get a plan with all entries. Any authenticated caller may read.
    pub async fn get_plan(&self, identifier: &str) -> Result<PlanResponse, AppError> {
        let plan = self.load_plan(identifier).await?;
        let entries = self.plans.get_entries_for_plan(plan.id).await?;
        Ok(PlanResponse::from_plan(plan, entries))
    }

    /// Plans owned by the caller.
    pub async fn list_plans(&self, owner: &User) -> Result<Vec<PlanResponse>, AppError> {
        let plans = self.plans.get_plans_by_owner(owner.id).await?;

        let mut responses = Vec::with_capacity(plans.len());
        for plan in plans {
            let entries = self.plans.get_entries_for_plan(plan.id).await?;
            responses.push(PlanResponse::from_plan(plan, entries));
        }
        Ok(responses)
    }

    /// Add an availability entry for `user` to the plan.
    pub async fn add_entry(
        &self,
        identifier: &str,
        user: &User,
        start_time_unix: i64,
        duration_seconds: i64,
    ) -> Result<EntryResponse, AppError> {
        let plan = self.load_plan(identifier).await?;

        let new_entry = NewEntry {
            plan_id: plan.id,
            user_id: user.id,
            start_time_unix,
            duration_seconds,
        };
        validate_entry(&plan, &new_entry)?;

        let entry = self
            .plans
            .insert_entry_if_free(&new_entry)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(
                    "Availability conflicts with another entry owned by the same user".to_string(),
                )
            })?;

        tracing::debug!(
            identifier,
            user_id = user.id,
            entry_id = entry.id,
            "Entry added"
        );

        Ok(EntryResponse::from_entry(entry))
    }

    /// Delete a plan and its entries. Only the owner may do this.
    pub async fn delete_plan(&self, identifier: &str, user: &User) -> Result<(), AppError> {
        let plan = self.load_plan(identifier).await?;
        if plan.owner_id != user.id {
            tracing::warn!(identifier, user_id = user.id, "Non-owner tried to delete plan");
            return Err(AppError::Unauthorized(
                "You are not the owner of this plan".to_string(),
            ));
        }

        self.plans.delete_plan(plan.id).await?;
        tracing::info!(identifier, "Plan deleted");
        Ok(())
    }

    /// Delete an entry on the plan. Only the entry's author may do this.
    pub async fn delete_entry(
        &self,
        identifier: &str,
        entry_id: i64,
        user: &User,
    ) -> Result<(), AppError> {
        let plan = self.load_plan(identifier).await?;
        let entry = self
            .plans
            .get_entry(entry_id)
            .await?
            .filter(|e| e.plan_id == plan.id)
            .ok_or_else(|| AppError::NotFound("No such entry exists".to_string()))?;

        if entry.user_id != user.id {
            return Err(AppError::Unauthorized(
                "You are not the owner of this entry".to_string(),
            ));
        }

        self.plans.delete_entry(entry.id).await
    }

    /// The caller's own entries on a plan.
    pub async fn list_entries(
        &self,
        identifier: &str,
        user: &User,
    ) -> Result<Vec<EntryResponse>, AppError> {
        let plan = self.load_plan(identifier).await?;
        let entries = self.plans.get_entries_by_user(plan.id, user.id).await?;
        Ok(entries.into_iter().map(EntryResponse::from_entry).collect())
    }

    /// Best meeting windows across everyone's entries on a plan.
    pub async fn availability(&self, identifier: &str) -> Result<AvailabilitySummary, AppError> {
        let plan = self.load_plan(identifier).await?;
        let entries = self.plans.get_entries_for_plan(plan.id).await?;
        Ok(availability::aggregate(
            &entries,
            plan.min_availability_seconds,
        ))
    }

    async fn load_plan(&self, identifier: &str) -> Result<Plan, AppError> {
        self.plans
            .get_plan(identifier)
            .await?
            .ok_or_else(|| AppError::NotFound("No such plan exists".to_string()))
    }
}

/// Generate a url-safe random plan identifier.
pub fn generate_identifier() -> Result<String, AppError> {
    let mut bytes = [0u8; IDENTIFIER_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed creating secure identifier")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
