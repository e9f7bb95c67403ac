// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (SQLite) and the repository traits services depend on.

pub mod sqlite;

pub use sqlite::SqliteDb;

use crate::error::AppError;
use crate::models::{
    AuthenticationProvider, NewEntry, NewPlan, Plan, PlanEntry, User, UserAuthPoint,
};
use async_trait::async_trait;

/// Plan and entry persistence.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Insert a plan and return it with its owner's profile.
    async fn create_plan(&self, plan: &NewPlan) -> Result<Plan, AppError>;

    /// Get a plan by its public identifier.
    async fn get_plan(&self, identifier: &str) -> Result<Option<Plan>, AppError>;

    /// All plans owned by a user, oldest first.
    async fn get_plans_by_owner(&self, owner_id: i64) -> Result<Vec<Plan>, AppError>;

    /// Delete a plan together with its entries.
    async fn delete_plan(&self, plan_id: i64) -> Result<(), AppError>;

    /// All entries on a plan, ordered by start time.
    async fn get_entries_for_plan(&self, plan_id: i64) -> Result<Vec<PlanEntry>, AppError>;

    /// One user's entries on a plan, ordered by start time.
    async fn get_entries_by_user(
        &self,
        plan_id: i64,
        user_id: i64,
    ) -> Result<Vec<PlanEntry>, AppError>;

    /// Insert an entry unless it overlaps another entry by the same user on
    /// the same plan. Returns `None` on overlap. The check and the insert are
    /// a single statement.
    async fn insert_entry_if_free(&self, entry: &NewEntry) -> Result<Option<PlanEntry>, AppError>;

    async fn get_entry(&self, entry_id: i64) -> Result<Option<PlanEntry>, AppError>;

    async fn delete_entry(&self, entry_id: i64) -> Result<(), AppError>;
}

/// User, provider and auth point persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Ensure a provider row exists for each name.
    async fn seed_providers(&self, names: &[String]) -> Result<(), AppError>;

    async fn get_provider(&self, name: &str) -> Result<Option<AuthenticationProvider>, AppError>;

    async fn list_providers(&self) -> Result<Vec<AuthenticationProvider>, AppError>;

    /// Return the user with this email, creating it if needed.
    /// An existing row is returned unchanged.
    async fn get_or_create_user(
        &self,
        email: &str,
        display_name: &str,
        avatar_url: &str,
    ) -> Result<User, AppError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Return the auth point for (user, provider), creating it if needed.
    async fn get_or_create_auth_point(
        &self,
        user_id: i64,
        provider_id: i64,
        identifier: &str,
    ) -> Result<UserAuthPoint, AppError>;

    async fn get_auth_points(&self, user_id: i64) -> Result<Vec<UserAuthPoint>, AppError>;
}
