// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User and authentication models for storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User row. Email is the identity key across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}

/// An OAuth identity provider, seeded from config at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuthenticationProvider {
    pub id: i64,
    pub name: String,
}

/// Link between a user and a provider-specific account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserAuthPoint {
    pub id: i64,
    pub user_id: i64,
    pub provider_id: i64,
    /// The provider's own id for this user
    pub identifier: String,
}
