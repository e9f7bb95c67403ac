// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod availability;
pub mod oauth;
pub mod plan;
pub mod session;
pub mod user;
pub mod validation;

pub use availability::{AvailabilitySummary, AvailabilityWindow};
pub use oauth::{HttpOAuthClient, OAuthClient, OAuthProviders, ProviderProfile};
pub use plan::{EntryResponse, PlanDraft, PlanResponse, PlanService, PublicUser};
pub use session::{Claims, SessionManager};
pub use user::{ProfileResponse, UserService};
