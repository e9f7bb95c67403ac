// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Groupplan: find a time that works for everyone
//!
//! This crate provides the backend API for creating plans, collecting each
//! participant's availability, and reporting the windows where most people
//! are free.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::SqliteDb;
use services::{OAuthProviders, PlanService, SessionManager, UserService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: SqliteDb,
    pub plan_service: PlanService,
    pub user_service: UserService,
    pub sessions: SessionManager,
    pub oauth: OAuthProviders,
}

impl AppState {
    /// Wire services over `db`, with the given OAuth clients.
    pub fn new(config: Config, db: SqliteDb, oauth: OAuthProviders) -> Self {
        let shared = Arc::new(db.clone());
        Self {
            plan_service: PlanService::new(shared.clone()),
            user_service: UserService::new(shared),
            sessions: SessionManager::new(&config.jwt_signing_key, config.session_ttl_hours),
            config,
            db,
            oauth,
        }
    }
}
