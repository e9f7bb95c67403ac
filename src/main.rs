// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Groupplan API Server
//!
//! Lets a group log in with an OAuth provider, propose plans, and register
//! availability until a common meeting window emerges.

use anyhow::Context;
use groupplan::{
    config::{Config, ConfigError},
    db::{SqliteDb, UserRepository},
    services::OAuthProviders,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration, writing a template on first run
    let config_path = Config::path_from_env();
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(path)) => {
            Config::write_template(&path)
                .with_context(|| format!("Failed writing config template to {}", path.display()))?;
            eprintln!(
                "No config found. A template was written to {}; \
                 fill in the hostname and OAuth credentials, then restart.",
                path.display()
            );
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };
    tracing::info!(
        port = config.port,
        hostname = %config.hostname,
        "Starting Groupplan API"
    );

    // Open the database and make sure the schema exists
    let db = SqliteDb::connect(&config.database_path)
        .await
        .context("Failed to open database")?;
    tracing::info!(path = %config.database_path, "Database ready");

    let provider_names: Vec<String> = config.providers.iter().map(|p| p.name.clone()).collect();
    db.seed_providers(&provider_names)
        .await
        .context("Failed to seed authentication providers")?;

    let oauth = OAuthProviders::from_config(&config);
    tracing::info!(providers = ?oauth.names(), "OAuth clients initialized");

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, oauth));

    // Build router
    let app = groupplan::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("groupplan=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
