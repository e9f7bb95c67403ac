// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth login and logout routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::auth::SESSION_COOKIE;
use crate::services::oauth::{generate_nonce, sign_state, verify_state, STATE_MAX_AGE_MS};
use crate::AppState;

/// Cookie holding the login nonce between start and callback.
pub const NONCE_COOKIE: &str = "groupplan_oauth_nonce";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/{provider}", get(auth_start))
        .route("/auth/{provider}/callback", get(auth_callback))
        .route("/auth/logout", post(logout))
}

/// Start OAuth flow - redirect to the provider's consent page.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let client = state
        .oauth
        .get(&provider)
        .ok_or_else(|| AppError::NotFound("Unknown login provider".to_string()))?;

    let nonce = generate_nonce()?;
    let oauth_state = sign_state(&provider, &nonce, &state.config.oauth_state_key, now_ms()?)?;
    let auth_url = client.authorize_url(&callback_url(&state.config, &provider), &oauth_state);

    tracing::info!(provider = %provider, "Starting OAuth flow");

    let max_age = time::Duration::milliseconds(STATE_MAX_AGE_MS as i64);
    let jar = jar.add(nonce_cookie(&state.config, &provider, nonce, max_age));
    Ok((jar, Redirect::temporary(&auth_url)))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for a profile, resolve the user, set the
/// session cookie.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let config = &state.config;
    let client = state
        .oauth
        .get(&provider)
        .ok_or_else(|| AppError::NotFound("Unknown login provider".to_string()))?;

    let cookie_nonce = jar.get(NONCE_COOKIE).map(|cookie| cookie.value().to_string());
    let jar = jar.add(nonce_cookie(
        config,
        &provider,
        String::new(),
        time::Duration::ZERO,
    ));

    // User declined consent, or the provider failed
    if let Some(error) = params.error {
        tracing::warn!(provider = %provider, error = %error, "OAuth error from provider");
        let redirect = format!("{}/?error={}", config.public_url(), urlencoding::encode(&error));
        return Ok((jar, Redirect::temporary(&redirect)));
    }

    let login = params
        .state
        .as_deref()
        .and_then(|s| verify_state(s, &config.oauth_state_key, now_ms().ok()?))
        .ok_or_else(|| AppError::BadRequest("Invalid login state, please try again".to_string()))?;

    if login.provider != provider || cookie_nonce.as_deref() != Some(login.nonce.as_str()) {
        tracing::warn!(provider = %provider, "OAuth state does not match this login");
        return Err(AppError::BadRequest(
            "Invalid login state, please try again".to_string(),
        ));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    tracing::info!(provider = %provider, "Exchanging authorization code");

    let profile = client
        .fetch_profile(&code, &callback_url(config, &provider))
        .await?;
    let user = state.user_service.authenticate(&provider, &profile).await?;
    let token = state.sessions.create_token(&user)?;

    let max_age = time::Duration::seconds(state.sessions.ttl().num_seconds());
    let jar = jar.add(session_cookie(config, token, max_age));

    Ok((jar, Redirect::temporary(&format!("{}/", config.public_url()))))
}

/// Logout - expire the session cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    let jar = jar.add(session_cookie(
        &state.config,
        String::new(),
        time::Duration::ZERO,
    ));
    (jar, StatusCode::NO_CONTENT)
}

fn callback_url(config: &Config, provider: &str) -> String {
    format!("{}/auth/{}/callback", config.public_url(), provider)
}

fn now_ms() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Cookie domain, omitted on development hosts.
fn cookie_domain(config: &Config) -> Option<String> {
    if config.is_local() {
        return None;
    }
    let host = config.hostname.split(':').next().unwrap_or(&config.hostname);
    Some(host.to_string())
}

/// Session cookie; an empty value with zero max age expires it.
fn session_cookie(config: &Config, token: String, max_age: time::Duration) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(!config.is_local())
        .max_age(max_age);
    if let Some(domain) = cookie_domain(config) {
        cookie = cookie.domain(domain);
    }
    cookie.build()
}

/// Nonce cookie, only sent back to the provider's callback.
fn nonce_cookie(
    config: &Config,
    provider: &str,
    nonce: String,
    max_age: time::Duration,
) -> Cookie<'static> {
    Cookie::build((NONCE_COOKIE, nonce))
        .http_only(true)
        .path(format!("/auth/{}/callback", provider))
        .same_site(SameSite::Lax)
        .secure(!config.is_local())
        .max_age(max_age)
        .build()
}
