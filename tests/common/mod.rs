// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use groupplan::config::Config;
use groupplan::db::{SqliteDb, UserRepository};
use groupplan::error::AppError;
use groupplan::models::User;
use groupplan::routes::create_router;
use groupplan::services::{OAuthClient, OAuthProviders, ProviderProfile};
use groupplan::AppState;
use std::sync::Arc;

/// OAuth client that accepts the code "good-code" and returns a fixed profile.
pub struct FakeOAuthClient {
    pub profile: ProviderProfile,
}

#[async_trait]
impl OAuthClient for FakeOAuthClient {
    fn name(&self) -> &str {
        "discord"
    }

    fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://provider.test/authorize?redirect_uri={}&state={}",
            urlencoding::encode(redirect_uri),
            state
        )
    }

    async fn fetch_profile(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<ProviderProfile, AppError> {
        if code == "good-code" {
            Ok(self.profile.clone())
        } else {
            Err(AppError::Internal(anyhow::anyhow!("invalid code")))
        }
    }
}

#[allow(dead_code)]
pub fn fake_profile(email: Option<&str>) -> ProviderProfile {
    ProviderProfile {
        provider_user_id: "80351110224678912".to_string(),
        email: email.map(str::to_string),
        display_name: "Nelly".to_string(),
        avatar_url: "https://cdn.example.com/nelly.png".to_string(),
    }
}

/// Create a test app backed by an in-memory database and a fake provider.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub async fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default(), fake_profile(Some("nelly@example.com"))).await
}

#[allow(dead_code)]
pub async fn create_test_app_with(
    config: Config,
    profile: ProviderProfile,
) -> (axum::Router, Arc<AppState>) {
    let db = SqliteDb::in_memory().await.expect("in-memory database");
    db.seed_providers(&["discord".to_string()])
        .await
        .expect("seed providers");

    let mut oauth = OAuthProviders::default();
    oauth.insert(Arc::new(FakeOAuthClient { profile }));

    let state = Arc::new(AppState::new(config, db, oauth));
    (create_router(state.clone()), state)
}

/// Create a user and a session token for it.
#[allow(dead_code)]
pub async fn login(state: &AppState, email: &str, name: &str) -> (User, String) {
    let user = state
        .db
        .get_or_create_user(email, name, "")
        .await
        .expect("create user");
    let token = state.sessions.create_token(&user).expect("create token");
    (user, token)
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("JSON body")
}

#[allow(dead_code)]
pub fn json_request(
    method: &str,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::AUTHORIZATION, format!("Bearer {}", token))
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str, token: &str) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .expect("request")
}
