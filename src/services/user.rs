// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User resolution on login and for sessions.

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::User;
use crate::services::oauth::ProviderProfile;
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// The logged-in user's own profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileResponse {
    pub email: String,
    pub display_name: String,
    pub avatar_url: String,
    /// Names of the providers this user has logged in with
    pub providers: Vec<String>,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Resolve the user for a successful provider login, creating the user
    /// and the auth point on first login.
    pub async fn authenticate(
        &self,
        provider_name: &str,
        profile: &ProviderProfile,
    ) -> Result<User, AppError> {
        let email = profile
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                AppError::Validation("Your account does not have an email address".to_string())
            })?;

        // Providers are seeded at startup, so a miss is a server problem.
        let provider = self
            .users
            .get_provider(provider_name)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "Authentication provider {} is not seeded",
                    provider_name
                ))
            })?;

        let user = self
            .users
            .get_or_create_user(email, &profile.display_name, &profile.avatar_url)
            .await?;
        self.users
            .get_or_create_auth_point(user.id, provider.id, &profile.provider_user_id)
            .await?;

        tracing::info!(
            user_id = user.id,
            provider = provider_name,
            "User authenticated"
        );
        Ok(user)
    }

    /// Re-resolve the user named by a verified session.
    pub async fn get_authenticated_user(&self, email: &str) -> Result<User, AppError> {
        self.users
            .get_user_by_email(email)
            .await?
            .ok_or(AppError::Unauthenticated)
    }

    /// Profile with the names of linked providers.
    pub async fn profile(&self, user: &User) -> Result<ProfileResponse, AppError> {
        let points = self.users.get_auth_points(user.id).await?;
        let providers = self.users.list_providers().await?;

        let mut names: Vec<String> = providers
            .into_iter()
            .filter(|p| points.iter().any(|a| a.provider_id == p.id))
            .map(|p| p.name)
            .collect();
        names.sort();

        Ok(ProfileResponse {
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            providers: names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDb;

    async fn service() -> UserService {
        let db = SqliteDb::in_memory().await.unwrap();
        db.seed_providers(&["discord".to_string(), "google".to_string()])
            .await
            .unwrap();
        UserService::new(Arc::new(db))
    }

    fn profile(email: Option<&str>) -> ProviderProfile {
        ProviderProfile {
            provider_user_id: "42".to_string(),
            email: email.map(str::to_string),
            display_name: "Alice".to_string(),
            avatar_url: "https://example.com/a.png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_authenticate_creates_then_reuses() {
        let users = service().await;

        let first = users
            .authenticate("discord", &profile(Some("alice@example.com")))
            .await
            .unwrap();

        let mut renamed = profile(Some("alice@example.com"));
        renamed.display_name = "Someone Else".to_string();
        let second = users.authenticate("google", &renamed).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name, "Alice");

        let me = users.profile(&second).await.unwrap();
        assert_eq!(me.providers, vec!["discord".to_string(), "google".to_string()]);
    }

    #[tokio::test]
    async fn test_authenticate_without_email_rejected() {
        let users = service().await;
        let err = users.authenticate("discord", &profile(None)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_provider_is_system_error() {
        let users = service().await;
        let err = users
            .authenticate("github", &profile(Some("alice@example.com")))
            .await
            .unwrap_err();
        assert!(!err.is_user_error());
    }

    #[tokio::test]
    async fn test_unknown_session_user() {
        let users = service().await;
        assert!(matches!(
            users.get_authenticated_user("ghost@example.com").await.unwrap_err(),
            AppError::Unauthenticated
        ));
    }
}
