// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth authorization-code login against the configured providers.
//!
//! Handles:
//! - Building the provider authorize URL
//! - Signing and verifying the `state` round-trip parameter and its nonce
//! - Exchanging the code for an access token
//! - Fetching and normalizing the user's profile

use crate::config::{Config, ProviderConfig};
use crate::error::AppError;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed `state` stays valid, in milliseconds.
pub const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

/// A user's profile as reported by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    /// The provider's own id for this user
    pub provider_user_id: String,
    pub email: Option<String>,
    pub display_name: String,
    pub avatar_url: String,
}

/// One provider's authorization-code flow.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Provider name as used in `/auth/{provider}`.
    fn name(&self) -> &str;

    /// URL to send the browser to for consent.
    fn authorize_url(&self, redirect_uri: &str, state: &str) -> String;

    /// Exchange `code` for a token and fetch the user's profile.
    async fn fetch_profile(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderProfile, AppError>;
}

/// OAuth client talking to a real provider over HTTPS.
#[derive(Clone)]
pub struct HttpOAuthClient {
    http: reqwest::Client,
    provider: ProviderConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Union of the Discord user object and OIDC userinfo fields we read.
#[derive(Debug, Default, Deserialize)]
struct RawProfile {
    id: Option<String>,
    sub: Option<String>,
    email: Option<String>,
    /// Discord: the email has been verified
    verified: Option<bool>,
    /// OIDC: the email has been verified
    email_verified: Option<bool>,
    username: Option<String>,
    global_name: Option<String>,
    name: Option<String>,
    avatar: Option<String>,
    picture: Option<String>,
}

impl RawProfile {
    fn into_profile(self) -> Option<ProviderProfile> {
        let provider_user_id = self.id.or(self.sub)?;

        // The email keys the account, so only trust one the provider verified
        let email_verified = self.verified.or(self.email_verified).unwrap_or(false);
        let email = self.email.filter(|e| email_verified && !e.trim().is_empty());

        let avatar_url = match (self.picture, self.avatar) {
            (Some(picture), _) => picture,
            (None, Some(hash)) => format!(
                "https://cdn.discordapp.com/avatars/{}/{}.png",
                provider_user_id, hash
            ),
            (None, None) => String::new(),
        };

        let display_name = self
            .global_name
            .or(self.name)
            .or(self.username)
            .unwrap_or_default();

        Some(ProviderProfile {
            provider_user_id,
            email,
            display_name,
            avatar_url,
        })
    }
}

impl HttpOAuthClient {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            provider,
        }
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, AppError> {
        let response = self
            .http
            .post(&self.provider.token_url)
            .form(&[
                ("client_id", self.provider.client_id.as_str()),
                ("client_secret", self.provider.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| {
                provider_error(&self.provider.name, format!("Token exchange failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = %self.provider.name,
                status = %status,
                body = %body,
                "OAuth token exchange failed"
            );
            return Err(provider_error(
                &self.provider.name,
                format!("Token exchange failed with status {}", status),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            provider_error(&self.provider.name, format!("Failed to parse token response: {}", e))
        })?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl OAuthClient for HttpOAuthClient {
    fn name(&self) -> &str {
        &self.provider.name
    }

    fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.provider.authorize_url,
            urlencoding::encode(&self.provider.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.provider.scopes.join(" ")),
            urlencoding::encode(state),
        )
    }

    async fn fetch_profile(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderProfile, AppError> {
        let access_token = self.exchange_code(code, redirect_uri).await?;

        let response = self
            .http
            .get(&self.provider.userinfo_url)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| {
                provider_error(&self.provider.name, format!("Profile request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(provider_error(
                &self.provider.name,
                format!("Profile request failed with status {}", status),
            ));
        }

        let raw: RawProfile = response.json().await.map_err(|e| {
            provider_error(&self.provider.name, format!("Failed to parse profile: {}", e))
        })?;

        raw.into_profile().ok_or_else(|| {
            provider_error(&self.provider.name, "Profile has no user id".to_string())
        })
    }
}

fn provider_error(provider: &str, message: String) -> AppError {
    AppError::Internal(anyhow::anyhow!("OAuth provider {}: {}", provider, message))
}

/// The configured OAuth clients, keyed by provider name.
#[derive(Clone, Default)]
pub struct OAuthProviders {
    clients: HashMap<String, Arc<dyn OAuthClient>>,
}

impl OAuthProviders {
    pub fn from_config(config: &Config) -> Self {
        let mut providers = Self::default();
        for provider in &config.providers {
            providers.insert(Arc::new(HttpOAuthClient::new(provider.clone())));
        }
        providers
    }

    pub fn insert(&mut self, client: Arc<dyn OAuthClient>) {
        self.clients.insert(client.name().to_string(), client);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OAuthClient>> {
        self.clients.get(name).cloned()
    }

    /// Provider names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Contents of a verified `state` value.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginState {
    pub provider: String,
    /// Must match the nonce cookie set when the login started
    pub nonce: String,
}

/// Generate a random nonce binding a login to the browser that started it.
pub fn generate_nonce() -> Result<String, AppError> {
    let mut bytes = [0u8; 16];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed creating login nonce")))?;
    Ok(hex::encode(bytes))
}

/// Sign a `state` value binding the login to `provider`, `nonce` and the
/// current time.
pub fn sign_state(
    provider: &str,
    nonce: &str,
    secret: &[u8],
    now_ms: u128,
) -> Result<String, AppError> {
    // "provider|nonce|timestamp_hex"
    let payload = format!("{}|{}|{:x}", provider, nonce, now_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify a `state` value. Returns `None` if it is malformed, tampered with,
/// or older than `STATE_MAX_AGE_MS`.
pub fn verify_state(state: &str, secret: &[u8], now_ms: u128) -> Option<LoginState> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let parts: Vec<&str> = state_str.splitn(4, '|').collect();
    if parts.len() != 4 {
        return None;
    }
    let (provider, nonce, timestamp_hex, signature_hex) = (parts[0], parts[1], parts[2], parts[3]);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}|{}", provider, nonce, timestamp_hex).as_bytes());
    let signature = hex::decode(signature_hex).ok()?;
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_ms = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if issued_ms > now_ms || now_ms - issued_ms > STATE_MAX_AGE_MS {
        tracing::warn!(provider, "Expired OAuth state");
        return None;
    }

    Some(LoginState {
        provider: provider.to_string(),
        nonce: nonce.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"secret_key";
    const NOW: u128 = 1_893_456_000_000;

    #[test]
    fn test_state_roundtrip() {
        let state = sign_state("discord", "abc123", SECRET, NOW).unwrap();
        assert_eq!(
            verify_state(&state, SECRET, NOW + 1000),
            Some(LoginState {
                provider: "discord".to_string(),
                nonce: "abc123".to_string(),
            })
        );
    }

    #[test]
    fn test_state_wrong_secret() {
        let state = sign_state("discord", "abc123", SECRET, NOW).unwrap();
        assert_eq!(verify_state(&state, b"wrong_key", NOW), None);
    }

    #[test]
    fn test_state_tampered_provider() {
        let state = sign_state("discord", "abc123", SECRET, NOW).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(state).unwrap()).unwrap();
        let forged = URL_SAFE_NO_PAD.encode(decoded.replacen("discord", "google", 1));
        assert_eq!(verify_state(&forged, SECRET, NOW), None);
    }

    #[test]
    fn test_state_expired() {
        let state = sign_state("discord", "abc123", SECRET, NOW).unwrap();
        assert_eq!(
            verify_state(&state, SECRET, NOW + STATE_MAX_AGE_MS + 1),
            None
        );
    }

    #[test]
    fn test_state_malformed() {
        assert_eq!(verify_state("!!!", SECRET, NOW), None);
        let encoded = URL_SAFE_NO_PAD.encode("invalid|format");
        assert_eq!(verify_state(&encoded, SECRET, NOW), None);
    }

    #[test]
    fn test_nonce_is_random_hex() {
        let nonce = generate_nonce().unwrap();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(nonce, generate_nonce().unwrap());
    }

    #[test]
    fn test_discord_profile() {
        let raw: RawProfile = serde_json::from_value(serde_json::json!({
            "id": "80351110224678912",
            "username": "nelly",
            "global_name": "Nelly",
            "avatar": "8342729096ea3675442027381ff50dfe",
            "email": "nelly@discord.com",
            "verified": true
        }))
        .unwrap();

        let profile = raw.into_profile().unwrap();
        assert_eq!(profile.provider_user_id, "80351110224678912");
        assert_eq!(profile.email.as_deref(), Some("nelly@discord.com"));
        assert_eq!(profile.display_name, "Nelly");
        assert_eq!(
            profile.avatar_url,
            "https://cdn.discordapp.com/avatars/80351110224678912/8342729096ea3675442027381ff50dfe.png"
        );
    }

    #[test]
    fn test_unverified_email_dropped() {
        let raw: RawProfile = serde_json::from_value(serde_json::json!({
            "id": "80351110224678912",
            "username": "nelly",
            "email": "victim@example.com",
            "verified": false
        }))
        .unwrap();
        assert_eq!(raw.into_profile().unwrap().email, None);

        // No verification claim at all
        let raw: RawProfile = serde_json::from_value(serde_json::json!({
            "sub": "1234",
            "email": "victim@example.com"
        }))
        .unwrap();
        assert_eq!(raw.into_profile().unwrap().email, None);
    }

    #[test]
    fn test_oidc_verified_email() {
        let raw: RawProfile = serde_json::from_value(serde_json::json!({
            "sub": "1234",
            "email": "sam@example.com",
            "email_verified": true
        }))
        .unwrap();
        assert_eq!(
            raw.into_profile().unwrap().email.as_deref(),
            Some("sam@example.com")
        );
    }

    #[test]
    fn test_oidc_profile() {
        let raw: RawProfile = serde_json::from_value(serde_json::json!({
            "sub": "1234",
            "email": "",
            "name": "Sam",
            "picture": "https://example.com/sam.jpg"
        }))
        .unwrap();

        let profile = raw.into_profile().unwrap();
        assert_eq!(profile.provider_user_id, "1234");
        assert_eq!(profile.email, None);
        assert_eq!(profile.display_name, "Sam");
        assert_eq!(profile.avatar_url, "https://example.com/sam.jpg");
    }

    #[test]
    fn test_profile_without_id() {
        assert!(RawProfile::default().into_profile().is_none());
    }

    #[test]
    fn test_authorize_url() {
        let client = HttpOAuthClient::new(ProviderConfig {
            client_id: "abc".to_string(),
            client_secret: "s".to_string(),
            ..ProviderConfig::discord_template()
        });

        let url = client.authorize_url("http://localhost:8080/auth/discord/callback", "st");
        assert!(url.starts_with("https://discord.com/oauth2/authorize?client_id=abc&"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fdiscord%2Fcallback"
        ));
        assert!(url.contains("scope=identify%20email"));
        assert!(url.ends_with("state=st"));
    }

    #[test]
    fn test_registry_from_config() {
        let providers = OAuthProviders::from_config(&Config::test_default());
        assert_eq!(providers.names(), vec!["discord".to_string()]);
        assert!(providers.get("discord").is_some());
        assert!(providers.get("github").is_none());
    }
}
