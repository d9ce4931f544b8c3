//! Auth client for the LokiAI backend
//!
//! Authentication is delegated to the hosted backend's GoTrue service.
//! This crate signs users in, keeps the current session, refreshes it
//! when it expires, and decodes the claims carried by its access token.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Seconds before `expires_at` at which a session already counts as expired
pub const EXPIRY_MARGIN_SECS: i64 = 10;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing session")]
    MissingSession,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Authenticated user as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    /// Unix timestamp; filled from `expires_in` when the server omits it
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub token_type: String,
    pub user: User,
}

impl Session {
    fn stamped(mut self) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(Utc::now().timestamp() + self.expires_in);
        }
        self
    }

    /// Whether the access token is expired or about to expire
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now().timestamp() + EXPIRY_MARGIN_SECS >= expires_at,
            None => false,
        }
    }

    /// Decode the access token's claims.
    ///
    /// The signature is not verified: the token came from the backend over
    /// the same channel and the backend re-verifies it on every request.
    pub fn claims(&self) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<Claims>(
            &self.access_token,
            &DecodingKey::from_secret(&[]),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

/// Claims carried by a backend access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub auto_refresh_token: bool,
    pub persist_session: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            persist_session: true,
        }
    }
}

/// Client for the backend's authentication service
pub struct Auth {
    url: String,
    key: String,
    http_client: Client,
    options: AuthOptions,
    current_session: Arc<RwLock<Option<Session>>>,
}

impl Auth {
    pub fn new(url: &str, key: &str, http_client: Client, options: AuthOptions) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
            options,
            current_session: Arc::new(RwLock::new(None)),
        }
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    /// Sign in with email and password
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.url);

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });

        let session = self.post_for_session(&url, &payload).await?;
        self.store(session.clone());
        Ok(session)
    }

    /// The stored session, without touching the network
    pub fn current_session(&self) -> Option<Session> {
        self.current_session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolve the session for this client.
    ///
    /// Returns `Ok(None)` when nobody is signed in. An expired session is
    /// refreshed when auto-refresh is enabled and dropped otherwise.
    pub async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let session = match self.current_session() {
            Some(session) => session,
            None => return Ok(None),
        };

        if !session.is_expired() {
            return Ok(Some(session));
        }

        if self.options.auto_refresh_token {
            debug!("session for {} expired, refreshing", session.user.id);
            return self.refresh_session().await.map(Some);
        }

        warn!("session for {} expired and auto-refresh is off", session.user.id);
        self.clear();
        Ok(None)
    }

    /// Replace the stored session
    pub fn set_session(&self, session: Session) {
        let mut write_guard = self
            .current_session
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *write_guard = Some(session.stamped());
    }

    /// Exchange the stored refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let session = self.current_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.url);

        let payload = serde_json::json!({
            "refresh_token": session.refresh_token,
        });

        let new_session = self.post_for_session(&url, &payload).await?;
        self.store(new_session.clone());
        Ok(new_session)
    }

    /// Fetch the signed-in user from the backend
    pub async fn get_user(&self) -> Result<User, AuthError> {
        let session = self.current_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/user", self.url);

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        Ok(response.json::<User>().await?)
    }

    /// Sign out and forget the stored session
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.current_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/logout", self.url);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        self.clear();
        Ok(())
    }

    async fn post_for_session(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<Session, AuthError> {
        let response = self
            .http_client
            .post(url)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        let session: Session = response.json().await?;
        Ok(session.stamped())
    }

    fn store(&self, session: Session) {
        if self.options.persist_session {
            self.set_session(session);
        }
    }

    fn clear(&self) {
        let mut write_guard = self
            .current_session
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *write_guard = None;
    }
}
