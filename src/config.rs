//! Configuration for the backend connection

use log::warn;
use std::env;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

pub const URL_ENV: &str = "SUPABASE_URL";
pub const ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";
pub const SERVICE_ROLE_KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Connection settings for the hosted backend
#[derive(Debug, Clone, PartialEq)]
pub struct SupabaseConfig {
    /// Project URL, without a trailing slash
    pub url: String,
    /// Public (anon) API key
    pub anon_key: String,
    /// Elevated key for the server-side client only
    pub service_role_key: Option<String>,
}

impl SupabaseConfig {
    /// Create a configuration, validating the URL and key
    pub fn new(url: &str, anon_key: &str) -> Result<Self> {
        Url::parse(url).map_err(|e| Error::configuration(format!("invalid {}: {}", URL_ENV, e)))?;
        if anon_key.is_empty() {
            return Err(Error::configuration("anon_key cannot be empty"));
        }

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            service_role_key: None,
        })
    }

    /// Read the configuration from the environment.
    ///
    /// A missing URL or anon key is only logged; requests made with such a
    /// configuration fail when they are sent.
    pub fn from_env() -> Result<Self> {
        let url = env::var(URL_ENV).unwrap_or_default();
        let anon_key = env::var(ANON_KEY_ENV).unwrap_or_default();

        if url.is_empty() || anon_key.is_empty() {
            warn!(
                "backend environment is incomplete: {} is {}, {} is {}",
                URL_ENV,
                if url.is_empty() { "not set" } else { "set" },
                ANON_KEY_ENV,
                if anon_key.is_empty() { "not set" } else { "set" },
            );
        }

        if !url.is_empty() {
            Url::parse(&url)
                .map_err(|e| Error::configuration(format!("invalid {}: {}", URL_ENV, e)))?;
        }

        let service_role_key = env::var(SERVICE_ROLE_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty());

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            service_role_key,
        })
    }

    pub fn with_service_role_key(mut self, key: &str) -> Self {
        self.service_role_key = Some(key.to_string());
        self
    }

    /// The elevated key, required only when the service client is requested
    pub fn require_service_role_key(&self) -> Result<&str> {
        self.service_role_key
            .as_deref()
            .ok_or_else(|| Error::configuration(format!("{} is not set", SERVICE_ROLE_KEY_ENV)))
    }
}

/// Configuration options for the backend client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Whether to refresh an expired session before using it
    pub auto_refresh_token: bool,

    /// Whether to keep the session after sign-in
    pub persist_session: bool,

    /// The request timeout; `None` keeps the HTTP client's default
    pub request_timeout: Option<Duration>,

    /// The database schema
    pub db_schema: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            persist_session: true,
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
        }
    }
}

impl ClientOptions {
    pub fn with_auto_refresh_token(mut self, value: bool) -> Self {
        self.auto_refresh_token = value;
        self
    }

    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }
}
