//! LokiAI data layer
//!
//! Record access and session lookup for the LokiAI 1:1 conversation
//! preparer, on top of a hosted Postgres backend (PostgREST for rows,
//! GoTrue for sessions).
//!
//! Every query handle borrows an explicit [`Backend`]; there is no global
//! client.

pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod queries;

pub use lokiai_auth as auth;
pub use lokiai_postgrest as postgrest;

use log::debug;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;

use crate::auth::{Auth, AuthOptions};
use crate::config::{ClientOptions, SupabaseConfig};
use crate::error::Result;
use crate::identity::Identity;
use crate::postgrest::PostgrestClient;
use crate::queries::{ConversationQueries, ProfileQueries, UsageQueries};

/// Handle to the hosted backend: one HTTP client, one auth client, one key
#[derive(Clone)]
pub struct Backend {
    config: Arc<SupabaseConfig>,
    /// Key sent as `apikey` (anon or service role)
    api_key: String,
    http_client: Client,
    auth: Arc<Auth>,
    options: ClientOptions,
    service_role: bool,
}

impl Backend {
    /// Create a client authenticated with the public key
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        Self::new_with_options(config, ClientOptions::default())
    }

    /// Create a client with custom options
    ///
    /// # Example
    ///
    /// ```
    /// use lokiai::{Backend, config::{ClientOptions, SupabaseConfig}};
    ///
    /// let config = SupabaseConfig::new("https://project.supabase.co", "anon-key").unwrap();
    /// let options = ClientOptions::default().with_auto_refresh_token(false);
    /// let backend = Backend::new_with_options(config, options).unwrap();
    /// let conversations = backend.conversations();
    /// ```
    pub fn new_with_options(config: SupabaseConfig, options: ClientOptions) -> Result<Self> {
        let api_key = config.anon_key.clone();
        Self::build(config, api_key, options, false)
    }

    /// Create the server-side client authenticated with the service role key.
    ///
    /// Fails with [`error::Error::Configuration`] when the key is not configured.
    /// Sessions are neither persisted nor refreshed.
    pub fn service_role(config: SupabaseConfig, options: ClientOptions) -> Result<Self> {
        let api_key = config.require_service_role_key()?.to_string();
        let options = options
            .with_auto_refresh_token(false)
            .with_persist_session(false);
        Self::build(config, api_key, options, true)
    }

    /// Create a client from `SUPABASE_URL` and `SUPABASE_ANON_KEY`
    pub fn from_env() -> Result<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    fn build(
        config: SupabaseConfig,
        api_key: String,
        options: ClientOptions,
        service_role: bool,
    ) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let auth = Auth::new(
            &config.url,
            &api_key,
            http_client.clone(),
            AuthOptions {
                auto_refresh_token: options.auto_refresh_token,
                persist_session: options.persist_session,
            },
        );

        Ok(Self {
            config: Arc::new(config),
            api_key,
            http_client,
            auth: Arc::new(auth),
            options,
            service_role,
        })
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn is_service_role(&self) -> bool {
        self.service_role
    }

    /// The auth client holding this backend's session
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Start a request against a table or view.
    ///
    /// Resolves the session first, so an expired access token is refreshed
    /// (or dropped, without auto-refresh) before it is used as the bearer.
    pub async fn from(&self, table: &str) -> Result<PostgrestClient> {
        let client = PostgrestClient::new(
            &self.config.url,
            &self.api_key,
            table,
            self.http_client.clone(),
        );
        self.authorize(client).await
    }

    /// Start a stored function call
    pub async fn rpc(&self, function: &str, params: Value) -> Result<PostgrestClient> {
        let client = PostgrestClient::rpc(
            &self.config.url,
            &self.api_key,
            function,
            params,
            self.http_client.clone(),
        );
        self.authorize(client).await
    }

    async fn authorize(&self, client: PostgrestClient) -> Result<PostgrestClient> {
        let session = if self.service_role {
            None
        } else {
            self.auth.get_session().await?
        };
        let (token, role) = match &session {
            Some(session) => (session.access_token.as_str(), "session user"),
            None if self.service_role => (self.api_key.as_str(), "service role"),
            None => (self.api_key.as_str(), "anon"),
        };
        debug!("request to {} as {}", client.table(), role);

        let mut client = client.with_auth(token)?;
        if self.options.db_schema != "public" {
            client = client.schema(&self.options.db_schema)?;
        }
        Ok(client)
    }

    /// Conversation record access
    pub fn conversations(&self) -> ConversationQueries<'_> {
        ConversationQueries::new(self)
    }

    /// Profile record access
    pub fn profiles(&self) -> ProfileQueries<'_> {
        ProfileQueries::new(self)
    }

    /// Usage reporting
    pub fn usage(&self) -> UsageQueries<'_> {
        UsageQueries::new(self)
    }

    /// Session and current-user lookup backed by this client's auth session
    pub fn identity(&self) -> Identity<'_> {
        Identity::new(self.auth.as_ref(), self.profiles())
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::{ClientOptions, SupabaseConfig};
    pub use crate::error::{Error, Result};
    pub use crate::identity::{CurrentUser, Identity, SessionSource};
    pub use crate::models::*;
    pub use crate::Backend;
}
