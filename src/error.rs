//! Error handling for the LokiAI data layer

use std::fmt;
use thiserror::Error;

use lokiai_auth::AuthError;
use lokiai_postgrest::PostgrestError;

/// Unified error type for record access and identity lookups
#[derive(Error, Debug)]
pub enum Error {
    /// The database call failed or returned an error payload
    #[error("Database error: {0}")]
    Remote(#[from] PostgrestError),

    /// The auth service call failed
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Building the HTTP client failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A single-row lookup matched zero or several rows
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Required configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A record failed validation at the boundary
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A row could not be decoded into its record type
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration<T: fmt::Display>(msg: T) -> Self {
        Error::Configuration(msg.to_string())
    }

    pub fn invalid_record<T: fmt::Display>(msg: T) -> Self {
        Error::InvalidRecord(msg.to_string())
    }

    /// Map a database error for a lookup keyed by `key`, turning
    /// PostgREST's "no single row" answer into [`Error::NotFound`].
    pub(crate) fn from_lookup(err: PostgrestError, entity: &'static str, key: &str) -> Self {
        if err.is_no_single_row() {
            Error::NotFound {
                entity,
                key: key.to_string(),
            }
        } else {
            Error::Remote(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
