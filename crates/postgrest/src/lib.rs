//! PostgREST client for the LokiAI backend
//!
//! This crate provides the database half of the hosted backend:
//! querying, filtering, and manipulating rows through the PostgREST API.
//!
//! # Features
//!
//! - Query API (`select`, `insert`, `update`, `delete`)
//! - Filtering (`eq`, `or`)
//! - Ordering and limits
//! - Single-object responses (`single`)
//! - RPC function calls

use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Error code PostgREST reports when a single-object request matched zero or many rows
pub const NO_SINGLE_ROW_CODE: &str = "PGRST116";

/// Postgres error code for a unique constraint violation
pub const UNIQUE_VIOLATION_CODE: &str = "23505";

const SINGLE_OBJECT_ACCEPT: &str = "application/vnd.pgrst.object+json";

/// Error payload returned by the PostgREST API
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostgrestApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl fmt::Display for PostgrestApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Error, Debug)]
pub enum PostgrestError {
    #[error("API error: {details} (Status: {status})")]
    ApiError {
        details: PostgrestApiErrorDetails,
        status: reqwest::StatusCode,
    },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApiError {
        message: String,
        status: reqwest::StatusCode,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl PostgrestError {
    /// The Postgres/PostgREST error code, when the response carried one
    pub fn code(&self) -> Option<&str> {
        match self {
            PostgrestError::ApiError { details, .. } => details.code.as_deref(),
            _ => None,
        }
    }

    /// A single-object request matched zero or several rows
    pub fn is_no_single_row(&self) -> bool {
        self.code() == Some(NO_SINGLE_ROW_CODE)
    }

    /// The write was rejected by a unique constraint
    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(UNIQUE_VIOLATION_CODE)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Request builder for one table, view, or RPC function
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    base_url: String,
    table: String,
    http_client: Client,
    headers: HeaderMap,
    query_params: HashMap<String, String>,
    is_rpc: bool,
    rpc_params: Option<Value>,
}

impl PostgrestClient {
    /// Create a client for a table or view
    pub fn new(base_url: &str, api_key: &str, table: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            http_client,
            headers: Self::default_headers(api_key),
            query_params: HashMap::new(),
            is_rpc: false,
            rpc_params: None,
        }
    }

    /// Create a client for a stored function call
    pub fn rpc(
        base_url: &str,
        api_key: &str,
        function_name: &str,
        params: Value,
        http_client: Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            table: function_name.to_string(),
            http_client,
            headers: Self::default_headers(api_key),
            query_params: HashMap::new(),
            is_rpc: true,
            rpc_params: Some(params),
        }
    }

    fn default_headers(api_key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        // An unusable key still produces a request; the server rejects it.
        if let Ok(value) = HeaderValue::from_str(api_key) {
            headers.insert("apikey", value);
        }
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers
    }

    /// The table, view, or function this client addresses
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Add a header
    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, PostgrestError> {
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header value: {}", value))
        })?;
        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header name: {}", key))
        })?;

        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Set the bearer token
    pub fn with_auth(self, token: &str) -> Result<Self, PostgrestError> {
        self.with_header("Authorization", &format!("Bearer {}", token))
    }

    /// Target a schema other than `public`
    pub fn schema(self, schema_name: &str) -> Result<Self, PostgrestError> {
        self.with_header("Accept-Profile", schema_name)?
            .with_header("Content-Profile", schema_name)
    }

    /// Columns to return
    pub fn select(mut self, columns: &str) -> Self {
        self.query_params
            .insert("select".to_string(), columns.to_string());
        self
    }

    /// Equality filter
    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.query_params
            .insert(column.to_string(), format!("eq.{}", value));
        self
    }

    /// Disjunction of filters, e.g. `title.ilike.*x*,employee_name.ilike.*x*`
    pub fn or(mut self, filters: &str) -> Self {
        self.query_params
            .insert("or".to_string(), format!("({})", filters));
        self
    }

    pub fn order(mut self, column: &str, order: SortOrder) -> Self {
        let order_str = match order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        self.query_params
            .insert("order".to_string(), format!("{}.{}", column, order_str));
        self
    }

    pub fn limit(mut self, count: u32) -> Self {
        self.query_params
            .insert("limit".to_string(), count.to_string());
        self
    }

    /// Ask for exactly one row as a JSON object.
    ///
    /// PostgREST answers `406` with code `PGRST116` when zero or several rows match.
    pub fn single(mut self) -> Self {
        self.headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(SINGLE_OBJECT_ACCEPT),
        );
        self
    }

    /// Fetch the matching rows
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, PostgrestError> {
        let value = self.send(Method::GET, None, None).await?;
        serde_json::from_value(value).map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// Fetch exactly one row
    pub async fn execute_single<T: DeserializeOwned>(&self) -> Result<T, PostgrestError> {
        let value = self.clone().single().send(Method::GET, None, None).await?;
        serde_json::from_value(value).map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// Insert rows and return their representation
    pub async fn insert<T: Serialize>(&self, values: T) -> Result<Value, PostgrestError> {
        let body = serde_json::to_value(values)?;
        self.send(Method::POST, Some(body), Some("return=representation"))
            .await
    }

    /// Update the matching rows and return their representation
    pub async fn update<T: Serialize>(&self, values: T) -> Result<Value, PostgrestError> {
        let body = serde_json::to_value(values)?;
        self.send(Method::PATCH, Some(body), Some("return=representation"))
            .await
    }

    /// Delete the matching rows and return what was removed
    pub async fn delete(&self) -> Result<Value, PostgrestError> {
        self.send(Method::DELETE, None, Some("return=representation"))
            .await
    }

    /// Call the stored function this client was created for
    pub async fn call_rpc<T: DeserializeOwned>(&self) -> Result<T, PostgrestError> {
        if !self.is_rpc {
            return Err(PostgrestError::InvalidParameters(
                "Client was not created for RPC. Use PostgrestClient::rpc().".to_string(),
            ));
        }
        let params = self.rpc_params.clone().ok_or_else(|| {
            PostgrestError::InvalidParameters("RPC parameters are missing.".to_string())
        })?;

        let value = self.send(Method::POST, Some(params), None).await?;
        serde_json::from_value(value).map_err(|e| {
            PostgrestError::DeserializationError(format!(
                "Failed to deserialize RPC response: {}",
                e
            ))
        })
    }

    async fn send(
        &self,
        method: Method,
        body: Option<Value>,
        prefer: Option<&'static str>,
    ) -> Result<Value, PostgrestError> {
        let url = self.build_url()?;
        debug!("PostgREST {} {}", method, self.table);

        let mut headers = self.headers.clone();
        if let Some(prefer) = prefer {
            headers.insert(
                HeaderName::from_static("prefer"),
                HeaderValue::from_static(prefer),
            );
        }

        let mut request = self.http_client.request(method, &url).headers(headers);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(PostgrestError::NetworkError)?;
        Self::read_response(response).await
    }

    async fn read_response(response: Response) -> Result<Value, PostgrestError> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            return match serde_json::from_str::<PostgrestApiErrorDetails>(&error_text) {
                Ok(details) => Err(PostgrestError::ApiError { details, status }),
                Err(_) => Err(PostgrestError::UnparsedApiError {
                    message: error_text,
                    status,
                }),
            };
        }

        let body_text = response.text().await.map_err(|e| {
            PostgrestError::DeserializationError(format!("Failed to read response body: {}", e))
        })?;

        // 204 No Content
        if body_text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str::<Value>(&body_text)
            .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    fn build_url(&self) -> Result<String, PostgrestError> {
        let path = if self.is_rpc {
            format!("{}/rest/v1/rpc/{}", self.base_url, self.table)
        } else {
            format!("{}/rest/v1/{}", self.base_url, self.table)
        };
        let mut url = Url::parse(&path)?;

        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }

        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, table: &str) -> PostgrestClient {
        PostgrestClient::new(&server.uri(), "fake-key", table, Client::new())
    }

    #[tokio::test]
    async fn test_select_with_filter_and_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/items"))
            .and(query_param("select", "*"))
            .and(query_param("owner", "eq.u1"))
            .and(query_param("order", "created_at.desc"))
            .and(header("apikey", "fake-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 2, "name": "Second" },
                { "id": 1, "name": "First" }
            ])))
            .mount(&mock_server)
            .await;

        let result = client(&mock_server, "items")
            .select("*")
            .eq("owner", "u1")
            .order("created_at", SortOrder::Descending)
            .execute::<Value>()
            .await;

        let data = result.expect("select should succeed");
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["name"], "Second");
    }

    #[tokio::test]
    async fn test_execute_single_sends_object_accept_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/items"))
            .and(query_param("id", "eq.7"))
            .and(header("accept", SINGLE_OBJECT_ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7 })))
            .mount(&mock_server)
            .await;

        let row: Value = client(&mock_server, "items")
            .select("*")
            .eq("id", "7")
            .execute_single()
            .await
            .unwrap();

        assert_eq!(row["id"], 7);
    }

    #[tokio::test]
    async fn test_single_with_no_rows_reports_pgrst116() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/items"))
            .respond_with(ResponseTemplate::new(406).set_body_json(json!({
                "code": "PGRST116",
                "message": "JSON object requested, multiple (or no) rows returned",
                "details": "The result contains 0 rows",
                "hint": null
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server, "items")
            .eq("id", "missing")
            .execute_single::<Value>()
            .await
            .unwrap_err();

        assert!(err.is_no_single_row());
        assert!(!err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_insert() {
        let mock_server = MockServer::start().await;

        let insert_data = json!({ "name": "New Item", "value": 10 });
        let expected_response = json!({ "id": 3, "name": "New Item", "value": 10 });

        Mock::given(method("POST"))
            .and(path("/rest/v1/items"))
            .and(header("apikey", "fake-key"))
            .and(header("content-type", "application/json"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(&insert_data))
            .respond_with(ResponseTemplate::new(201).set_body_json(&expected_response))
            .mount(&mock_server)
            .await;

        let data = client(&mock_server, "items")
            .single()
            .insert(&insert_data)
            .await
            .unwrap();

        assert_eq!(data, expected_response);
    }

    #[tokio::test]
    async fn test_update() {
        let mock_server = MockServer::start().await;

        let update_data = json!({ "value": 20 });
        let expected_response = json!([{ "id": 1, "name": "Updated Item", "value": 20 }]);

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/items"))
            .and(query_param("id", "eq.1"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(&update_data))
            .respond_with(ResponseTemplate::new(200).set_body_json(&expected_response))
            .mount(&mock_server)
            .await;

        let data = client(&mock_server, "items")
            .eq("id", "1")
            .update(&update_data)
            .await
            .unwrap();

        assert_eq!(data, expected_response);
    }

    #[tokio::test]
    async fn test_delete_with_empty_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/rest/v1/items"))
            .and(query_param("id", "eq.1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let data = client(&mock_server, "items").eq("id", "1").delete().await.unwrap();
        assert_eq!(data, Value::Null);
    }

    #[tokio::test]
    async fn test_rpc() {
        let mock_server = MockServer::start().await;
        let params = json!({ "p_user_id": "u1" });

        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/get_stats"))
            .and(body_json(&params))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "total": 4 }])))
            .mount(&mock_server)
            .await;

        let rows: Vec<Value> = PostgrestClient::rpc(
            &mock_server.uri(),
            "fake-key",
            "get_stats",
            params,
            Client::new(),
        )
        .call_rpc()
        .await
        .unwrap();

        assert_eq!(rows[0]["total"], 4);
    }

    #[tokio::test]
    async fn test_call_rpc_on_table_client_is_rejected() {
        let err = PostgrestClient::new("http://localhost", "k", "items", Client::new())
            .call_rpc::<Value>()
            .await
            .unwrap_err();

        assert!(matches!(err, PostgrestError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_error_handling() {
        let mock_server = MockServer::start().await;

        let duplicate = json!({ "user_id": "u1" });
        Mock::given(method("POST"))
            .and(path("/rest/v1/items"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint",
                "details": null,
                "hint": null
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/server_error"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&mock_server)
            .await;

        let conflict = client(&mock_server, "items").insert(&duplicate).await.unwrap_err();
        match &conflict {
            PostgrestError::ApiError { status, .. } => {
                assert_eq!(*status, reqwest::StatusCode::CONFLICT)
            }
            e => panic!("Expected ApiError for 409, got {:?}", e),
        }
        assert!(conflict.is_unique_violation());

        let server_error = client(&mock_server, "server_error")
            .execute::<Value>()
            .await
            .unwrap_err();
        match server_error {
            PostgrestError::UnparsedApiError { message, status } => {
                assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(message, "Internal Server Error");
            }
            e => panic!("Expected UnparsedApiError for 500, got {:?}", e),
        }
    }

    #[test]
    fn test_build_url_for_rpc_and_table() {
        let table = PostgrestClient::new("http://host/", "k", "items", Client::new()).eq("id", "1");
        assert_eq!(table.build_url().unwrap(), "http://host/rest/v1/items?id=eq.1");

        let rpc = PostgrestClient::rpc("http://host", "k", "f", Value::Null, Client::new());
        assert_eq!(rpc.build_url().unwrap(), "http://host/rest/v1/rpc/f");
    }
}
