//! HTTP request execution.

use crate::RateLimitGate;
use crate::paginate::{PageSource, PaginatedFetcher};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tessera_types::{ApiError, ClientConfig, Page, Paginated, Result};
use tracing::trace;

/// Request parameters: the query string for GET, the JSON body for POST.
pub type Params = BTreeMap<String, String>;

/// A remote resource: path, method, and where its items live in the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    path: String,
    method: Method,
    items_key: Option<String>,
}

impl Endpoint {
    /// Creates a GET endpoint.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::GET,
            items_key: None,
        }
    }

    /// Creates a POST endpoint. Parameters are sent as a JSON object.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::POST,
            items_key: None,
        }
    }

    /// Names the response field holding the page's items.
    #[must_use]
    pub fn with_items_key(mut self, key: impl Into<String>) -> Self {
        self.items_key = Some(key.into());
        self
    }

    /// Returns the path relative to the base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the items field, if one was named.
    #[must_use]
    pub fn items_key(&self) -> Option<&str> {
        self.items_key.as_deref()
    }
}

/// Authenticated client issuing one rate-limited request per call.
///
/// The client never retries. Every failure comes back as an [`ApiError`]
/// tagged with where it happened.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    gate: RateLimitGate,
}

impl ApiClient {
    /// Creates a client that dispatches through the given gate.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig, gate: RateLimitGate) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder()
            // Requests are serialized by the gate, a couple of idle connections suffice
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            // The per-call deadline is enforced around the whole exchange in `request`
            .connect_timeout(Duration::from_secs(10).min(config.timeout))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            config,
            gate,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the rate gate this client dispatches through.
    #[must_use]
    pub const fn gate(&self) -> &RateLimitGate {
        &self.gate
    }

    /// Performs exactly one request and returns the parsed response body.
    ///
    /// Waits on the rate gate first, then enforces the configured timeout over
    /// sending the request and reading the body. An empty 2xx body yields
    /// `Value::Null`.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if the deadline elapses, a network error if no
    /// response was obtained, and an HTTP error for non-2xx statuses.
    pub async fn request(&self, method: Method, path: &str, params: &Params) -> Result<Value> {
        self.gate.acquire().await;

        let url = self.url(path);
        trace!(%method, %url, "dispatching request");

        let timeout = self.config.timeout;
        tokio::time::timeout(timeout, self.send(method, &url, params))
            .await
            .unwrap_or_else(|_| Err(ApiError::timeout(timeout)))
    }

    /// Performs one GET request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get(&self, path: &str, params: &Params) -> Result<Value> {
        self.request(Method::GET, path, params).await
    }

    /// Performs one POST request with `params` as the JSON body.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post(&self, path: &str, params: &Params) -> Result<Value> {
        self.request(Method::POST, path, params).await
    }

    /// Returns a paginated fetcher over this client using the configured page cap.
    #[must_use]
    pub fn paginator(&self) -> PaginatedFetcher<Self> {
        PaginatedFetcher::with_max_pages(self.clone(), self.config.max_pages)
    }

    /// Fetches every page of an endpoint, up to `max_pages`.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing page; no partial result is kept.
    pub async fn fetch_all_pages(
        &self,
        endpoint: &Endpoint,
        params: &Params,
        max_pages: usize,
    ) -> Result<Paginated<Value>> {
        PaginatedFetcher::with_max_pages(self.clone(), max_pages)
            .fetch_all(endpoint, params)
            .await
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send(&self, method: Method, url: &str, params: &Params) -> Result<Value> {
        let mut builder = self.client.request(method.clone(), url);
        if !self.config.api_key.is_empty() {
            builder = builder.header(self.config.api_key_header.as_str(), self.config.api_key.as_str());
        }
        builder = if method == Method::GET {
            builder.query(params)
        } else {
            builder.json(params)
        };

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !status.is_success() {
            return Err(http_error(status, text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            ApiError::decode(
                status.as_u16(),
                format!("Invalid JSON response: {e}"),
                Some(text),
            )
        })
    }

    fn transport_error(&self, error: &reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::timeout(self.config.timeout)
        } else if error.is_builder() {
            ApiError::invalid_request(error_chain(error))
        } else {
            ApiError::network(error_chain(error))
        }
    }
}

#[async_trait]
impl PageSource for ApiClient {
    type Item = Value;

    async fn fetch_page(&self, endpoint: &Endpoint, params: &Params) -> Result<Page<Value>> {
        let body = self
            .request(endpoint.method().clone(), endpoint.path(), params)
            .await?;
        Ok(split_page(body, endpoint.items_key(), &self.config.token_field))
    }

    fn token_param(&self) -> &str {
        &self.config.token_param
    }
}

/// Builds an HTTP error, preferring a message from a JSON error body, then the
/// raw text, then the status reason.
fn http_error(status: StatusCode, text: String) -> ApiError {
    let status_text = status.canonical_reason().unwrap_or_default().to_string();
    let trimmed = text.trim();

    let message = json_error_message(trimmed)
        .or_else(|| (!trimmed.is_empty()).then(|| trimmed.to_string()))
        .or_else(|| (!status_text.is_empty()).then(|| status_text.clone()))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    let body = (!text.is_empty()).then_some(text);
    ApiError::http(status.as_u16(), status_text, body, message)
}

fn json_error_message(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    ["message", "error_description", "detail", "error"]
        .iter()
        .find_map(|key| match value.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned),
            _ => None,
        })
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Splits a response body into items and continuation token.
///
/// Items are taken from `items_key` when given; otherwise from the body itself
/// if it is an array, else from the first array-valued field in key order,
/// else the remaining object is a single item.
fn split_page(body: Value, items_key: Option<&str>, token_field: &str) -> Page<Value> {
    match body {
        Value::Object(mut map) => {
            let continuation = match map.remove(token_field) {
                Some(Value::String(token)) => Some(token),
                Some(Value::Number(token)) => Some(token.to_string()),
                _ => None,
            };

            let key = items_key.map(str::to_owned).or_else(|| {
                map.iter()
                    .find_map(|(k, v)| v.is_array().then(|| k.clone()))
            });

            let items = match key {
                Some(key) => match map.remove(&key) {
                    Some(Value::Array(items)) => items,
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => vec![other],
                },
                None if map.is_empty() => Vec::new(),
                None => vec![Value::Object(map)],
            };

            Page::new(items, continuation)
        }
        Value::Array(items) => Page::last(items),
        Value::Null => Page::last(Vec::new()),
        other => Page::last(vec![other]),
    }
}
