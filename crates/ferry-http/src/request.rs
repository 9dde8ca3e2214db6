//! Request/response types and the client that sends them

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{HttpError, Result};

/// Environment variable holding the user agent for [`HttpClient::from_env`]
pub const USER_AGENT_ENV: &str = "FERRY_HTTP_USER_AGENT";

/// An outgoing request
#[derive(Debug, Clone)]
pub struct WebRequest {
    pub method: Method,
    pub uri: String,
    /// Form-encoded body; empty by default
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl Default for WebRequest {
    fn default() -> Self {
        Self {
            method: Method::GET,
            uri: String::new(),
            body: String::new(),
            headers: HashMap::new(),
        }
    }
}

impl WebRequest {
    /// GET request for `uri`
    pub fn get(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Request with an explicit method
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Form-encoded body; also sets the matching content type unless one is present
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        if !self.headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
            self.headers.insert(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            );
        }
        self.body = body.into();
        self
    }

    fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_err = |reason: String| HttpError::Header {
                name: name.clone(),
                reason,
            };
            let key = HeaderName::from_bytes(name.as_bytes()).map_err(|e| header_err(e.to_string()))?;
            let val = HeaderValue::from_str(value).map_err(|e| header_err(e.to_string()))?;
            map.insert(key, val);
        }
        Ok(map)
    }
}

/// Response body, JSON when it parses as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// Parse `raw`, keeping it as text when it is not JSON
    ///
    /// Returns `None` for an empty body.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        Some(match serde_json::from_str(raw) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(raw.to_string()),
        })
    }
}

/// A received response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebResponse {
    pub status_code: u16,
    pub status_message: String,
    pub headers: HashMap<String, String>,
    pub body: Option<ResponseBody>,
}

impl WebResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Sends [`WebRequest`]s
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    ///
    /// # Errors
    /// Returns an error if the underlying client cannot be built.
    pub fn new(user_agent: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Create a client using the user agent from [`USER_AGENT_ENV`], if set
    ///
    /// # Errors
    /// Returns an error if the underlying client cannot be built.
    pub fn from_env() -> Result<Self> {
        let agent = std::env::var(USER_AGENT_ENV).ok();
        Self::new(agent.as_deref())
    }

    /// Send `request` and collect the full response
    ///
    /// # Errors
    /// Returns an error if the URI or headers are invalid or the request
    /// fails in transport. Error statuses are returned as responses.
    pub async fn begin_request(&self, request: WebRequest) -> Result<WebResponse> {
        debug!("[{}]{}", request.method, request.uri);

        let url = Url::parse(&request.uri)?;
        let headers = request.header_map()?;

        let response = self
            .client
            .request(request.method, url)
            .headers(headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let text = response.text().await?;

        Ok(WebResponse {
            status_code: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: ResponseBody::parse(&text),
        })
    }
}
