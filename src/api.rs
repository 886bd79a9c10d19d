//! Compute API transport.
//!
//! This module provides:
//! - `Endpoint`, a request path relative to the compute URL
//! - `ComputeApi` trait for the handful of JSON requests the schedule needs
//! - `HttpCompute`, the blocking reqwest implementation used by the binary

use std::fmt;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use url::{Position, Url};

use crate::config::ApiConfig;
use crate::error::ScheduleError;

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Path segments and query pairs appended to the compute URL.
/// Segments and values are stored raw and encoded when resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(segments: &[&str]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Append this endpoint to `base`, keeping any path the base already has
    /// (e.g. `/v2/<tenant>`).
    pub fn resolve(&self, base: &Url) -> Result<Url, ScheduleError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ScheduleError::Transport {
                status: None,
                detail: format!("compute URL cannot carry a path: {}", base),
            })?
            .pop_if_empty()
            .extend(&self.segments);

        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// Encoded path and query, e.g. `/servers/42/backup_schedule`
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = Url::parse("http://compute.invalid/").map_err(|_| fmt::Error)?;
        let url = self.resolve(&root).map_err(|_| fmt::Error)?;
        f.write_str(&url[Position::BeforePath..])
    }
}

/// Trait for talking to the compute API.
pub trait ComputeApi {
    /// GET a JSON document
    fn get(&self, endpoint: &Endpoint) -> Result<Value, ScheduleError>;

    /// POST a JSON body; any response body is discarded
    fn post(&self, endpoint: &Endpoint, body: &Value) -> Result<(), ScheduleError>;

    /// DELETE a resource; any response body is discarded
    fn delete(&self, endpoint: &Endpoint) -> Result<(), ScheduleError>;
}

/// Blocking HTTP client for the compute API
#[derive(Debug)]
pub struct HttpCompute {
    client: Client,
    base_url: Url,
}

impl HttpCompute {
    pub fn new(config: &ApiConfig) -> Result<Self, ScheduleError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(ref token) = config.auth_token {
            let mut value = HeaderValue::from_str(token).map_err(|_| ScheduleError::Transport {
                status: None,
                detail: "auth token contains characters not allowed in a header".into(),
            })?;
            value.set_sensitive(true);
            headers.insert(AUTH_TOKEN_HEADER, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| ScheduleError::Transport {
                status: None,
                detail: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.compute_url.clone(),
        })
    }

    fn send(&self, method: Method, endpoint: &Endpoint, body: Option<&Value>) -> Result<Response, ScheduleError> {
        let url = endpoint.resolve(&self.base_url)?;
        let mut req = self.client.request(method.clone(), url.clone());
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().map_err(|e| ScheduleError::Transport {
            status: None,
            detail: e.to_string(),
        })?;

        let status = resp.status();
        tracing::debug!("{} {} -> {}", method, url, status);

        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(ScheduleError::NotFound(
                fault_message(&text).unwrap_or_else(|| format!("{} {}", method, endpoint)),
            ));
        }

        Err(ScheduleError::Transport {
            status: Some(status.as_u16()),
            detail: fault_message(&text).unwrap_or_else(|| describe_body(status, &text)),
        })
    }
}

impl ComputeApi for HttpCompute {
    fn get(&self, endpoint: &Endpoint) -> Result<Value, ScheduleError> {
        let resp = self.send(Method::GET, endpoint, None)?;
        resp.json::<Value>()
            .map_err(|e| ScheduleError::Decode(format!("GET {}: {}", endpoint, e)))
    }

    fn post(&self, endpoint: &Endpoint, body: &Value) -> Result<(), ScheduleError> {
        self.send(Method::POST, endpoint, Some(body))?;
        Ok(())
    }

    fn delete(&self, endpoint: &Endpoint) -> Result<(), ScheduleError> {
        self.send(Method::DELETE, endpoint, None)?;
        Ok(())
    }
}

/// Pull the message out of a fault body such as
/// `{"itemNotFound": {"message": "...", "code": 404}}`.
fn fault_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let table = value.as_object()?;
    table.values().find_map(|fault| {
        fault
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

fn describe_body(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        body.to_string()
    }
}
