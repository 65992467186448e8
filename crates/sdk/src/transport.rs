//! HTTP transport to the control plane.
//!
//! [`Transport`] is the seam between the SDK and the network: the control
//! plane API builds [`ApiRequest`]s and reads [`ApiResponse`]s, and
//! [`HttpTransport`] carries them over `reqwest` with automatic retry +
//! exponential back-off on transient (5xx / timeout / connection) failures.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::{from_reqwest, SdkError, TransportError};

/// One request to the control plane, relative to the API endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute path, e.g. `/clusters/c1/jobs`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// `METHOD /path`, used as the endpoint label in logs.
    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// A successful (2xx) control-plane response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Decode the body as `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_str(&self.body).map_err(|e| {
            TransportError::Decode(format!("{e}: {}", truncate(&self.body, 256)))
        })
    }
}

/// Sends control-plane requests.
///
/// Implementations return `Ok` only for 2xx responses; any other status is
/// a [`TransportError::Status`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, req: ApiRequest) -> Result<ApiResponse, TransportError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// reqwest transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `reqwest`-backed [`Transport`].
///
/// Created once per client. The underlying `reqwest::Client` maintains a
/// connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
    api_secret: String,
    machine_id: String,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(cfg: &ClientConfig, machine_id: impl Into<String>) -> Result<Self, SdkError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| SdkError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: cfg.api_endpoint.trim_end_matches('/').to_owned(),
            api_secret: cfg.api_secret.clone(),
            machine_id: machine_id.into(),
            max_retries: cfg.max_retries,
        })
    }

    // ── request helpers ──────────────────────────────────────────────

    /// Attach the credential and machine identity headers.
    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.bearer_auth(&self.api_secret)
            .header(inf_protocol::HEADER_MACHINE_ID, &self.machine_id)
            .header(inf_protocol::HEADER_SDK_VERSION, env!("CARGO_PKG_VERSION"))
            .header(inf_protocol::HEADER_SDK_LANGUAGE, inf_protocol::SDK_LANGUAGE)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build(&self, req: &ApiRequest) -> RequestBuilder {
        let mut rb = self.http.request(req.method.clone(), self.url(&req.path));
        if !req.query.is_empty() {
            rb = rb.query(&req.query);
        }
        if let Some(body) = &req.body {
            rb = rb.json(body);
        }
        self.decorate(rb)
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Send `req`, retrying 5xx responses, timeouts and connection errors.
    /// 4xx responses are permanent and returned immediately.
    async fn execute_with_retry(&self, req: &ApiRequest) -> Result<Response, TransportError> {
        let endpoint = req.endpoint();
        let mut last_err: Option<TransportError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_delay(attempt)).await;
            }

            let start = Instant::now();
            let result = self.build(req).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    tracing::debug!(
                        endpoint = %endpoint,
                        status = status.as_u16(),
                        duration_ms,
                        attempt,
                        "control plane call"
                    );

                    if status.is_success() {
                        return Ok(resp);
                    }

                    let body = resp.text().await.unwrap_or_default();
                    let err = TransportError::Status {
                        status: status.as_u16(),
                        body: truncate(&body, 512).to_owned(),
                    };
                    if status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    tracing::debug!(
                        endpoint = %endpoint,
                        duration_ms,
                        attempt,
                        error = %e,
                        "control plane call failed"
                    );
                    last_err = Some(from_reqwest(e));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| TransportError::Network(format!("{endpoint}: all retries exhausted"))))
    }
}

/// Delay before retry number `attempt` (1-based): 100ms doubled per retry.
fn retry_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(100u64.saturating_mul(factor))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, req: ApiRequest) -> Result<ApiResponse, TransportError> {
        let resp = self.execute_with_retry(&req).await?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_owned()))
            })
            .collect();
        let body = resp.text().await.map_err(from_reqwest)?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
