//! Builder pattern for constructing an [`Inferable`] client.

use std::sync::Arc;
use std::time::Duration;

use crate::agent::PollingAgent;
use crate::api::ControlPlane;
use crate::client::Inferable;
use crate::config::ClientConfig;
use crate::error::{Result, SdkError};
use crate::machine::machine_id;
use crate::registrar::MachineRegistrar;
use crate::transport::{HttpTransport, Transport};

/// Fluent builder for [`Inferable`].
///
/// # Example
///
/// ```rust,no_run
/// # use inf_sdk::InferableBuilder;
/// let client = InferableBuilder::new()
///     .api_secret("sk_live_...")
///     .machine_seed("worker-1")
///     .timeout(std::time::Duration::from_secs(20))
///     .build()
///     .unwrap();
/// ```
pub struct InferableBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl InferableBuilder {
    pub fn new() -> Self {
        Self::from_config(ClientConfig::default())
    }

    /// Start from a loaded configuration, e.g. [`ClientConfig::from_env`].
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    // ── Required ─────────────────────────────────────────────────────

    pub fn api_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.api_secret = secret.into();
        self
    }

    // ── Identity ─────────────────────────────────────────────────────

    /// Control plane base URL (default `https://api.inferable.ai`).
    pub fn api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.api_endpoint = endpoint.into();
        self
    }

    /// Use this machine id instead of deriving one.
    pub fn machine_id(mut self, id: impl Into<String>) -> Self {
        self.config.machine_id = Some(id.into());
        self
    }

    pub fn machine_seed(mut self, seed: impl Into<String>) -> Self {
        self.config.machine_seed = Some(seed.into());
        self
    }

    /// Skip cluster resolution by registration.
    pub fn cluster_id(mut self, id: impl Into<String>) -> Self {
        self.config.cluster_id = Some(id.into());
        self
    }

    // ── Behavior ─────────────────────────────────────────────────────

    /// Per-request timeout (default 30s).
    pub fn timeout(mut self, d: Duration) -> Self {
        self.config.timeout_ms = d.as_millis() as u64;
        self
    }

    /// Transport retries of transient failures (default 2).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    /// Jobs fetched per poll cycle (default 10).
    pub fn poll_limit(mut self, n: u32) -> Self {
        self.config.poll_limit = n;
        self
    }

    /// Consecutive failed poll cycles tolerated before the agent stops
    /// (default 50).
    pub fn max_consecutive_poll_failures(mut self, n: u32) -> Self {
        self.config.max_consecutive_poll_failures = n;
        self
    }

    /// Replace the HTTP transport, e.g. with an in-memory one in tests.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Inferable> {
        let cfg = self.config;
        if cfg.api_secret.trim().is_empty() {
            return Err(SdkError::Config("api_secret is required".into()));
        }
        if cfg.api_endpoint.trim().is_empty() {
            return Err(SdkError::Config("api_endpoint is required".into()));
        }

        let machine_id = machine_id(&cfg);
        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&cfg, machine_id.clone())?),
        };
        let api = ControlPlane::new(transport);
        let registrar = Arc::new(MachineRegistrar::new(api.clone(), cfg.cluster_id.clone()));
        let agent = PollingAgent::new(
            api.clone(),
            registrar.clone(),
            machine_id.clone(),
            cfg.poll_limit,
            cfg.max_consecutive_poll_failures,
        );

        tracing::debug!(machine_id = %machine_id, endpoint = %cfg.api_endpoint, "client built");
        Ok(Inferable {
            api,
            registrar,
            agent,
            machine_id,
        })
    }
}

impl Default for InferableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
