use serde::{Deserialize, Serialize};

/// Hosted control plane used when no endpoint is configured.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.inferable.ai";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "d_endpoint")]
    pub api_endpoint: String,
    #[serde(default)]
    pub api_secret: String,
    /// Explicit machine id. When unset one is derived from the other fields.
    #[serde(default)]
    pub machine_id: Option<String>,
    /// Extra input to the machine id derivation, for several machines that
    /// share a secret.
    #[serde(default)]
    pub machine_seed: Option<String>,
    /// Pre-resolved cluster. When unset the first registration resolves it.
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default = "d_30000")]
    pub timeout_ms: u64,
    /// Transport-level retries of transient (5xx / network) failures.
    #[serde(default = "d_2")]
    pub max_retries: u32,
    /// Jobs requested per poll cycle.
    #[serde(default = "d_poll_limit")]
    pub poll_limit: u32,
    /// The polling agent stops itself once this many consecutive cycles
    /// have failed and one more fails.
    #[serde(default = "d_50")]
    pub max_consecutive_poll_failures: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_endpoint: d_endpoint(),
            api_secret: String::new(),
            machine_id: None,
            machine_seed: None,
            cluster_id: None,
            timeout_ms: 30_000,
            max_retries: 2,
            poll_limit: inf_protocol::DEFAULT_POLL_LIMIT,
            max_consecutive_poll_failures: 50,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with the `INFERABLE_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Overlay `INFERABLE_API_SECRET`, `INFERABLE_API_ENDPOINT`,
    /// `INFERABLE_MACHINE_ID` and `INFERABLE_CLUSTER_ID` when set and non-empty.
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(secret) = var("INFERABLE_API_SECRET") {
            self.api_secret = secret;
        }
        if let Some(endpoint) = var("INFERABLE_API_ENDPOINT") {
            self.api_endpoint = endpoint;
        }
        if let Some(id) = var("INFERABLE_MACHINE_ID") {
            self.machine_id = Some(id);
        }
        if let Some(id) = var("INFERABLE_CLUSTER_ID") {
            self.cluster_id = Some(id);
        }
        self
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_endpoint() -> String {
    DEFAULT_API_ENDPOINT.into()
}
fn d_30000() -> u64 {
    30_000
}
fn d_2() -> u32 {
    2
}
fn d_poll_limit() -> u32 {
    inf_protocol::DEFAULT_POLL_LIMIT
}
fn d_50() -> u32 {
    50
}
