//! Machine registration and the cached cluster id.

use inf_protocol::MachineRegistration;
use tokio::sync::Mutex;

use crate::api::ControlPlane;
use crate::error::{Result, SdkError};
use crate::registry::ToolRegistry;

/// Registers this machine with the control plane and remembers the
/// cluster it landed in.
///
/// The cache lock is held across the registration round trip, so
/// concurrent first use resolves the cluster once.
#[derive(Debug)]
pub struct MachineRegistrar {
    api: ControlPlane,
    cluster_id: Mutex<Option<String>>,
}

impl MachineRegistrar {
    /// `cluster_id` pre-seeds the cache.
    pub fn new(api: ControlPlane, cluster_id: Option<String>) -> Self {
        Self {
            api,
            cluster_id: Mutex::new(cluster_id),
        }
    }

    /// Register the machine, advertising `tools` (or nothing when `None`),
    /// and refresh the cached cluster id.
    pub async fn register_machine(&self, tools: Option<&ToolRegistry>) -> Result<String> {
        let mut cached = self.cluster_id.lock().await;
        let cluster_id = self.register(tools).await?;
        *cached = Some(cluster_id.clone());
        Ok(cluster_id)
    }

    /// The cluster id, registering with an empty declaration on first use.
    pub async fn cluster_id(&self) -> Result<String> {
        let mut cached = self.cluster_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }
        let cluster_id = self.register(None).await?;
        *cached = Some(cluster_id.clone());
        Ok(cluster_id)
    }

    /// The cached cluster id, if resolved.
    pub async fn cached(&self) -> Option<String> {
        self.cluster_id.lock().await.clone()
    }

    async fn register(&self, tools: Option<&ToolRegistry>) -> Result<String> {
        let registration = match tools {
            None => MachineRegistration::default(),
            Some(reg) if reg.is_empty() => {
                return Err(SdkError::Registration("no tools registered".into()))
            }
            Some(reg) => MachineRegistration {
                tools: Some(reg.definitions().map_err(|e| {
                    SdkError::Registration(format!("failed to encode tool snapshot: {e}"))
                })?),
            },
        };

        let resp = self
            .api
            .register_machine(&registration)
            .await
            .map_err(|e| SdkError::Registration(e.to_string()))?;

        tracing::info!(
            cluster_id = %resp.cluster_id,
            tools = tools.map(ToolRegistry::len).unwrap_or(0),
            "machine registered"
        );
        Ok(resp.cluster_id)
    }
}
