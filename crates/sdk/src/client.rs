//! The client object: owns the machine identity, the cluster cache, the
//! polling agent and the run facade.

use std::sync::Arc;

use inf_protocol::{CreateRunInput, RunResult};

use crate::agent::PollingAgent;
use crate::api::ControlPlane;
use crate::error::{Result, SdkError};
use crate::registrar::MachineRegistrar;
use crate::runs::RunHandle;

/// A configured connection to the control plane.
///
/// Create via [`InferableBuilder`](crate::builder::InferableBuilder).
#[derive(Debug)]
pub struct Inferable {
    pub(crate) api: ControlPlane,
    pub(crate) registrar: Arc<MachineRegistrar>,
    pub(crate) agent: PollingAgent,
    pub(crate) machine_id: String,
}

impl Inferable {
    /// Start a new builder.
    pub fn builder() -> crate::builder::InferableBuilder {
        crate::builder::InferableBuilder::new()
    }

    /// The polling agent that owns this machine's tools.
    pub fn tools(&self) -> &PollingAgent {
        &self.agent
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    /// The cluster this machine belongs to, registering on first use.
    pub async fn cluster_id(&self) -> Result<String> {
        self.registrar.cluster_id().await
    }

    /// Create a run. The returned handle can [`poll`](RunHandle::poll) it
    /// to completion.
    pub async fn create_run(&self, input: &CreateRunInput) -> Result<RunHandle> {
        crate::runs::create_run(&self.api, &self.registrar, input).await
    }

    /// Fetch one run's status document.
    pub async fn get_run(&self, run_id: &str) -> Result<RunResult> {
        let cluster_id = self.registrar.cluster_id().await?;
        self.api.get_run(&cluster_id, run_id).await
    }

    /// Check that the control plane is up.
    pub async fn live(&self) -> Result<()> {
        let resp = self.api.live().await?;
        if resp.status != "ok" {
            return Err(SdkError::Transport(crate::error::TransportError::Decode(
                format!("control plane reported status '{}'", resp.status),
            )));
        }
        Ok(())
    }
}
