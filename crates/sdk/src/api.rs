//! Typed control-plane endpoints over a [`Transport`].

use std::sync::Arc;
use std::time::Duration;

use inf_protocol::{
    CallMessage, CallResult, CreateRunInput, CreateRunResponse, LiveResponse,
    MachineRegistration, RegisterMachineResponse, RunResult, HEADER_RETRY_AFTER,
};

use crate::backoff::parse_retry_after;
use crate::error::Result;
use crate::transport::{ApiRequest, Transport};

/// One page of pending jobs plus the server's pacing hint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobBatch {
    pub messages: Vec<CallMessage>,
    pub retry_after: Option<Duration>,
}

#[derive(Clone)]
pub struct ControlPlane {
    transport: Arc<dyn Transport>,
}

impl ControlPlane {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// `POST /machines`
    pub async fn register_machine(
        &self,
        registration: &MachineRegistration,
    ) -> Result<RegisterMachineResponse> {
        let req = ApiRequest::post("/machines", serde_json::to_value(registration)?);
        Ok(self.transport.send(req).await?.json()?)
    }

    /// `GET /clusters/{cluster}/jobs`, acknowledging what it returns.
    pub async fn list_jobs(
        &self,
        cluster_id: &str,
        tools: &[String],
        limit: u32,
    ) -> Result<JobBatch> {
        let req = ApiRequest::get(format!("/clusters/{cluster_id}/jobs"))
            .query("acknowledge", "true")
            .query("tools", tools.join(","))
            .query("status", "pending")
            .query("limit", limit.to_string());
        let resp = self.transport.send(req).await?;

        let retry_after = resp.header(HEADER_RETRY_AFTER).and_then(parse_retry_after);
        let messages = if resp.body.trim().is_empty() {
            Vec::new()
        } else {
            resp.json()?
        };
        Ok(JobBatch {
            messages,
            retry_after,
        })
    }

    /// `POST /clusters/{cluster}/jobs/{job}/result`
    pub async fn create_job_result(
        &self,
        cluster_id: &str,
        job_id: &str,
        result: &CallResult,
    ) -> Result<()> {
        let req = ApiRequest::post(
            format!("/clusters/{cluster_id}/jobs/{job_id}/result"),
            serde_json::to_value(result)?,
        );
        self.transport.send(req).await?;
        Ok(())
    }

    /// `POST /clusters/{cluster}/runs`
    pub async fn create_run(
        &self,
        cluster_id: &str,
        input: &CreateRunInput,
    ) -> Result<CreateRunResponse> {
        let req = ApiRequest::post(
            format!("/clusters/{cluster_id}/runs"),
            serde_json::to_value(input)?,
        );
        Ok(self.transport.send(req).await?.json()?)
    }

    /// `GET /clusters/{cluster}/runs/{run}`
    pub async fn get_run(&self, cluster_id: &str, run_id: &str) -> Result<RunResult> {
        let req = ApiRequest::get(format!("/clusters/{cluster_id}/runs/{run_id}"));
        Ok(self.transport.send(req).await?.json()?)
    }

    /// `GET /live`
    pub async fn live(&self) -> Result<LiveResponse> {
        Ok(self.transport.send(ApiRequest::get("/live")).await?.json()?)
    }
}

impl std::fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlane").finish_non_exhaustive()
    }
}
