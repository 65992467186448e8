//! Run handles and the bounded wait for a run to finish.

use std::sync::Arc;
use std::time::Duration;

use inf_protocol::RunResult;
use tokio::time::Instant;

use crate::api::ControlPlane;
use crate::error::{Result, SdkError};
use crate::registrar::MachineRegistrar;

/// Bounds of [`RunHandle::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Give up after this long (default 60s).
    pub max_wait: Duration,
    /// Delay between status fetches (default 500ms).
    pub interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(60),
            interval: Duration::from_millis(500),
        }
    }
}

/// A created run.
#[derive(Clone)]
pub struct RunHandle {
    pub id: String,
    cluster_id: String,
    api: ControlPlane,
}

impl RunHandle {
    pub(crate) fn new(id: String, cluster_id: String, api: ControlPlane) -> Self {
        Self {
            id,
            cluster_id,
            api,
        }
    }

    /// Fetch the run's current status document.
    pub async fn fetch(&self) -> Result<RunResult> {
        self.api.get_run(&self.cluster_id, &self.id).await
    }

    /// Sample the run's status until it leaves pending/running/paused.
    ///
    /// Fails with [`SdkError::PollTimeout`] once `max_wait` has elapsed; the
    /// run itself is unaffected and may be polled again.
    pub async fn poll(&self, opts: PollOptions) -> Result<RunResult> {
        let start = Instant::now();
        let deadline = start + opts.max_wait;

        loop {
            let run = self.fetch().await?;
            if run.is_terminal() {
                return Ok(run);
            }
            tracing::debug!(run_id = %self.id, status = %run.status, "run still in flight");

            if Instant::now() + opts.interval > deadline {
                return Err(SdkError::PollTimeout {
                    run_id: self.id.clone(),
                    waited: start.elapsed(),
                });
            }
            tokio::time::sleep(opts.interval).await;
        }
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("id", &self.id)
            .field("cluster_id", &self.cluster_id)
            .finish()
    }
}

/// Resolve the cluster, then `POST` the run.
pub(crate) async fn create_run(
    api: &ControlPlane,
    registrar: &Arc<MachineRegistrar>,
    input: &inf_protocol::CreateRunInput,
) -> Result<RunHandle> {
    let cluster_id = registrar
        .cluster_id()
        .await
        .map_err(|e| SdkError::RunCreation(e.to_string()))?;
    let created = api
        .create_run(&cluster_id, input)
        .await
        .map_err(|e| SdkError::RunCreation(e.to_string()))?;

    tracing::info!(run_id = %created.id, cluster_id = %cluster_id, "run created");
    Ok(RunHandle::new(created.id, cluster_id, api.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::{ApiRequest, ApiResponse, Transport};
    use parking_lot::Mutex;
    use serde_json::json;

    /// Replays run statuses; the last one repeats forever.
    struct Statuses(Mutex<Vec<&'static str>>);

    #[async_trait::async_trait]
    impl Transport for Statuses {
        async fn send(&self, _req: ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
            let mut q = self.0.lock();
            let status = if q.len() > 1 { q.remove(0) } else { q[0] };
            let body = json!({ "id": "run_1", "status": status, "result": { "ok": status == "done" } });
            Ok(ApiResponse::new(200, body.to_string()))
        }
    }

    fn handle(statuses: Vec<&'static str>) -> RunHandle {
        let api = ControlPlane::new(Arc::new(Statuses(Mutex::new(statuses))));
        RunHandle::new("run_1".into(), "clu_1".into(), api)
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_terminal_document() {
        let run = handle(vec!["pending", "running", "done"]);
        let started = Instant::now();
        let result = run.poll(PollOptions::default()).await.unwrap();
        assert_eq!(result.status, "done");
        assert_eq!(result.result, Some(json!({ "ok": true })));
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn paused_is_not_terminal() {
        let run = handle(vec!["paused", "failure"]);
        let result = run.poll(PollOptions::default()).await.unwrap();
        assert_eq!(result.status, "failure");
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_never_terminal() {
        let run = handle(vec!["pending", "running"]);
        let opts = PollOptions {
            max_wait: Duration::from_secs(3),
            interval: Duration::from_millis(500),
        };
        let err = run.poll(opts).await.unwrap_err();
        assert!(err.is_poll_timeout());
        match err {
            SdkError::PollTimeout { run_id, waited } => {
                assert_eq!(run_id, "run_1");
                assert!(waited <= Duration::from_secs(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
