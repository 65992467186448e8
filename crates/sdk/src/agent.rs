//! Polling agent: registers the machine's tools, then runs the background
//! loop that fetches pending jobs, executes them and reports results.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use inf_protocol::ToolReference;

use crate::api::ControlPlane;
use crate::backoff::PollBackoff;
use crate::error::{Result, SdkError};
use crate::invocation::handle_message;
use crate::registrar::MachineRegistrar;
use crate::registry::ToolRegistry;
use crate::tool::Tool;

enum Phase {
    Stopped,
    /// Initial registration in flight.
    Starting { cancel: CancellationToken, epoch: u64 },
    Running { cancel: CancellationToken, epoch: u64 },
}

struct AgentState {
    tools: Arc<ToolRegistry>,
    /// Set once polling has started; the registry is never mutated again.
    frozen: bool,
    phase: Phase,
    epoch: u64,
    /// Most recently spawned poll loop. It may still be finishing its last
    /// cycle after a stop.
    task: Option<JoinHandle<()>>,
}

struct Shared {
    api: ControlPlane,
    registrar: Arc<MachineRegistrar>,
    machine_id: String,
    poll_limit: u32,
    max_failures: u32,
    state: Mutex<AgentState>,
}

impl Shared {
    /// Return to `Stopped` if the phase still belongs to `epoch`.
    fn release(&self, epoch: u64) {
        let mut st = self.state.lock();
        let current = match &st.phase {
            Phase::Starting { epoch: e, .. } | Phase::Running { epoch: e, .. } => Some(*e),
            Phase::Stopped => None,
        };
        if current == Some(epoch) {
            if let Phase::Starting { cancel, .. } | Phase::Running { cancel, .. } = &st.phase {
                cancel.cancel();
            }
            st.phase = Phase::Stopped;
        }
    }
}

/// Owns the tool registry and the background poll loop.
///
/// Cloning yields another handle to the same agent.
#[derive(Clone)]
pub struct PollingAgent {
    shared: Arc<Shared>,
}

impl PollingAgent {
    pub(crate) fn new(
        api: ControlPlane,
        registrar: Arc<MachineRegistrar>,
        machine_id: String,
        poll_limit: u32,
        max_failures: u32,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                registrar,
                machine_id,
                poll_limit,
                max_failures,
                state: Mutex::new(AgentState {
                    tools: Arc::new(ToolRegistry::new()),
                    frozen: false,
                    phase: Phase::Stopped,
                    epoch: 0,
                    task: None,
                }),
            }),
        }
    }

    /// Register a tool. Only allowed before polling starts.
    pub fn register(&self, tool: Tool) -> Result<ToolReference> {
        let mut st = self.shared.state.lock();
        if st.frozen || !matches!(st.phase, Phase::Stopped) {
            return Err(SdkError::FrozenRegistry(tool.name));
        }
        Arc::make_mut(&mut st.tools).register(tool)
    }

    /// Snapshot of the registered tools.
    pub fn registry(&self) -> Arc<ToolRegistry> {
        self.shared.state.lock().tools.clone()
    }

    /// Whether the background loop is running.
    pub fn is_polling(&self) -> bool {
        matches!(self.shared.state.lock().phase, Phase::Running { .. })
    }

    /// Register the machine and spawn the poll loop.
    ///
    /// Returns once registration has succeeded; a registration failure is
    /// returned here and nothing is spawned. May be called again after
    /// [`stop`](Self::stop) or after the loop stopped itself, in which case
    /// it first waits for the previous loop to finish its in-flight cycle.
    pub async fn start(&self) -> Result<()> {
        let (tools, cancel, epoch, previous) = {
            let mut st = self.shared.state.lock();
            if !matches!(st.phase, Phase::Stopped) {
                return Err(SdkError::AlreadyStarted);
            }
            st.epoch += 1;
            let cancel = CancellationToken::new();
            let epoch = st.epoch;
            st.phase = Phase::Starting {
                cancel: cancel.clone(),
                epoch,
            };
            (st.tools.clone(), cancel, epoch, st.task.take())
        };

        if let Some(previous) = previous {
            if let Err(e) = previous.await {
                tracing::warn!(error = %e, "previous poll loop ended abnormally");
            }
        }

        if let Err(e) = self.shared.registrar.register_machine(Some(&tools)).await {
            self.shared.release(epoch);
            return Err(e);
        }

        {
            let mut st = self.shared.state.lock();
            match &st.phase {
                Phase::Starting { epoch: e, .. } if *e == epoch => {}
                // Stopped while registering.
                _ => return Ok(()),
            }
            st.frozen = true;
            st.phase = Phase::Running {
                cancel: cancel.clone(),
                epoch,
            };
            tracing::info!(
                machine_id = %self.shared.machine_id,
                tools = tools.len(),
                "started and polling for messages"
            );
            st.task = Some(tokio::spawn(run_loop(
                self.shared.clone(),
                tools,
                cancel,
                epoch,
            )));
        }
        Ok(())
    }

    /// Cancel the poll loop. Idempotent; does not wait for the loop to
    /// observe the cancellation.
    pub fn stop(&self) {
        let mut st = self.shared.state.lock();
        if let Phase::Starting { cancel, .. } | Phase::Running { cancel, .. } = &st.phase {
            cancel.cancel();
            st.phase = Phase::Stopped;
            tracing::info!(machine_id = %self.shared.machine_id, "stopped polling for messages");
        }
    }
}

impl std::fmt::Debug for PollingAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingAgent")
            .field("machine_id", &self.shared.machine_id)
            .field("polling", &self.is_polling())
            .finish_non_exhaustive()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Poll loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn run_loop(
    shared: Arc<Shared>,
    tools: Arc<ToolRegistry>,
    cancel: CancellationToken,
    epoch: u64,
) {
    let mut backoff = PollBackoff::new(shared.max_failures);
    let tool_names = tools.tool_names();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(backoff.retry_after()) => {}
            _ = cancel.cancelled() => break,
        }
        if cancel.is_cancelled() {
            break;
        }

        match poll_cycle(&shared, &tools, &tool_names, &mut backoff).await {
            Ok(()) => backoff.record_success(),
            Err(e) => {
                let tripped = backoff.record_failure();
                tracing::warn!(
                    machine_id = %shared.machine_id,
                    consecutive_failures = backoff.consecutive_failures(),
                    error = %e,
                    "failed to poll"
                );
                if tripped {
                    tracing::error!(
                        machine_id = %shared.machine_id,
                        consecutive_failures = backoff.consecutive_failures(),
                        "too many consecutive poll failures, stopping"
                    );
                    shared.release(epoch);
                    break;
                }
            }
        }
    }

    tracing::debug!(machine_id = %shared.machine_id, epoch, "poll loop exited");
}

/// Fetch one page of jobs and handle each in order.
async fn poll_cycle(
    shared: &Shared,
    tools: &ToolRegistry,
    tool_names: &[String],
    backoff: &mut PollBackoff,
) -> Result<()> {
    let cluster_id = shared.registrar.cluster_id().await?;

    let batch = match shared
        .api
        .list_jobs(&cluster_id, tool_names, shared.poll_limit)
        .await
    {
        Ok(batch) => batch,
        Err(e) => {
            if e.is_gone() {
                tracing::info!(machine_id = %shared.machine_id, "registration gone, re-registering");
                if let Err(re) = shared.registrar.register_machine(Some(tools)).await {
                    tracing::warn!(error = %re, "re-registration failed");
                }
            }
            return Err(e);
        }
    };

    if let Some(interval) = batch.retry_after {
        backoff.adopt_retry_after(interval);
    }

    let mut errors = Vec::new();
    for msg in batch.messages {
        let job_id = msg.id.clone();
        let Some(result) = handle_message(tools, msg).await else {
            continue;
        };
        match shared
            .api
            .create_job_result(&cluster_id, &job_id, &result)
            .await
        {
            Ok(()) => tracing::debug!(job_id = %job_id, result_type = %result.result_type, "job result persisted"),
            Err(e) => errors.push(format!("failed to persist job result for {job_id}: {e}")),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SdkError::Batch(errors))
    }
}
