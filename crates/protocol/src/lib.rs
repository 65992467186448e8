//! Control-plane wire protocol: machine registration, job polling, job
//! results and run lifecycle documents.
//!
//! Machines register their tool set with the control plane, poll for
//! pending jobs addressed to those tools, and post one result per job.
//! Field names follow the control plane's camelCase JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Header carrying the stable machine identifier.
pub const HEADER_MACHINE_ID: &str = "X-Machine-ID";
/// Header carrying the SDK version (telemetry only).
pub const HEADER_SDK_VERSION: &str = "X-Machine-SDK-Version";
/// Header carrying the SDK language (telemetry only).
pub const HEADER_SDK_LANGUAGE: &str = "X-Machine-SDK-Language";
/// Value sent in [`HEADER_SDK_LANGUAGE`].
pub const SDK_LANGUAGE: &str = "rust";
/// Server pacing hint on job listings, in whole seconds.
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// HTTP status the control plane uses to signal a stale machine registration.
pub const STATUS_GONE: u16 = 410;

/// Maximum jobs requested per poll cycle.
pub const DEFAULT_POLL_LIMIT: u32 = 10;

/// Run statuses that mean the run is still in flight.
pub const NON_TERMINAL_RUN_STATUSES: [&str; 3] = ["pending", "running", "paused"];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Jobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-invocation ambient data handed to a tool alongside its input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_context: Option<serde_json::Value>,
    /// Whether a previously raised approval interrupt has been approved.
    #[serde(default)]
    pub approved: bool,
}

/// Control plane → machine: one pending tool invocation.
///
/// Acknowledged at fetch time (`acknowledge=true`), so each message is
/// delivered to exactly one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMessage {
    pub id: String,
    /// Target tool name.
    pub function: String,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_context: Option<serde_json::Value>,
    #[serde(default)]
    pub approved: bool,
}

impl CallMessage {
    /// Build the [`ContextInput`] for this invocation.
    pub fn context(&self) -> ContextInput {
        ContextInput {
            auth_context: self.auth_context.clone(),
            run_context: self.run_context.clone(),
            approved: self.approved,
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Resolution,
    Rejection,
    Interrupt,
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolution => write!(f, "resolution"),
            Self::Rejection => write!(f, "rejection"),
            Self::Interrupt => write!(f, "interrupt"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResultMeta {
    /// Wall-clock handler time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_execution_time: Option<u64>,
}

/// Machine → control plane: outcome of one [`CallMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    pub result: serde_json::Value,
    pub result_type: ResultType,
    #[serde(default)]
    pub meta: CallResultMeta,
}

impl CallResult {
    pub fn resolution(result: serde_json::Value, elapsed_ms: u64) -> Self {
        Self::new(result, ResultType::Resolution, Some(elapsed_ms))
    }

    pub fn rejection(message: impl Into<String>, elapsed_ms: Option<u64>) -> Self {
        Self::new(
            serde_json::Value::String(message.into()),
            ResultType::Rejection,
            elapsed_ms,
        )
    }

    pub fn interrupt(interrupt: &Interrupt, elapsed_ms: u64) -> Self {
        Self::new(interrupt.to_value(), ResultType::Interrupt, Some(elapsed_ms))
    }

    fn new(result: serde_json::Value, result_type: ResultType, elapsed_ms: Option<u64>) -> Self {
        Self {
            result,
            result_type,
            meta: CallResultMeta {
                function_execution_time: elapsed_ms,
            },
        }
    }
}

/// A tool outcome that asks the orchestrator to pause for an external
/// decision before the tool's effect may proceed.
///
/// Serialized as `{"type": "<kind>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
#[non_exhaustive]
pub enum Interrupt {
    /// Human or system approval is required.
    Approval,
}

impl Interrupt {
    pub fn approval() -> Self {
        Self::Approval
    }

    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Approval => serde_json::json!({ "type": "approval" }),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Machine registration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A tool as advertised to the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON text of the tool's input schema.
    pub schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

/// `POST /machines` body. `tools: None` is an empty declaration used to
/// resolve the cluster without advertising anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineRegistration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMachineResponse {
    pub cluster_id: String,
}

/// `GET /live` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveResponse {
    pub status: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Reference to a registered tool, used to attach tools to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub function: String,
}

impl ToolReference {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            service: None,
            function: function.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTemplate {
    pub id: String,
    #[serde(default)]
    pub input: serde_json::Map<String, serde_json::Value>,
}

/// Tool the control plane calls whenever the run's status changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnStatusChange {
    pub function: ToolReference,
}

/// `POST /clusters/{cluster}/runs` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunInput {
    pub initial_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_functions: Vec<ToolReference>,
    /// JSON schema the run's result must conform to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<RunTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_status_change: Option<OnStatusChange>,
    #[serde(default)]
    pub reasoning_traces: bool,
    #[serde(default)]
    pub interactive: bool,
    #[serde(default)]
    pub call_summarization: bool,
}

impl CreateRunInput {
    pub fn new(initial_prompt: impl Into<String>) -> Self {
        Self {
            initial_prompt: initial_prompt.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRunResponse {
    pub id: String,
}

/// `GET /clusters/{cluster}/runs/{id}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    #[serde(default, alias = "runId")]
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<serde_json::Value>,
}

impl RunResult {
    /// `true` once the status is anything other than pending, running or paused.
    pub fn is_terminal(&self) -> bool {
        !NON_TERMINAL_RUN_STATUSES.contains(&self.status.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_message_parses_control_plane_shape() {
        let raw = json!({
            "id": "job-1",
            "function": "sayHello",
            "input": { "name": "Ada" },
            "authContext": { "userId": "u1" },
            "runContext": "ctx",
            "approved": true
        });
        let msg: CallMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.id, "job-1");
        assert_eq!(msg.function, "sayHello");
        assert_eq!(msg.input, json!({ "name": "Ada" }));

        let ctx = msg.context();
        assert_eq!(ctx.auth_context, Some(json!({ "userId": "u1" })));
        assert_eq!(ctx.run_context, Some(json!("ctx")));
        assert!(ctx.approved);
    }

    #[test]
    fn call_message_context_fields_are_optional() {
        let msg: CallMessage =
            serde_json::from_str(r#"{ "id": "j", "function": "f" }"#).unwrap();
        assert_eq!(msg.input, serde_json::Value::Null);
        assert_eq!(msg.context(), ContextInput::default());
    }

    #[test]
    fn call_result_wire_shape() {
        let result = CallResult::resolution(json!(5), 12);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "result": 5,
                "resultType": "resolution",
                "meta": { "functionExecutionTime": 12 }
            })
        );
    }

    #[test]
    fn rejection_without_timing_omits_execution_time() {
        let result = CallResult::rejection("bad input", None);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "result": "bad input", "resultType": "rejection", "meta": {} })
        );
    }

    #[test]
    fn interrupt_serializes_with_type_tag() {
        let value = serde_json::to_value(Interrupt::approval()).unwrap();
        assert_eq!(value, json!({ "type": "approval" }));
        assert_eq!(Interrupt::approval().to_value(), value);

        let back: Interrupt = serde_json::from_value(value).unwrap();
        assert_eq!(back, Interrupt::Approval);

        let result = CallResult::interrupt(&Interrupt::approval(), 3);
        assert_eq!(result.result_type, ResultType::Interrupt);
        assert_eq!(result.result, json!({ "type": "approval" }));
    }

    #[test]
    fn empty_registration_omits_tools() {
        let body = serde_json::to_value(MachineRegistration::default()).unwrap();
        assert_eq!(body, json!({}));
    }

    #[test]
    fn registration_response_uses_camel_case() {
        let resp: RegisterMachineResponse =
            serde_json::from_str(r#"{ "clusterId": "clu_1" }"#).unwrap();
        assert_eq!(resp.cluster_id, "clu_1");
    }

    #[test]
    fn create_run_input_omits_unset_fields() {
        let body = serde_json::to_value(CreateRunInput::new("hi")).unwrap();
        assert_eq!(
            body,
            json!({
                "initialPrompt": "hi",
                "reasoningTraces": false,
                "interactive": false,
                "callSummarization": false
            })
        );
    }

    #[test]
    fn create_run_input_with_tools_and_hook() {
        let input = CreateRunInput {
            attached_functions: vec![ToolReference::new("sayHello")],
            on_status_change: Some(OnStatusChange {
                function: ToolReference::new("onDone"),
            }),
            ..CreateRunInput::new("Say hello to John")
        };
        let body = serde_json::to_value(&input).unwrap();
        assert_eq!(body["attachedFunctions"], json!([{ "function": "sayHello" }]));
        assert_eq!(body["onStatusChange"], json!({ "function": { "function": "onDone" } }));
    }

    #[test]
    fn run_result_terminal_statuses() {
        for status in ["pending", "running", "paused"] {
            let run = RunResult {
                id: "r".into(),
                status: status.into(),
                result: None,
                tags: None,
            };
            assert!(!run.is_terminal(), "{status} should not be terminal");
        }
        for status in ["done", "failed", "success"] {
            let run = RunResult {
                id: "r".into(),
                status: status.into(),
                result: None,
                tags: None,
            };
            assert!(run.is_terminal(), "{status} should be terminal");
        }
    }

    #[test]
    fn run_result_accepts_run_id_alias() {
        let run: RunResult =
            serde_json::from_str(r#"{ "runId": "run_9", "status": "done", "result": 1 }"#)
                .unwrap();
        assert_eq!(run.id, "run_9");
        assert_eq!(run.result, Some(json!(1)));
    }
}
