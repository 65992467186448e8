//! Turns one inbound [`CallMessage`] into the [`CallResult`] to report.

use inf_protocol::{CallMessage, CallResult};

use crate::registry::ToolRegistry;

/// Run the tool `msg` targets.
///
/// Returns `None` when no tool of that name is registered here: several
/// machines with different tool sets may share one queue, so nothing is
/// reported for it.
pub async fn handle_message(tools: &ToolRegistry, msg: CallMessage) -> Option<CallResult> {
    let Some(tool) = tools.get(&msg.function) else {
        tracing::warn!(job_id = %msg.id, function = %msg.function, "received call for unknown function");
        return None;
    };

    let ctx = msg.context();
    tracing::debug!(job_id = %msg.id, function = %msg.function, approved = ctx.approved, "executing job");

    let result = tool.handler.invoke(msg.input, ctx).await;

    tracing::debug!(
        job_id = %msg.id,
        function = %msg.function,
        result_type = %result.result_type,
        duration_ms = result.meta.function_execution_time,
        "job finished"
    );
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Outcome, Tool};
    use inf_protocol::{ContextInput, Interrupt, ResultType};
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct RefundInput {
        order_id: String,
        amount: u32,
    }

    fn registry() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        reg.register(Tool::new(
            "refund",
            |input: RefundInput, ctx: ContextInput| async move {
                if input.amount == 0 {
                    return Err(format!("nothing to refund for {}", input.order_id));
                }
                if input.amount > 100 && !ctx.approved {
                    return Ok(Outcome::WithInterrupt(
                        json!({ "pending": input.order_id }),
                        Some(Interrupt::approval()),
                    ));
                }
                Ok(Outcome::resolve(json!({ "refunded": input.amount })))
            },
        ))
        .unwrap();
        reg
    }

    fn msg(function: &str, input: serde_json::Value, approved: bool) -> CallMessage {
        CallMessage {
            id: "job_1".into(),
            function: function.into(),
            input,
            auth_context: None,
            run_context: Some(json!({ "run": "r1" })),
            approved,
        }
    }

    #[tokio::test]
    async fn unknown_function_reports_nothing() {
        let reg = registry();
        assert!(handle_message(&reg, msg("missing", json!({}), false)).await.is_none());
    }

    #[tokio::test]
    async fn resolution_carries_first_value() {
        let reg = registry();
        let r = handle_message(&reg, msg("refund", json!({ "order_id": "o1", "amount": 5 }), false))
            .await
            .unwrap();
        assert_eq!(r.result_type, ResultType::Resolution);
        assert_eq!(r.result, json!({ "refunded": 5 }));
    }

    #[tokio::test]
    async fn handler_error_is_rejection() {
        let reg = registry();
        let r = handle_message(&reg, msg("refund", json!({ "order_id": "o1", "amount": 0 }), false))
            .await
            .unwrap();
        assert_eq!(r.result_type, ResultType::Rejection);
        assert_eq!(r.result, json!("nothing to refund for o1"));
    }

    #[tokio::test]
    async fn approval_flag_flows_from_message() {
        let reg = registry();
        let input = json!({ "order_id": "o2", "amount": 500 });

        let r = handle_message(&reg, msg("refund", input.clone(), false)).await.unwrap();
        assert_eq!(r.result_type, ResultType::Interrupt);
        assert_eq!(r.result, json!({ "type": "approval" }));

        let r = handle_message(&reg, msg("refund", input, true)).await.unwrap();
        assert_eq!(r.result_type, ResultType::Resolution);
    }

    #[tokio::test]
    async fn undecodable_input_is_rejection() {
        let reg = registry();
        let r = handle_message(&reg, msg("refund", json!({ "order_id": 7 }), false))
            .await
            .unwrap();
        assert_eq!(r.result_type, ResultType::Rejection);
        assert!(r.meta.function_execution_time.is_none());
    }
}
