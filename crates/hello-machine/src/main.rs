//! Reference "hello-world" machine for Inferable.
//!
//! Registers three tools, polls for jobs until Ctrl-C, and optionally
//! creates a run that uses them:
//!
//! - `ping`          : pong with a timestamp
//! - `echo`          : echo the text back
//! - `issueRefund`   : refunds above 100 need approval first
//!
//! Usage:
//!   INFERABLE_API_SECRET=sk_... inf-hello-machine [--run "Ping the machine"]
//!
//! Env vars:
//!   INFERABLE_API_SECRET    : API secret (required)
//!   INFERABLE_API_ENDPOINT  : control plane URL (default: https://api.inferable.ai)
//!   INFERABLE_MACHINE_ID    : explicit machine id
//!   INFERABLE_CLUSTER_ID    : skip cluster resolution

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use inf_sdk::{
    ClientConfig, ContextInput, CreateRunInput, InferableBuilder, Outcome, PollOptions, Tool,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Reference machine: serves demo tools to an Inferable cluster.
#[derive(Debug, Parser)]
#[command(name = "inf-hello-machine", version, about)]
struct Cli {
    /// TOML client configuration; `INFERABLE_*` env vars override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Extra input to the machine id, to run several machines per secret.
    #[arg(long)]
    seed: Option<String>,
    /// Create a run with this prompt, wait for it and print the result.
    #[arg(long)]
    run: Option<String>,
    /// Seconds to wait for the run to finish.
    #[arg(long, default_value_t = 60)]
    run_timeout: u64,
}

#[derive(Deserialize, JsonSchema)]
struct PingInput {
    /// Free-form tag echoed back with the pong.
    #[serde(default)]
    tag: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct EchoInput {
    text: String,
}

#[derive(Deserialize, JsonSchema)]
struct RefundInput {
    order_id: String,
    amount_cents: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => toml::from_str::<ClientConfig>(&std::fs::read_to_string(path)?)?,
        None => ClientConfig::default(),
    };
    let mut builder = InferableBuilder::from_config(base.with_env());
    if let Some(seed) = &cli.seed {
        builder = builder.machine_seed(seed);
    }
    let client = builder.build()?;

    tracing::info!(machine_id = %client.machine_id(), "checking control plane");
    client.live().await?;

    let tools = client.tools();
    let ping = tools.register(
        Tool::new("ping", |input: PingInput, _ctx: ContextInput| async move {
            Ok::<_, String>(Outcome::resolve(serde_json::json!({
                "pong": true,
                "tag": input.tag,
                "timestamp": Utc::now().timestamp_millis(),
            })))
        })
        .description("Pong with the machine's current timestamp"),
    )?;
    tools.register(
        Tool::new("echo", |input: EchoInput, _ctx: ContextInput| async move {
            Ok::<_, String>(Outcome::resolve(input.text))
        })
        .description("Echo the text back"),
    )?;
    tools.register(
        Tool::new(
            "issueRefund",
            |input: RefundInput, ctx: ContextInput| async move {
                if input.amount_cents == 0 {
                    return Err(format!("order {} has nothing to refund", input.order_id));
                }
                if input.amount_cents > 10_000 && !ctx.approved {
                    return Ok(Outcome::approval());
                }
                tracing::info!(order_id = %input.order_id, amount_cents = input.amount_cents, "refund issued");
                Ok(Outcome::resolve(serde_json::json!({
                    "orderId": input.order_id,
                    "refunded": input.amount_cents,
                })))
            },
        )
        .description("Refund an order; large refunds need approval")
        .config(serde_json::json!({ "requiresApproval": true })),
    )?;

    tools.start().await?;

    if let Some(prompt) = cli.run {
        let mut input = CreateRunInput::new(prompt);
        input.attached_functions.push(ping);
        let run = client.create_run(&input).await?;
        tracing::info!(run_id = %run.id, "waiting for run");

        let result = run
            .poll(PollOptions {
                max_wait: Duration::from_secs(cli.run_timeout),
                ..Default::default()
            })
            .await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    tracing::info!("polling for jobs, Ctrl-C to exit");
    tokio::signal::ctrl_c().await?;
    tracing::info!("received SIGINT, shutting down");
    tools.stop();
    Ok(())
}
