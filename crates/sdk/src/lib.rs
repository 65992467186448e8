//! `inf-sdk`: client library for machines that serve tools to an Inferable
//! control plane.
//!
//! A "machine" is any process that registers a set of tools with the
//! control plane and executes the jobs it hands out. This crate provides
//! the building blocks so machine authors don't need to re-implement
//! registration, polling, input decoding or result reporting.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  Your machine                                             │
//! │                                                           │
//! │   let client = InferableBuilder::new()                    │
//! │       .api_secret("sk_...")                               │
//! │       .build()?;                                          │
//! │                                                           │
//! │   client.tools().register(                                │
//! │       Tool::new("sayHello", say_hello))?;                 │
//! │   client.tools().start().await?;                          │
//! │                                                           │
//! │   let run = client.create_run(&input).await?;             │
//! │   let result = run.poll(PollOptions::default()).await?;   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Poll flow (hard-coded by the SDK)
//!
//! 1. `POST /machines` with every tool's name, description and input schema
//! 2. Loop, sleeping the server's `Retry-After` between cycles:
//!    - `GET /clusters/{cluster}/jobs?acknowledge=true&status=pending`
//!    - For each job in order: decode input, run the tool, classify the
//!      outcome, `POST /clusters/{cluster}/jobs/{job}/result`
//!    - On HTTP 410: re-register
//! 3. After 51 consecutive failed cycles the loop stops itself
//!
//! # Tool outcomes
//!
//! - handler error → `rejection` with the error's message
//! - [`Interrupt`] → `interrupt` (e.g. needs approval)
//! - anything else → `resolution`
//!
//! Unknown tool names are ignored: machines with different tool sets may
//! share one queue.

pub mod agent;
pub mod api;
pub mod backoff;
pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod invocation;
pub mod machine;
pub mod registrar;
pub mod registry;
pub mod runs;
pub mod schema;
pub mod tool;
pub mod transport;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use agent::PollingAgent;
pub use builder::InferableBuilder;
pub use client::Inferable;
pub use config::ClientConfig;
pub use error::{Result, SdkError, TransportError};
pub use registry::{RegisteredTool, ToolRegistry};
pub use runs::{PollOptions, RunHandle};
pub use tool::{Outcome, Tool, ToolHandler};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

// Re-export protocol types so machines never need to import inf-protocol directly.
pub use inf_protocol::{
    CallMessage, CallResult, ContextInput, CreateRunInput, Interrupt, OnStatusChange,
    ResultType, RunResult, RunTemplate, ToolReference,
};
