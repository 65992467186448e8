//! Tool handlers: the uniform `(input, context) -> outcome` interface and
//! the classification of an outcome into a [`CallResult`].

use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use inf_protocol::{CallResult, ContextInput, Interrupt};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// What a tool handler produced when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Ordinary result, reported as a resolution.
    Resolve(T),
    /// The effect needs external approval before it may proceed.
    Interrupt(Interrupt),
    /// A value returned alongside an optional interrupt. A present
    /// interrupt takes precedence over the value.
    WithInterrupt(T, Option<Interrupt>),
}

impl<T> Outcome<T> {
    pub fn resolve(value: T) -> Self {
        Self::Resolve(value)
    }

    pub fn approval() -> Self {
        Self::Interrupt(Interrupt::approval())
    }
}

/// Classify a handler's return into the result reported upstream.
///
/// An error wins, then an interrupt, then the value.
pub fn classify<O, E>(returned: std::result::Result<Outcome<O>, E>, elapsed_ms: u64) -> CallResult
where
    O: Serialize,
    E: Display,
{
    let value = match returned {
        Err(e) => return CallResult::rejection(e.to_string(), Some(elapsed_ms)),
        Ok(Outcome::Interrupt(interrupt))
        | Ok(Outcome::WithInterrupt(_, Some(interrupt))) => {
            return CallResult::interrupt(&interrupt, elapsed_ms)
        }
        Ok(Outcome::Resolve(value)) | Ok(Outcome::WithInterrupt(value, None)) => value,
    };

    match serde_json::to_value(value) {
        Ok(v) => CallResult::resolution(v, elapsed_ms),
        Err(e) => CallResult::rejection(
            format!("failed to serialize tool result: {e}"),
            Some(elapsed_ms),
        ),
    }
}

/// A type-erased tool implementation.
///
/// Most tools are built from an async closure through [`Tool::new`];
/// implement this directly for handlers that work on raw JSON.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    /// Input schema advertised to the control plane. Called once, at
    /// registration.
    fn input_schema(&self, tool: &str) -> Result<serde_json::Value>;

    /// Decode `input`, run the tool and classify its outcome.
    async fn invoke(&self, input: serde_json::Value, ctx: ContextInput) -> CallResult;
}

/// Adapts `Fn(I, ContextInput) -> impl Future<Output = Result<Outcome<O>, E>>`
/// to [`ToolHandler`].
struct FnHandler<I, O, E, F> {
    func: F,
    _marker: PhantomData<fn(I) -> (O, E)>,
}

#[async_trait::async_trait]
impl<I, O, E, F, Fut> ToolHandler for FnHandler<I, O, E, F>
where
    I: DeserializeOwned + JsonSchema + Send + 'static,
    O: Serialize + Send + 'static,
    E: Display + Send + 'static,
    F: Fn(I, ContextInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Outcome<O>, E>> + Send + 'static,
{
    fn input_schema(&self, tool: &str) -> Result<serde_json::Value> {
        crate::schema::input_schema::<I>(tool)
    }

    async fn invoke(&self, input: serde_json::Value, ctx: ContextInput) -> CallResult {
        // Malformed input never reaches the handler.
        let input: I = match serde_json::from_value(input) {
            Ok(v) => v,
            Err(e) => return CallResult::rejection(e.to_string(), None),
        };

        let start = Instant::now();
        let returned = AssertUnwindSafe(async { (self.func)(input, ctx).await })
            .catch_unwind()
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match returned {
            Ok(returned) => classify(returned, elapsed_ms),
            Err(_panic) => CallResult::rejection("tool handler panicked", Some(elapsed_ms)),
        }
    }
}

/// A tool ready to be registered.
///
/// ```rust,no_run
/// use inf_sdk::{ContextInput, Outcome, Tool};
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct HelloInput {
///     name: String,
/// }
///
/// let tool = Tool::new("sayHello", |input: HelloInput, _ctx: ContextInput| async move {
///     Ok::<_, std::convert::Infallible>(Outcome::resolve(format!("Hello {}", input.name)))
/// })
/// .description("Greets someone by name");
/// ```
#[derive(Clone)]
pub struct Tool {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) config: Option<serde_json::Value>,
    pub(crate) handler: Arc<dyn ToolHandler>,
}

impl Tool {
    /// Wrap an async function of `(input, context)`.
    pub fn new<I, O, E, F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        I: DeserializeOwned + JsonSchema + Send + 'static,
        O: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: Fn(I, ContextInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Outcome<O>, E>> + Send + 'static,
    {
        Self::from_handler(
            name,
            Arc::new(FnHandler {
                func,
                _marker: PhantomData,
            }),
        )
    }

    /// Use a pre-built handler.
    pub fn from_handler(name: impl Into<String>, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            name: name.into(),
            description: None,
            config: None,
            handler,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Opaque configuration forwarded to the control plane at registration.
    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
