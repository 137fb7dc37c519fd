// orchid/src/core/unit.rs

//! Type aliases for the executable units users author: steps, async-tasks,
//! context initializers and error handlers.
//!
//! Every unit is an async closure returning `anyhow::Result<..>`; the engine
//! wraps unit failures into `OrchidError` variants carrying the failing
//! unit's location.

use crate::core::context::Context;
use crate::core::control::ErrorDisposition;
use crate::core::http::{Request, Response};
use crate::error::OrchidError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// An ordered unit of request-processing logic.
///
/// Steps mutate the shared `Context`, may read the `Request`, and may send
/// the `Response` to short-circuit the remaining pipeline.
pub type StepFn =
  Arc<dyn Fn(Context, Arc<Request>, Response) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// An unordered, best-effort background unit run only after the step
/// pipeline succeeds. Receives the context, never the response.
pub type AsyncTaskFn = Arc<dyn Fn(Context) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// Pre-populates a fresh `Context` before any middleware or step runs.
pub type ContextInitFn =
  Arc<dyn Fn(Context, Arc<Request>, Response) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// Receives the wrapped pipeline error and must either send a response
/// itself (returning `ErrorDisposition::Handled`) or ask for another
/// pipeline pass (`ErrorDisposition::Retry`).
pub type ErrorHandlerFn = Arc<
  dyn Fn(Arc<OrchidError>, Context, Arc<Request>, Response) -> BoxFuture<anyhow::Result<ErrorDisposition>>
    + Send
    + Sync,
>;

/// Wraps a plain async closure into a [`StepFn`].
pub fn step_fn<F, Fut>(f: F) -> StepFn
where
  F: Fn(Context, Arc<Request>, Response) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
  Arc::new(move |ctx, req, res| Box::pin(f(ctx, req, res)))
}

/// Wraps a plain async closure into an [`AsyncTaskFn`].
pub fn async_task_fn<F, Fut>(f: F) -> AsyncTaskFn
where
  F: Fn(Context) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
  Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Wraps a plain async closure into a [`ContextInitFn`].
pub fn context_init_fn<F, Fut>(f: F) -> ContextInitFn
where
  F: Fn(Context, Arc<Request>, Response) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
  Arc::new(move |ctx, req, res| Box::pin(f(ctx, req, res)))
}

/// Wraps a plain async closure into an [`ErrorHandlerFn`].
pub fn error_handler_fn<F, Fut>(f: F) -> ErrorHandlerFn
where
  F: Fn(Arc<OrchidError>, Context, Arc<Request>, Response) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<ErrorDisposition>> + Send + 'static,
{
  Arc::new(move |err, ctx, req, res| Box::pin(f(err, ctx, req, res)))
}
