// orchid/src/scheduler.rs

//! Background execution of async-task batches.
//!
//! Tasks run only after a successful pipeline outcome, one at a time, each
//! awaited before the next starts. A failing task is caught and logged so
//! it can neither surface to the client (the response is already sent) nor
//! block the tasks behind it.

use crate::core::context::Context;
use crate::discovery::AsyncTaskDescriptor;
use tokio::task::JoinHandle;
use tracing::{event, instrument, span, Instrument, Level};

/// Runs a task batch to completion, sequentially, isolating each failure.
#[instrument(name = "scheduler::run_async_tasks", skip_all, fields(count = tasks.len()))]
pub async fn run_async_tasks(tasks: &[AsyncTaskDescriptor], ctx: Context) {
  for task in tasks {
    let task_span = span!(Level::DEBUG, "async_task", name = %task.name);
    match (task.exec)(ctx.clone()).instrument(task_span).await {
      Ok(()) => event!(Level::TRACE, name = %task.name, "Async-task finished."),
      Err(e) => {
        event!(Level::WARN, name = %task.name, error = %e, "Async-task failed; continuing with remaining tasks.");
      }
    }
  }
}

/// Fire-and-forget wrapper: returns immediately, the batch runs on the
/// runtime. The handle is returned for callers that want to await the
/// batch (tests); dropping it does not cancel the batch.
pub fn spawn_async_tasks(tasks: Vec<AsyncTaskDescriptor>, ctx: Context) -> JoinHandle<()> {
  tokio::spawn(async move { run_async_tasks(&tasks, ctx).await })
}
