// orchid/src/feature/execution.rs

//! Per-request orchestration: the step executor state machine and the
//! retry protocol between the error handler and the orchestration loop.
//!
//! Steps execute strictly one at a time, in ascending ordinal order, never
//! concurrently and never skipped except via early-exit. The only control
//! flow available to a step is: return normally (continue), fail (throw),
//! or send the response before returning (early-exit).

use crate::core::context::Context;
use crate::core::control::{ErrorDisposition, PipelineOutcome, RETRY_HARD_CEILING};
use crate::core::http::{Request, Response};
use crate::discovery::StepDescriptor;
use crate::error::{OrchidError, OrchidResult};
use crate::feature::definition::Feature;
use crate::scheduler::spawn_async_tasks;
use serde_json::json;
use std::sync::Arc;
use tracing::{event, instrument, span, Instrument, Level};

/// Terminal state of the orchestration loop for one request.
enum Verdict {
  /// The pipeline produced the response.
  Done(PipelineOutcome),
  /// The error handler owned the outcome (response sent, or retries
  /// exhausted and the fixed 503 sent).
  Handled,
  /// No recovery; the error goes to the feature's caller.
  Propagate(OrchidError),
}

impl Feature {
  /// Runs the full orchestration for one request: fresh context,
  /// initializer, middleware, then the bounded retry loop around the step
  /// pipeline, and finally the fire-and-forget async-task batch.
  #[instrument(
        name = "Feature::run",
        skip_all,
        fields(method = %self.method(), path = %self.path()),
        err(Display)
    )]
  pub(crate) async fn run(&self, req: Arc<Request>, res: Response) -> OrchidResult<()> {
    let loaded = self.loaded()?;
    let ctx = Context::new();

    if let Some(init) = &self.initializer {
      event!(Level::TRACE, "Running context initializer.");
      init(ctx.clone(), req.clone(), res.clone())
        .await
        .map_err(|source| OrchidError::InitializerFailure { source })?;
    }

    for (index, mw) in self.middleware.iter().enumerate() {
      mw(ctx.clone(), req.clone(), res.clone())
        .instrument(span!(Level::DEBUG, "middleware", index))
        .await
        .map_err(|source| OrchidError::MiddlewareFailure { index, source })?;
      if res.is_sent() {
        event!(Level::DEBUG, index, "Middleware sent the response; skipping pipeline.");
        let _detached = spawn_async_tasks(loaded.tasks.clone(), ctx.clone());
        return Ok(());
      }
    }

    let verdict = self.run_with_retry(&loaded.steps, &ctx, &req, &res).await;
    match verdict {
      Verdict::Done(outcome) => {
        event!(Level::DEBUG, ?outcome, "Pipeline succeeded.");
        let _detached = spawn_async_tasks(loaded.tasks.clone(), ctx.clone());
        Ok(())
      }
      Verdict::Handled => Ok(()),
      Verdict::Propagate(e) => Err(e),
    }
  }

  /// The bounded retry loop. Re-enters the executor from step 0 with the
  /// same context for every honored retry signal; the global hard ceiling
  /// guarantees termination even against a handler that always retries
  /// without a cap.
  async fn run_with_retry(
    &self,
    steps: &[StepDescriptor],
    ctx: &Context,
    req: &Arc<Request>,
    res: &Response,
  ) -> Verdict {
    let mut attempts: u32 = 0;
    let mut retries_granted: u32 = 0;

    loop {
      let pass = run_steps(self, steps, ctx, req, res).await;
      attempts += 1;

      let error = match pass {
        Ok(outcome) => return Verdict::Done(outcome),
        Err(e) => e,
      };

      let Some(handler) = &self.error_handler else {
        return Verdict::Propagate(error);
      };

      event!(Level::DEBUG, attempts, error = %error, "Invoking error handler.");
      let shared = Arc::new(error);
      let disposition = match handler(shared.clone(), ctx.clone(), req.clone(), res.clone()).await {
        Ok(d) => d,
        Err(handler_err) => {
          event!(
            Level::ERROR,
            error = %handler_err,
            "Error handler itself failed; propagating the pipeline error."
          );
          return Verdict::Propagate(unwrap_shared(shared));
        }
      };

      let signal = match disposition {
        ErrorDisposition::Handled => {
          if !res.is_sent() {
            event!(Level::WARN, "Error handler reported handled without sending a response.");
          }
          return Verdict::Handled;
        }
        ErrorDisposition::Retry(signal) => signal,
      };

      if res.is_sent() {
        // A sent response is terminal no matter what the handler returned.
        event!(Level::WARN, "Error handler sent a response and requested retry; ignoring the retry.");
        return Verdict::Handled;
      }

      if let Some(max) = signal.max_attempts {
        if retries_granted >= max {
          event!(Level::WARN, max, "Per-signal retry cap reached.");
          send_retry_exhausted(res);
          return Verdict::Handled;
        }
      }
      if attempts >= RETRY_HARD_CEILING {
        event!(Level::ERROR, attempts, "Global retry ceiling reached.");
        send_retry_exhausted(res);
        return Verdict::Handled;
      }

      retries_granted += 1;
      if !signal.delay.is_zero() {
        event!(Level::DEBUG, delay_ms = signal.delay.as_millis() as u64, "Delaying before retry.");
        tokio::time::sleep(signal.delay).await;
      }
      event!(Level::INFO, attempt = attempts + 1, "Re-entering pipeline from step 0.");
    }
  }
}

/// Executes the ordered step list once against the shared context.
///
/// State machine: `Running(i)` invokes step `i`; a sent response on return
/// is an early exit (terminal, equivalent to completion for the caller);
/// otherwise the last index completes the pipeline. Completing with the
/// response unsent is a protocol error, surfaced like any execution error
/// so a handler may recover it.
async fn run_steps(
  feature: &Feature,
  steps: &[StepDescriptor],
  ctx: &Context,
  req: &Arc<Request>,
  res: &Response,
) -> OrchidResult<PipelineOutcome> {
  for (index, step) in steps.iter().enumerate() {
    let step_span = span!(
      Level::INFO,
      "pipeline_step",
      ordinal = step.ordinal,
      name = %step.name,
      index
    );

    if let Err(source) = (step.exec)(ctx.clone(), req.clone(), res.clone())
      .instrument(step_span)
      .await
    {
      event!(Level::ERROR, ordinal = step.ordinal, name = %step.name, error = %source, "Step failed.");
      return Err(wrap_step_error(source, step, ctx));
    }

    if res.is_sent() {
      let outcome = if index + 1 == steps.len() {
        PipelineOutcome::Completed
      } else {
        event!(Level::DEBUG, remaining = steps.len() - index - 1, "Early exit; skipping remaining steps.");
        PipelineOutcome::EarlyExit
      };
      return Ok(outcome);
    }
  }

  Err(OrchidError::NoResponse {
    method: feature.method(),
    path: feature.path().to_string(),
  })
}

/// Wraps a step failure with the failing step's ordinal, name and the
/// current context. An error that is already a pipeline wrap (propagated
/// from a nested call) is re-thrown unchanged rather than double-wrapped.
fn wrap_step_error(source: anyhow::Error, step: &StepDescriptor, ctx: &Context) -> OrchidError {
  match source.downcast::<OrchidError>() {
    Ok(already_wrapped @ OrchidError::StepFailure { .. }) => already_wrapped,
    Ok(other_orchid) => OrchidError::StepFailure {
      ordinal: step.ordinal,
      name: step.name.clone(),
      context: ctx.clone(),
      source: anyhow::Error::new(other_orchid),
    },
    Err(plain) => OrchidError::StepFailure {
      ordinal: step.ordinal,
      name: step.name.clone(),
      context: ctx.clone(),
      source: plain,
    },
  }
}

fn send_retry_exhausted(res: &Response) {
  res.send_json(503, json!({ "error": "max retry attempts exceeded" }));
}

fn unwrap_shared(shared: Arc<OrchidError>) -> OrchidError {
  Arc::try_unwrap(shared).unwrap_or_else(|arc| OrchidError::Internal(arc.to_string()))
}
