// orchid/src/core/control.rs

//! Signals controlling pipeline flow: the outcome of a pipeline pass, the
//! retry protocol between an error handler and the orchestration loop, and
//! the hard ceiling that keeps that loop finite.

use std::time::Duration;

/// Hard ceiling on pipeline passes for a single request, independent of any
/// per-signal cap. With an error handler that always retries, the step
/// pipeline executes exactly this many times before a fixed 503 is sent.
pub const RETRY_HARD_CEILING: u32 = 10;

/// Outcome of one pass over a feature's step pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
  /// Every step returned normally and the last one produced the response.
  Completed,
  /// A step sent the response and returned; the remaining steps were
  /// skipped. Treated identically to `Completed` by callers.
  EarlyExit,
}

/// The value an error handler returns to request another pipeline pass.
///
/// Produced only by error handlers, consumed only by the orchestration
/// loop, never stored in the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySignal {
  /// Suspension before re-entering the pipeline. Zero by default; this is
  /// the only deliberate suspension point at retry boundaries.
  pub delay: Duration,
  /// Cap on the number of retries granted by signals carrying this cap.
  /// The global [`RETRY_HARD_CEILING`] applies regardless.
  pub max_attempts: Option<u32>,
}

impl RetrySignal {
  /// An immediate, uncapped retry.
  pub fn new() -> Self {
    Self {
      delay: Duration::ZERO,
      max_attempts: None,
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
    self.max_attempts = Some(max_attempts);
    self
  }
}

impl Default for RetrySignal {
  fn default() -> Self {
    Self::new()
  }
}

/// What an error handler decided to do with a pipeline error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
  /// The handler dealt with the error itself (normally by sending a
  /// response). Terminal; no retry.
  Handled,
  /// Re-enter the pipeline from step 0 with the same context.
  Retry(RetrySignal),
}

impl ErrorDisposition {
  /// Shorthand for an immediate, uncapped retry.
  pub fn retry() -> Self {
    ErrorDisposition::Retry(RetrySignal::new())
  }
}
