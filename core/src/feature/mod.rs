// orchid/src/feature/mod.rs

//! One route's complete configuration and its per-request orchestration:
//! method, path, step pipeline, async-tasks, middleware, context
//! initializer and error handler.

pub mod definition;
pub mod execution;

pub use definition::{Feature, FeatureConfig, FeatureInfo, RequestHandler};

use crate::core::http::{HttpMethod, Request, Response};
use crate::error::OrchidResult;
use async_trait::async_trait;
use std::sync::Arc;

/// The three capabilities every feature exposes to the surrounding
/// transport layer: handle one request, describe itself, and initialize
/// (discover its units) ahead of time.
///
/// The engine's route table stores `Arc<dyn AnyFeature>`, so hand-written
/// handlers can sit next to convention-discovered [`Feature`]s.
#[async_trait]
pub trait AnyFeature: Send + Sync {
  fn method(&self) -> HttpMethod;

  fn path(&self) -> &str;

  /// Runs the full orchestration for one request: initializer, middleware,
  /// the step pipeline with its retry protocol, then async-tasks.
  async fn handle(&self, req: Arc<Request>, res: Response) -> OrchidResult<()>;

  /// Route info. Forces initialization, since the counts come from
  /// discovery.
  fn info(&self) -> OrchidResult<FeatureInfo>;

  /// Discovers steps and async-tasks now instead of on the first request.
  /// Idempotent; at most one discovery ever runs.
  fn initialize(&self) -> OrchidResult<()>;
}
