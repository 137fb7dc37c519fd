pub mod context;
pub mod control;
pub mod http;
pub mod unit;

// Re-export key types for easier access from other orchid modules (and lib.rs)
pub use context::Context;
pub use control::{ErrorDisposition, PipelineOutcome, RetrySignal, RETRY_HARD_CEILING};
pub use http::{Body, HttpMethod, Request, Response};
pub use unit::{AsyncTaskFn, BoxFuture, ContextInitFn, ErrorHandlerFn, StepFn};
