// src/lib.rs

//! Orchid: a feature-first auto-orchestration engine for request handling.
//!
//! Orchid discovers a route's processing pipeline from a directory layout
//! instead of from wiring code:
//!  - A method directory (`@get`, `@post`, ...) below a `features` root
//!    becomes a route; `[name]` segments become `:name` parameters.
//!  - An ordered `steps/` directory (`100-validate.rs`, `200-save.rs`)
//!    becomes the request pipeline, sharing one per-request `Context`.
//!  - An optional `async-tasks/` directory becomes a fire-and-forget batch
//!    run after the pipeline succeeds, with per-task failure isolation.
//!  - An error handler may answer a failure with a `RetrySignal` to re-run
//!    the pipeline against the same context, bounded by a hard ceiling.
//!
//! Executable code is registered up front in a `UnitRegistry` keyed by the
//! unit files' paths; discovery derives order, names and routes from the
//! filesystem and resolves the closures through the registry.

// Declare modules according to the planned structure
pub mod core;
pub mod convention;
pub mod discovery;
pub mod scanner;
pub mod feature;
pub mod scheduler;
pub mod registry;
pub mod error;

// --- Re-exports for the Public API ---

// Core types that users will interact with frequently
pub use crate::core::context::Context;
pub use crate::core::control::{ErrorDisposition, PipelineOutcome, RetrySignal, RETRY_HARD_CEILING};
pub use crate::core::http::{Body, HttpMethod, Request, Response};
pub use crate::core::unit::{
  async_task_fn, context_init_fn, error_handler_fn, step_fn, AsyncTaskFn, BoxFuture, ContextInitFn,
  ErrorHandlerFn, StepFn,
};

// Convention resolution and its injected cache
pub use crate::convention::{ConventionCache, ConventionResult};

// Discovery descriptors
pub use crate::discovery::{AsyncTaskDescriptor, StepDescriptor};

// Features and the produced interface
pub use crate::feature::{AnyFeature, Feature, FeatureConfig, FeatureInfo, RequestHandler};

// Scanner knobs
pub use crate::scanner::ScanOptions;

pub use crate::error::{OrchidError, OrchidResult};

// The orchid engine: unit registry plus route table
pub use crate::registry::{Orchid, Unit, UnitRegistry};
