// orchid/src/error.rs

//! The crate-wide error enum, covering the three failure families:
//! convention errors (discovery/initialization time), execution errors
//! (a step or middleware unit failed mid-request) and protocol errors
//! (the pipeline finished in a state the contract forbids).

use crate::core::context::Context;
use crate::core::http::HttpMethod;
use anyhow::Error as AnyhowError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchidError {
  // --- Convention errors (fail fast, before any request is served) ---
  #[error("Invalid convention in '{segment}': {reason}")]
  InvalidConvention { segment: String, reason: String },

  #[error("No '{root_name}' ancestor directory found above '{start}'")]
  MissingBaseDir { root_name: String, start: PathBuf },

  #[error("Steps directory does not exist: '{dir}'")]
  MissingStepsDir { dir: PathBuf },

  #[error("No step files matching '<digits>-<name>.<ext>' found in '{dir}'")]
  NoStepsFound { dir: PathBuf },

  #[error("Malformed step filename '{file}': expected '<digits>-<name>.<ext>'")]
  MalformedStepName { file: PathBuf },

  #[error("I/O failure at '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Duplicate step ordinal {ordinal}: '{first}' conflicts with '{second}'")]
  DuplicateOrdinal {
    ordinal: u32,
    first: String,
    second: String,
  },

  #[error("No executable unit registered for '{path}'")]
  UnitNotRegistered { path: PathBuf },

  #[error("Unit registered for '{path}' is not a {expected}")]
  UnitKindMismatch {
    path: PathBuf,
    expected: &'static str,
  },

  #[error("Route collision: {method} {path} is already registered")]
  RouteCollision { method: HttpMethod, path: String },

  #[error("Feature configuration error: {message}")]
  ConfigurationError { message: String },

  // --- Execution errors (wrapped and handed to the error handler) ---
  #[error("Step {ordinal} '{name}' failed. Source: {source}")]
  StepFailure {
    ordinal: u32,
    name: String,
    context: Context,
    #[source]
    source: AnyhowError,
  },

  #[error("Middleware {index} failed. Source: {source}")]
  MiddlewareFailure {
    index: usize,
    #[source]
    source: AnyhowError,
  },

  #[error("Context initializer failed. Source: {source}")]
  InitializerFailure {
    #[source]
    source: AnyhowError,
  },

  // --- Protocol errors ---
  #[error("Pipeline for {method} {path} completed without producing a response")]
  NoResponse { method: HttpMethod, path: String },

  #[error("No feature registered for {method} {path}")]
  RouteNotFound { method: HttpMethod, path: String },

  #[error("Internal orchid error: {0}")]
  Internal(String),
}

impl OrchidError {
  /// True for the error family produced while executing user units, i.e.
  /// the errors the configured error handler is given a chance to recover.
  pub fn is_execution_error(&self) -> bool {
    matches!(
      self,
      OrchidError::StepFailure { .. }
        | OrchidError::MiddlewareFailure { .. }
        | OrchidError::InitializerFailure { .. }
        | OrchidError::NoResponse { .. }
    )
  }
}

// The key conversion orchid provides for external errors: user units return
// anyhow::Error, and an anyhow chain that already carries an OrchidError
// pipeline wrap must not be wrapped a second time.
impl From<AnyhowError> for OrchidError {
  fn from(err: AnyhowError) -> Self {
    match err.downcast::<OrchidError>() {
      Ok(orchid_err) => orchid_err,
      Err(other) => OrchidError::Internal(format!("{other:#}")),
    }
  }
}

pub type OrchidResult<T, E = OrchidError> = std::result::Result<T, E>;
