// orchid/src/feature/definition.rs

//! The `Feature` struct: construction, lazy unit discovery and the
//! produced-interface accessors. Execution lives in
//! `feature/execution.rs`.

use crate::core::http::{HttpMethod, Request, Response};
use crate::core::unit::{BoxFuture, ContextInitFn, ErrorHandlerFn, StepFn};
use crate::discovery::{discover_async_tasks, discover_steps, AsyncTaskDescriptor, StepDescriptor};
use crate::error::{OrchidError, OrchidResult};
use crate::feature::AnyFeature;
use crate::registry::UnitRegistry;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{event, Level};

/// Configuration an explicit entry file supplies. Everything is optional;
/// the convention resolver fills whatever is left unset.
#[derive(Clone, Default)]
pub struct FeatureConfig {
  pub method: Option<HttpMethod>,
  pub path: Option<String>,
  /// Steps directory override. Relative paths are resolved against the
  /// feature directory.
  pub steps_dir: Option<PathBuf>,
  /// Async-tasks directory override, resolved like `steps_dir`.
  pub async_tasks_dir: Option<PathBuf>,
  /// Ordered pre-pipeline middleware. Runs once per request, before the
  /// step pipeline, and is not re-entered on retry.
  pub middleware: Vec<StepFn>,
  pub initializer: Option<ContextInitFn>,
  pub error_handler: Option<ErrorHandlerFn>,
}

impl FeatureConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_method(mut self, method: HttpMethod) -> Self {
    self.method = Some(method);
    self
  }

  pub fn with_path(mut self, path: impl Into<String>) -> Self {
    self.path = Some(path.into());
    self
  }

  pub fn with_steps_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.steps_dir = Some(dir.into());
    self
  }

  pub fn with_async_tasks_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.async_tasks_dir = Some(dir.into());
    self
  }

  pub fn with_middleware(mut self, mw: StepFn) -> Self {
    self.middleware.push(mw);
    self
  }

  pub fn with_initializer(mut self, init: ContextInitFn) -> Self {
    self.initializer = Some(init);
    self
  }

  pub fn with_error_handler(mut self, handler: ErrorHandlerFn) -> Self {
    self.error_handler = Some(handler);
    self
  }
}

impl std::fmt::Debug for FeatureConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FeatureConfig")
      .field("method", &self.method)
      .field("path", &self.path)
      .field("steps_dir", &self.steps_dir)
      .field("async_tasks_dir", &self.async_tasks_dir)
      .field("middleware_count", &self.middleware.len())
      .field("has_initializer", &self.initializer.is_some())
      .field("has_error_handler", &self.error_handler.is_some())
      .finish()
  }
}

/// Route info exposed to the surrounding transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureInfo {
  pub method: HttpMethod,
  pub path: String,
  pub step_count: usize,
  pub async_task_count: usize,
  pub has_error_handler: bool,
}

/// Units discovered for one feature. Populated once, then immutable.
#[derive(Debug)]
pub(crate) struct LoadedUnits {
  pub(crate) steps: Vec<StepDescriptor>,
  pub(crate) tasks: Vec<AsyncTaskDescriptor>,
}

/// The produced interface: a single callable the transport layer can hold.
pub type RequestHandler =
  Arc<dyn Fn(Arc<Request>, Response) -> BoxFuture<OrchidResult<()>> + Send + Sync>;

/// One route's complete configuration. Method and path are resolved once,
/// from explicit configuration or from the convention resolver, and are
/// immutable after construction. Unit discovery happens lazily, at most
/// once.
pub struct Feature {
  method: HttpMethod,
  path: String,
  pub(crate) steps_dir: Option<PathBuf>,
  pub(crate) async_tasks_dir: Option<PathBuf>,
  pub(crate) middleware: Vec<StepFn>,
  pub(crate) initializer: Option<ContextInitFn>,
  pub(crate) error_handler: Option<ErrorHandlerFn>,
  units: UnitRegistry,
  loaded: OnceCell<LoadedUnits>,
}

impl Feature {
  pub fn new(method: HttpMethod, path: impl Into<String>, units: UnitRegistry) -> Self {
    Self {
      method,
      path: path.into(),
      steps_dir: None,
      async_tasks_dir: None,
      middleware: Vec::new(),
      initializer: None,
      error_handler: None,
      units,
      loaded: OnceCell::new(),
    }
  }

  pub fn with_steps_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.steps_dir = Some(dir.into());
    self
  }

  pub fn with_async_tasks_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.async_tasks_dir = Some(dir.into());
    self
  }

  pub fn with_middleware(mut self, mw: StepFn) -> Self {
    self.middleware.push(mw);
    self
  }

  pub fn with_initializer(mut self, init: ContextInitFn) -> Self {
    self.initializer = Some(init);
    self
  }

  pub fn with_error_handler(mut self, handler: ErrorHandlerFn) -> Self {
    self.error_handler = Some(handler);
    self
  }

  pub fn method(&self) -> HttpMethod {
    self.method
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  /// Discovers steps and async-tasks, memoized by the `loaded` cell. A
  /// concurrent first call may duplicate the discovery work; discovery is
  /// idempotent and only one result is ever kept.
  pub(crate) fn loaded(&self) -> OrchidResult<&LoadedUnits> {
    self.loaded.get_or_try_init(|| {
      event!(
        Level::DEBUG,
        method = %self.method,
        path = %self.path,
        "Initializing feature units."
      );
      let steps = match &self.steps_dir {
        Some(dir) => discover_steps(dir, &self.units)?,
        None => Vec::new(),
      };
      let tasks = match &self.async_tasks_dir {
        Some(dir) => discover_async_tasks(dir, &self.units)?,
        None => Vec::new(),
      };
      Ok::<_, OrchidError>(LoadedUnits { steps, tasks })
    })
  }

  /// The produced interface: one callable of shape
  /// `(request, response) -> future`.
  pub fn handler(self: Arc<Self>) -> RequestHandler {
    Arc::new(move |req, res| {
      let feature = Arc::clone(&self);
      Box::pin(async move { feature.run(req, res).await })
    })
  }
}

impl std::fmt::Debug for Feature {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Feature")
      .field("method", &self.method)
      .field("path", &self.path)
      .field("steps_dir", &self.steps_dir)
      .field("async_tasks_dir", &self.async_tasks_dir)
      .field("initialized", &self.loaded.get().is_some())
      .finish()
  }
}

#[async_trait::async_trait]
impl AnyFeature for Feature {
  fn method(&self) -> HttpMethod {
    self.method
  }

  fn path(&self) -> &str {
    &self.path
  }

  async fn handle(&self, req: Arc<Request>, res: Response) -> OrchidResult<()> {
    self.run(req, res).await
  }

  fn info(&self) -> OrchidResult<FeatureInfo> {
    let loaded = self.loaded()?;
    Ok(FeatureInfo {
      method: self.method,
      path: self.path.clone(),
      step_count: loaded.steps.len(),
      async_task_count: loaded.tasks.len(),
      has_error_handler: self.error_handler.is_some(),
    })
  }

  fn initialize(&self) -> OrchidResult<()> {
    self.loaded()?;
    Ok(())
  }
}
