// orchid/src/registry.rs

//! The `UnitRegistry` mapping unit source paths to executables, and the
//! `Orchid` engine: a route-keyed registry of features with scan, dispatch
//! and lifecycle operations.
//!
//! In a dynamic language the convention layer would load each discovered
//! file and take its export; in a statically linked crate the executables
//! are ordinary closures registered up front against the paths the
//! convention tree exposes. Discovery derives order and names from the
//! filesystem and resolves the code through this registry.

use crate::convention::ConventionCache;
use crate::core::context::Context;
use crate::core::http::{HttpMethod, Request, Response};
use crate::core::unit::{async_task_fn, step_fn, AsyncTaskFn, StepFn};
use crate::error::{OrchidError, OrchidResult};
use crate::core::unit::BoxFuture;
use crate::feature::{AnyFeature, FeatureConfig, FeatureInfo};
use crate::scanner::{scan_features, ScanOptions};
use parking_lot::RwLock;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// An executable unit bound to a source path.
#[derive(Clone)]
pub enum Unit {
  Step(StepFn),
  AsyncTask(AsyncTaskFn),
  Feature(Arc<FeatureConfig>),
}

impl Unit {
  fn kind(&self) -> &'static str {
    match self {
      Unit::Step(_) => "step",
      Unit::AsyncTask(_) => "async-task",
      Unit::Feature(_) => "feature",
    }
  }
}

/// Thread-safe, cheaply cloned map from unit source path to executable.
///
/// Paths are canonicalized when the file exists so that registration and
/// discovery agree on the key regardless of how each spelled the path.
#[derive(Clone, Default)]
pub struct UnitRegistry {
  inner: Arc<RwLock<HashMap<PathBuf, Unit>>>,
}

impl UnitRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  fn key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
  }

  pub fn register(&self, path: impl AsRef<Path>, unit: Unit) {
    let key = Self::key(path.as_ref());
    event!(Level::DEBUG, path = %key.display(), kind = unit.kind(), "Registering unit.");
    self.inner.write().insert(key, unit);
  }

  /// Registers a step executable for the given unit file.
  pub fn register_step<F, Fut>(&self, path: impl AsRef<Path>, f: F)
  where
    F: Fn(Context, Arc<Request>, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    self.register(path, Unit::Step(step_fn(f)));
  }

  /// Registers an async-task executable for the given unit file.
  pub fn register_async_task<F, Fut>(&self, path: impl AsRef<Path>, f: F)
  where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    self.register(path, Unit::AsyncTask(async_task_fn(f)));
  }

  /// Registers the configuration module behind an explicit entry file.
  pub fn register_feature(&self, path: impl AsRef<Path>, config: FeatureConfig) {
    self.register(path, Unit::Feature(Arc::new(config)));
  }

  pub fn contains(&self, path: impl AsRef<Path>) -> bool {
    self.inner.read().contains_key(&Self::key(path.as_ref()))
  }

  pub fn len(&self) -> usize {
    self.inner.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.read().is_empty()
  }

  pub fn clear(&self) {
    self.inner.write().clear();
  }

  pub(crate) fn step(&self, path: &Path) -> OrchidResult<StepFn> {
    match self.inner.read().get(&Self::key(path)) {
      Some(Unit::Step(f)) => Ok(f.clone()),
      Some(other) => {
        event!(Level::ERROR, path = %path.display(), found = other.kind(), "Unit kind mismatch.");
        Err(OrchidError::UnitKindMismatch {
          path: path.to_path_buf(),
          expected: "step",
        })
      }
      None => Err(OrchidError::UnitNotRegistered {
        path: path.to_path_buf(),
      }),
    }
  }

  pub(crate) fn async_task(&self, path: &Path) -> OrchidResult<AsyncTaskFn> {
    match self.inner.read().get(&Self::key(path)) {
      Some(Unit::AsyncTask(f)) => Ok(f.clone()),
      Some(_) => Err(OrchidError::UnitKindMismatch {
        path: path.to_path_buf(),
        expected: "async-task",
      }),
      None => Err(OrchidError::UnitNotRegistered {
        path: path.to_path_buf(),
      }),
    }
  }

  pub(crate) fn feature_config(&self, path: &Path) -> OrchidResult<Arc<FeatureConfig>> {
    match self.inner.read().get(&Self::key(path)) {
      Some(Unit::Feature(cfg)) => Ok(cfg.clone()),
      Some(_) => Err(OrchidError::UnitKindMismatch {
        path: path.to_path_buf(),
        expected: "feature",
      }),
      None => Err(OrchidError::UnitNotRegistered {
        path: path.to_path_buf(),
      }),
    }
  }
}

/// The orchid engine: unit registry, convention cache and route table.
pub struct Orchid {
  units: UnitRegistry,
  cache: ConventionCache,
  options: ScanOptions,
  routes: RwLock<HashMap<(HttpMethod, String), Arc<dyn AnyFeature>>>,
}

impl Orchid {
  pub fn new() -> Self {
    Self::with_options(ScanOptions::default())
  }

  pub fn with_options(options: ScanOptions) -> Self {
    Self {
      units: UnitRegistry::new(),
      cache: ConventionCache::new(),
      options,
      routes: RwLock::new(HashMap::new()),
    }
  }

  pub fn units(&self) -> &UnitRegistry {
    &self.units
  }

  pub fn convention_cache(&self) -> &ConventionCache {
    &self.cache
  }

  /// Scans a convention tree and registers every discovered feature.
  /// A feature that fails to register (route collision) is logged and
  /// skipped, consistent with the per-feature failure policy of the
  /// scanner itself. Returns the number of features registered.
  #[instrument(name = "Orchid::scan", skip(self), fields(root = %root.as_ref().display()), err(Display))]
  pub fn scan(&self, root: impl AsRef<Path>) -> OrchidResult<usize> {
    let features = scan_features(root.as_ref(), &self.units, &self.cache, &self.options)?;
    let mut registered = 0;
    for feature in features {
      match self.register(Arc::new(feature)) {
        Ok(()) => registered += 1,
        Err(e) => {
          event!(Level::WARN, error = %e, "Skipping feature that failed to register.");
        }
      }
    }
    event!(Level::INFO, registered, "Scan complete.");
    Ok(registered)
  }

  /// Registers a feature (or any hand-written [`AnyFeature`]) under its
  /// method and path. Duplicate routes are rejected.
  pub fn register(&self, feature: Arc<dyn AnyFeature>) -> OrchidResult<()> {
    let method = feature.method();
    let path = feature.path().to_string();
    let mut routes = self.routes.write();
    if routes.contains_key(&(method, path.clone())) {
      return Err(OrchidError::RouteCollision { method, path });
    }
    event!(Level::DEBUG, %method, %path, "Route registered.");
    routes.insert((method, path), feature);
    Ok(())
  }

  /// Registers a bare request handler under a route, bypassing the
  /// convention machinery entirely. Useful for health checks and other
  /// routes too small to deserve a feature directory.
  pub fn register_handler<F, Fut>(
    &self,
    method: HttpMethod,
    path: impl Into<String>,
    f: F,
  ) -> OrchidResult<()>
  where
    F: Fn(Arc<Request>, Response) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = OrchidResult<()>> + Send + 'static,
  {
    self.register(Arc::new(HandlerFeature {
      method,
      path: path.into(),
      handler: Box::new(move |req, res| Box::pin(f(req, res))),
    }))
  }

  /// Looks up the feature registered for an exact `{method, path}` key.
  /// Parameterized path matching belongs to the router in front of the
  /// engine; route paths here may contain `:name` segments verbatim.
  pub fn feature(&self, method: HttpMethod, path: &str) -> Option<Arc<dyn AnyFeature>> {
    self.routes.read().get(&(method, path.to_string())).cloned()
  }

  /// Sorted route table, mainly for startup logging.
  pub fn routes(&self) -> Vec<(HttpMethod, String)> {
    let mut routes: Vec<(HttpMethod, String)> = self.routes.read().keys().cloned().collect();
    routes.sort_by(|a, b| (a.1.as_str(), a.0.as_str()).cmp(&(b.1.as_str(), b.0.as_str())));
    routes
  }

  /// Route infos for every registered feature. Forces initialization, so
  /// this also doubles as a readiness probe.
  pub fn infos(&self) -> OrchidResult<Vec<FeatureInfo>> {
    let features: Vec<Arc<dyn AnyFeature>> = self.routes.read().values().cloned().collect();
    let mut infos = Vec::with_capacity(features.len());
    for feature in features {
      infos.push(feature.info()?);
    }
    infos.sort_by(|a, b| (a.path.clone(), a.method.as_str()).cmp(&(b.path.clone(), b.method.as_str())));
    Ok(infos)
  }

  /// Eagerly initializes every registered feature so convention errors
  /// surface at startup instead of on a feature's first request.
  pub fn initialize_all(&self) -> OrchidResult<()> {
    let features: Vec<Arc<dyn AnyFeature>> = self.routes.read().values().cloned().collect();
    for feature in features {
      feature.initialize()?;
    }
    Ok(())
  }

  /// Clears the convention cache. Test-isolation hook; discovered feature
  /// descriptors are per-feature and stay memoized.
  pub fn clear_caches(&self) {
    self.cache.clear();
  }

  /// Dispatches one request to the feature registered under its exact
  /// method and path, guaranteeing a well-formed response even on failure:
  /// 404 for an unknown route, 500 when a feature propagates an error
  /// without having responded.
  #[instrument(name = "Orchid::dispatch", skip_all, fields(method = %req.method, path = %req.path))]
  pub async fn dispatch(&self, req: Arc<Request>, res: Response) -> OrchidResult<()> {
    let Some(feature) = self.feature(req.method, &req.path) else {
      event!(Level::DEBUG, "No feature for route.");
      res.send_json(404, json!({ "error": "not found" }));
      return Err(OrchidError::RouteNotFound {
        method: req.method,
        path: req.path.clone(),
      });
    };

    let outcome = feature.handle(req, res.clone()).await;
    if let Err(e) = &outcome {
      event!(Level::ERROR, error = %e, "Feature failed.");
      if !res.is_sent() {
        res.send_json(500, json!({ "error": "internal server error" }));
      }
    }
    outcome
  }
}

impl Default for Orchid {
  fn default() -> Self {
    Self::new()
  }
}

/// A route backed by a plain closure instead of a convention directory.
struct HandlerFeature {
  method: HttpMethod,
  path: String,
  handler: Box<dyn Fn(Arc<Request>, Response) -> BoxFuture<OrchidResult<()>> + Send + Sync>,
}

#[async_trait::async_trait]
impl AnyFeature for HandlerFeature {
  fn method(&self) -> HttpMethod {
    self.method
  }

  fn path(&self) -> &str {
    &self.path
  }

  async fn handle(&self, req: Arc<Request>, res: Response) -> OrchidResult<()> {
    (self.handler)(req, res).await
  }

  fn info(&self) -> OrchidResult<FeatureInfo> {
    Ok(FeatureInfo {
      method: self.method,
      path: self.path.clone(),
      step_count: 0,
      async_task_count: 0,
      has_error_handler: false,
    })
  }

  fn initialize(&self) -> OrchidResult<()> {
    Ok(())
  }
}
