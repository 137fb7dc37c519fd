// orchid/src/scanner.rs

//! Recursive feature discovery over a convention tree.
//!
//! At each directory: an explicit entry file (`feature.rs` / `index.rs`)
//! wins and claims the directory; otherwise a method-marker directory that
//! directly contains a `steps/` or `async-tasks/` subdirectory becomes an
//! implicit feature. A single malformed feature is logged and skipped;
//! it must never abort discovery of the rest of the tree.

use crate::convention::{
  self, find_async_tasks_dir, find_features_base_dir, find_steps_dir, method_from_marker,
  ConventionCache, ENTRY_FILE_NAMES,
};
use crate::error::{OrchidError, OrchidResult};
use crate::feature::{Feature, FeatureConfig};
use crate::registry::UnitRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Scanner knobs. The exclude list keeps build output and VCS metadata out
/// of the walk.
#[derive(Debug, Clone)]
pub struct ScanOptions {
  pub exclude: Vec<String>,
}

impl Default for ScanOptions {
  fn default() -> Self {
    Self {
      exclude: vec![".git".to_string(), "target".to_string(), "node_modules".to_string()],
    }
  }
}

/// Walks `root` recursively and builds one feature per discovered route.
#[instrument(name = "scanner::scan_features", skip(units, cache, options), fields(root = %root.display()), err(Display))]
pub fn scan_features(
  root: &Path,
  units: &UnitRegistry,
  cache: &ConventionCache,
  options: &ScanOptions,
) -> OrchidResult<Vec<Feature>> {
  if !root.is_dir() {
    return Err(OrchidError::ConfigurationError {
      message: format!("scan root '{}' is not a directory", root.display()),
    });
  }
  let mut features = Vec::new();
  scan_dir(root, units, cache, options, &mut features)?;
  event!(Level::INFO, count = features.len(), "Feature scan finished.");
  Ok(features)
}

fn scan_dir(
  dir: &Path,
  units: &UnitRegistry,
  cache: &ConventionCache,
  options: &ScanOptions,
  features: &mut Vec<Feature>,
) -> OrchidResult<()> {
  // (1) Explicit feature: an entry file claims the whole directory.
  if let Some(entry_path) = find_entry_file(dir) {
    match build_explicit(dir, &entry_path, units, cache) {
      Ok(feature) => {
        event!(
          Level::DEBUG,
          method = %feature.method(),
          path = %feature.path(),
          dir = %dir.display(),
          "Explicit feature discovered."
        );
        features.push(feature);
        return Ok(());
      }
      Err(e) => {
        // One malformed feature must not take down the rest of the scan.
        event!(
          Level::WARN,
          error = %e,
          entry = %entry_path.display(),
          "Skipping malformed explicit feature."
        );
      }
    }
  }

  // (2) Implicit feature: a method-marker directory with steps or
  // async-tasks directly inside, no entry file required.
  let mut skip_children: Vec<PathBuf> = Vec::new();
  let dir_name = dir.file_name().map(|n| n.to_string_lossy().into_owned());
  if let Some(name) = &dir_name {
    if method_from_marker(name).is_ok() {
      let steps = find_steps_dir(dir);
      let tasks = find_async_tasks_dir(dir);
      if steps.is_some() || tasks.is_some() {
        match build_implicit(dir, units, cache) {
          Ok(feature) => {
            event!(
              Level::DEBUG,
              method = %feature.method(),
              path = %feature.path(),
              dir = %dir.display(),
              "Implicit feature discovered."
            );
            features.push(feature);
            // The feature's own unit directories are not resources.
            skip_children.extend(steps);
            skip_children.extend(tasks);
          }
          Err(e) => {
            event!(Level::WARN, error = %e, dir = %dir.display(), "Skipping malformed implicit feature.");
          }
        }
      }
    }
  }

  // (3) Recurse into remaining subdirectories.
  let entries = std::fs::read_dir(dir).map_err(|source| OrchidError::Io {
    path: dir.to_path_buf(),
    source,
  })?;
  let mut children: Vec<PathBuf> = Vec::new();
  for entry in entries {
    let entry = entry.map_err(|source| OrchidError::Io {
      path: dir.to_path_buf(),
      source,
    })?;
    let path = entry.path();
    if path.is_dir() {
      children.push(path);
    }
  }
  children.sort();

  for child in children {
    let name = match child.file_name() {
      Some(n) => n.to_string_lossy().into_owned(),
      None => continue,
    };
    if options.exclude.iter().any(|ex| ex == &name) {
      event!(Level::TRACE, dir = %child.display(), "Excluded from scan.");
      continue;
    }
    if skip_children.iter().any(|skip| skip == &child) {
      continue;
    }
    scan_dir(&child, units, cache, options, features)?;
  }

  Ok(())
}

fn find_entry_file(dir: &Path) -> Option<PathBuf> {
  ENTRY_FILE_NAMES
    .iter()
    .map(|name| dir.join(name))
    .find(|candidate| candidate.is_file())
}

/// Builds a feature from an entry file, with the convention resolver
/// filling in whatever the configuration leaves unset. A feature defined
/// outside the convention root must supply explicit method and path;
/// otherwise it is unusable and reported as such.
fn build_explicit(
  dir: &Path,
  entry_path: &Path,
  units: &UnitRegistry,
  cache: &ConventionCache,
) -> OrchidResult<Feature> {
  let config = units.feature_config(entry_path)?;
  let (method, path) = resolve_route(dir, &config, cache)?;

  let steps_dir = match &config.steps_dir {
    Some(dir_override) => Some(absolutize(dir, dir_override)),
    None => find_steps_dir(dir),
  };
  let async_tasks_dir = match &config.async_tasks_dir {
    Some(dir_override) => Some(absolutize(dir, dir_override)),
    None => find_async_tasks_dir(dir),
  };

  let mut feature = Feature::new(method, path, units.clone());
  if let Some(d) = steps_dir {
    feature = feature.with_steps_dir(d);
  }
  if let Some(d) = async_tasks_dir {
    feature = feature.with_async_tasks_dir(d);
  }
  for mw in &config.middleware {
    feature = feature.with_middleware(Arc::clone(mw));
  }
  if let Some(init) = &config.initializer {
    feature = feature.with_initializer(Arc::clone(init));
  }
  if let Some(handler) = &config.error_handler {
    feature = feature.with_error_handler(Arc::clone(handler));
  }
  Ok(feature)
}

fn build_implicit(dir: &Path, units: &UnitRegistry, cache: &ConventionCache) -> OrchidResult<Feature> {
  let resolved = convention::resolve(dir, cache)?;
  let mut feature = Feature::new(resolved.method, resolved.path, units.clone());
  if let Some(d) = resolved.steps_dir {
    feature = feature.with_steps_dir(d);
  }
  if let Some(d) = resolved.async_tasks_dir {
    feature = feature.with_async_tasks_dir(d);
  }
  Ok(feature)
}

fn resolve_route(
  dir: &Path,
  config: &FeatureConfig,
  cache: &ConventionCache,
) -> OrchidResult<(crate::core::http::HttpMethod, String)> {
  let method = match config.method {
    Some(m) => m,
    None => convention::infer_method(dir)?,
  };
  let path = match &config.path {
    Some(p) => p.clone(),
    None => {
      let base = find_features_base_dir(dir, cache)?;
      convention::infer_path(dir, &base)?
    }
  };
  Ok((method, path))
}

fn absolutize(feature_dir: &Path, configured: &Path) -> PathBuf {
  if configured.is_absolute() {
    configured.to_path_buf()
  } else {
    feature_dir.join(configured)
  }
}
