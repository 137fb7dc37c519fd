// orchid/src/convention.rs

//! Pure mapping from a filesystem location to {method, route path, steps
//! dir, async-tasks dir}.
//!
//! A method directory is `@get`, `@post`, ... with the marker prefix
//! required, so ordinary resource names (a resource literally called
//! `steps` or `get`) can never be mistaken for a method folder. Dynamic
//! route segments are written `[name]` and map to `:name` parameters.

use crate::core::http::{parse_method_name, HttpMethod};
use crate::error::{OrchidError, OrchidResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{event, Level};

/// Directory name that roots a convention tree.
pub const FEATURES_DIR_NAME: &str = "features";
/// Prefix character marking a method directory (`@post`).
pub const METHOD_MARKER_PREFIX: char = '@';
/// Conventional subdirectory holding ordered step units.
pub const STEPS_DIR_NAME: &str = "steps";
/// Conventional subdirectory holding unordered async-task units.
pub const ASYNC_TASKS_DIR_NAME: &str = "async-tasks";
/// Filenames recognized as an explicit feature entry file.
pub const ENTRY_FILE_NAMES: &[&str] = &["feature.rs", "index.rs"];
/// Extensions accepted for step and async-task unit files.
pub const UNIT_EXTENSIONS: &[&str] = &["rs"];

/// Cache of `find_features_base_dir` results, keyed by search start path.
///
/// Read-mostly and append-only; entries are never invalidated except by the
/// explicit [`clear`](ConventionCache::clear) used for test isolation. The
/// engine owns one instance rather than the crate owning ambient global
/// state.
#[derive(Debug, Default)]
pub struct ConventionCache {
  base_dirs: RwLock<HashMap<PathBuf, PathBuf>>,
}

impl ConventionCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn clear(&self) {
    self.base_dirs.write().clear();
  }

  pub fn len(&self) -> usize {
    self.base_dirs.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.base_dirs.read().is_empty()
  }
}

/// Parses a directory name as a method marker, e.g. `@post` -> `POST`.
/// Case-insensitive in the method name; the marker prefix is mandatory.
pub fn method_from_marker(segment: &str) -> OrchidResult<HttpMethod> {
  let name = segment
    .strip_prefix(METHOD_MARKER_PREFIX)
    .ok_or_else(|| OrchidError::InvalidConvention {
      segment: segment.to_string(),
      reason: format!("missing '{METHOD_MARKER_PREFIX}' method marker prefix"),
    })?;
  parse_method_name(name, segment)
}

/// Infers the HTTP method from the final segment of `dir`.
pub fn infer_method(dir: &Path) -> OrchidResult<HttpMethod> {
  let segment = dir
    .file_name()
    .map(|s| s.to_string_lossy().into_owned())
    .ok_or_else(|| OrchidError::InvalidConvention {
      segment: dir.display().to_string(),
      reason: "directory has no final segment".to_string(),
    })?;
  method_from_marker(&segment)
}

/// Infers the route path from `dir` relative to `base`, dropping the
/// trailing method-marker segment and rewriting `[name]` segments into
/// `:name` parameters. The result always carries a single leading `/`.
pub fn infer_path(dir: &Path, base: &Path) -> OrchidResult<String> {
  let rel = dir.strip_prefix(base).map_err(|_| OrchidError::ConfigurationError {
    message: format!(
      "'{}' is not located under the features base '{}'",
      dir.display(),
      base.display()
    ),
  })?;

  let mut segments: Vec<String> = rel
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect();

  // The final segment is the method marker; the route is everything above it.
  match segments.pop() {
    Some(last) => {
      method_from_marker(&last)?;
    }
    None => {
      return Err(OrchidError::InvalidConvention {
        segment: dir.display().to_string(),
        reason: "path equals the features base; expected a method directory".to_string(),
      });
    }
  }

  let route: Vec<String> = segments.into_iter().map(|s| rewrite_segment(&s)).collect();
  Ok(format!("/{}", route.join("/")))
}

fn rewrite_segment(segment: &str) -> String {
  match segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
    Some(name) if !name.is_empty() => format!(":{name}"),
    _ => segment.to_string(),
  }
}

/// Returns the conventional steps directory under `feature_dir` if and only
/// if it exists and is a directory. Absence is not an error.
pub fn find_steps_dir(feature_dir: &Path) -> Option<PathBuf> {
  let candidate = feature_dir.join(STEPS_DIR_NAME);
  candidate.is_dir().then_some(candidate)
}

/// Returns the conventional async-tasks directory under `feature_dir` if
/// and only if it exists and is a directory. Absence is not an error.
pub fn find_async_tasks_dir(feature_dir: &Path) -> Option<PathBuf> {
  let candidate = feature_dir.join(ASYNC_TASKS_DIR_NAME);
  candidate.is_dir().then_some(candidate)
}

/// Walks parent directories upward from `start` looking for an ancestor
/// literally named [`FEATURES_DIR_NAME`]. Results are cached per `start`.
pub fn find_features_base_dir(start: &Path, cache: &ConventionCache) -> OrchidResult<PathBuf> {
  if let Some(hit) = cache.base_dirs.read().get(start) {
    return Ok(hit.clone());
  }

  for ancestor in start.ancestors() {
    if ancestor
      .file_name()
      .map(|n| n == FEATURES_DIR_NAME)
      .unwrap_or(false)
    {
      event!(
        Level::DEBUG,
        start = %start.display(),
        base = %ancestor.display(),
        "Resolved features base directory."
      );
      cache
        .base_dirs
        .write()
        .insert(start.to_path_buf(), ancestor.to_path_buf());
      return Ok(ancestor.to_path_buf());
    }
  }

  Err(OrchidError::MissingBaseDir {
    root_name: FEATURES_DIR_NAME.to_string(),
    start: start.to_path_buf(),
  })
}

/// Convention resolution for one method directory: method, route path and
/// the optional steps / async-tasks directories.
#[derive(Debug, Clone)]
pub struct ConventionResult {
  pub method: HttpMethod,
  pub path: String,
  pub steps_dir: Option<PathBuf>,
  pub async_tasks_dir: Option<PathBuf>,
}

/// Resolves the full convention for `dir`, a method-marker directory living
/// somewhere below a `features` root.
pub fn resolve(dir: &Path, cache: &ConventionCache) -> OrchidResult<ConventionResult> {
  let method = infer_method(dir)?;
  let base = find_features_base_dir(dir, cache)?;
  let path = infer_path(dir, &base)?;
  Ok(ConventionResult {
    method,
    path,
    steps_dir: find_steps_dir(dir),
    async_tasks_dir: find_async_tasks_dir(dir),
  })
}
