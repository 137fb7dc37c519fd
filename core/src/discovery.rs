// orchid/src/discovery.rs

//! Loads ordered step units and unordered async-task units from a
//! directory into in-memory descriptors.
//!
//! Step files are named `<digits>-<description>.<ext>` so the execution
//! order of a pipeline is visible from a plain file listing, without
//! opening any file. Executables are resolved through the [`UnitRegistry`];
//! a file with no registered unit is the load-time equivalent of a module
//! whose export is not callable.

use crate::convention::UNIT_EXTENSIONS;
use crate::core::unit::{AsyncTaskFn, StepFn};
use crate::error::{OrchidError, OrchidResult};
use crate::registry::UnitRegistry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{event, instrument, Level};

/// One ordered unit of a feature's step pipeline.
#[derive(Clone)]
pub struct StepDescriptor {
  /// Ordinal extracted from the filename prefix. Unique within a feature.
  pub ordinal: u32,
  /// Display name: the filename between the ordinal dash and the extension.
  pub name: String,
  pub source: PathBuf,
  pub exec: StepFn,
}

impl std::fmt::Debug for StepDescriptor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDescriptor")
      .field("ordinal", &self.ordinal)
      .field("name", &self.name)
      .field("source", &self.source)
      .finish()
  }
}

/// One unordered background unit. Internally tasks run one at a time in
/// discovery order, but callers must not rely on that for correctness.
#[derive(Clone)]
pub struct AsyncTaskDescriptor {
  pub name: String,
  pub source: PathBuf,
  pub exec: AsyncTaskFn,
}

impl std::fmt::Debug for AsyncTaskDescriptor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AsyncTaskDescriptor")
      .field("name", &self.name)
      .field("source", &self.source)
      .finish()
  }
}

/// Splits a step filename into (ordinal digits, display name), rejecting
/// anything that does not match `<digits>-<rest>.<allowed extension>`.
fn parse_step_filename(file_name: &str) -> Option<(&str, &str)> {
  let (stem, ext) = file_name.rsplit_once('.')?;
  if !UNIT_EXTENSIONS.contains(&ext) {
    return None;
  }
  let (digits, rest) = stem.split_once('-')?;
  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  Some((digits, rest))
}

fn has_unit_extension(file_name: &str) -> bool {
  file_name
    .rsplit_once('.')
    .map(|(_, ext)| UNIT_EXTENSIONS.contains(&ext))
    .unwrap_or(false)
}

fn list_files(dir: &Path) -> OrchidResult<Vec<PathBuf>> {
  let entries = std::fs::read_dir(dir).map_err(|source| OrchidError::Io {
    path: dir.to_path_buf(),
    source,
  })?;
  let mut files = Vec::new();
  for entry in entries {
    let entry = entry.map_err(|source| OrchidError::Io {
      path: dir.to_path_buf(),
      source,
    })?;
    let path = entry.path();
    if path.is_file() {
      files.push(path);
    }
  }
  Ok(files)
}

/// Discovers the ordered step list of one feature.
///
/// Fails if the directory is missing, if no file matches the step naming
/// pattern, or if two files share an ordinal. The returned list is sorted
/// ascending by ordinal and is immutable from the caller's point of view.
#[instrument(name = "discovery::discover_steps", skip(units), fields(dir = %dir.display()), err(Display))]
pub fn discover_steps(dir: &Path, units: &UnitRegistry) -> OrchidResult<Vec<StepDescriptor>> {
  if !dir.is_dir() {
    return Err(OrchidError::MissingStepsDir { dir: dir.to_path_buf() });
  }

  let mut matched: Vec<(PathBuf, String)> = Vec::new();
  for path in list_files(dir)? {
    let file_name = match path.file_name() {
      Some(name) => name.to_string_lossy().into_owned(),
      None => continue,
    };
    if parse_step_filename(&file_name).is_some() {
      matched.push((path, file_name));
    } else {
      event!(Level::TRACE, file = %file_name, "Ignoring non-step file.");
    }
  }

  if matched.is_empty() {
    return Err(OrchidError::NoStepsFound { dir: dir.to_path_buf() });
  }

  let mut seen: HashMap<u32, String> = HashMap::new();
  let mut steps = Vec::with_capacity(matched.len());
  for (path, file_name) in matched {
    // The filter above guarantees the shape; a failed parse here means the
    // ordinal does not fit the ordinal type.
    let (digits, rest) = parse_step_filename(&file_name).ok_or_else(|| OrchidError::MalformedStepName {
      file: path.clone(),
    })?;
    let ordinal: u32 = digits.parse().map_err(|_| OrchidError::MalformedStepName {
      file: path.clone(),
    })?;

    if let Some(first) = seen.insert(ordinal, file_name.clone()) {
      return Err(OrchidError::DuplicateOrdinal {
        ordinal,
        first,
        second: file_name,
      });
    }

    let exec = units.step(&path)?;
    steps.push(StepDescriptor {
      ordinal,
      name: if rest.is_empty() { digits.to_string() } else { rest.to_string() },
      source: path,
      exec,
    });
  }

  steps.sort_by_key(|s| s.ordinal);
  event!(Level::DEBUG, count = steps.len(), "Steps discovered.");
  Ok(steps)
}

/// Discovers the async-task list of one feature. Async-tasks are optional,
/// so an absent directory yields an empty list. Files are taken in filename
/// order so discovery is deterministic across platforms.
#[instrument(name = "discovery::discover_async_tasks", skip(units), fields(dir = %dir.display()), err(Display))]
pub fn discover_async_tasks(dir: &Path, units: &UnitRegistry) -> OrchidResult<Vec<AsyncTaskDescriptor>> {
  if !dir.is_dir() {
    return Ok(Vec::new());
  }

  let mut files: Vec<PathBuf> = list_files(dir)?
    .into_iter()
    .filter(|p| {
      p.file_name()
        .map(|n| has_unit_extension(&n.to_string_lossy()))
        .unwrap_or(false)
    })
    .collect();
  files.sort();

  let mut tasks = Vec::with_capacity(files.len());
  for path in files {
    let name = path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.display().to_string());
    let exec = units.async_task(&path)?;
    tasks.push(AsyncTaskDescriptor {
      name,
      source: path,
      exec,
    });
  }

  event!(Level::DEBUG, count = tasks.len(), "Async-tasks discovered.");
  Ok(tasks)
}
