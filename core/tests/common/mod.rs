// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use once_cell::sync::Lazy;
use orchid::{Context, HttpMethod, Request, Response, UnitRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

// --- Helper for Tracing Setup (call once per test run if needed) ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Filesystem scaffolding ---

/// Creates an empty file (and any missing parent directories). Unit files
/// only need to exist; their executables come from the registry.
pub fn touch(path: &Path) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).expect("create parent dirs");
  }
  std::fs::write(path, b"").expect("create unit file");
}

pub fn mkdirs(path: &Path) -> PathBuf {
  std::fs::create_dir_all(path).expect("create dirs");
  path.to_path_buf()
}

// --- Request helpers ---

pub fn request(method: HttpMethod, path: &str) -> Arc<Request> {
  Arc::new(Request::new(method, path))
}

pub fn request_with_body(method: HttpMethod, path: &str, body: serde_json::Value) -> Arc<Request> {
  Arc::new(Request::new(method, path).with_body(body))
}

// --- Step registrations ---

/// A step that appends `label` to the `log` array in the context.
pub fn register_log_step(units: &UnitRegistry, path: impl AsRef<Path>, label: &'static str) {
  units.register_step(path, move |ctx: Context, _req, _res| async move {
    ctx.push("log", label);
    Ok(())
  });
}

/// A step that appends `label` to the log and then sends the accumulated
/// log as a JSON response with the given status.
pub fn register_sending_step(units: &UnitRegistry, path: impl AsRef<Path>, label: &'static str, status: u16) {
  units.register_step(path, move |ctx: Context, _req, res: Response| async move {
    ctx.push("log", label);
    let log = ctx.get("log").unwrap_or(serde_json::Value::Null);
    res.send_json(status, serde_json::json!({ "log": log }));
    Ok(())
  });
}

/// A step that appends `label` to the log and then fails.
pub fn register_failing_step(units: &UnitRegistry, path: impl AsRef<Path>, label: &'static str, msg: &'static str) {
  units.register_step(path, move |ctx: Context, _req, _res| async move {
    ctx.push("log", label);
    anyhow::bail!(msg)
  });
}

// --- Async-task registrations ---

/// A task that reports `label` over the channel and optionally fails after.
pub fn register_notify_task(
  units: &UnitRegistry,
  path: impl AsRef<Path>,
  tx: tokio::sync::mpsc::UnboundedSender<&'static str>,
  label: &'static str,
  fail: bool,
) {
  units.register_async_task(path, move |_ctx: Context| {
    let tx = tx.clone();
    async move {
      tx.send(label).ok();
      if fail {
        anyhow::bail!("task {label} failed")
      }
      Ok(())
    }
  });
}

/// Collects the context's `log` array as strings, for assertions.
pub fn log_entries(ctx: &Context) -> Vec<String> {
  match ctx.get("log") {
    Some(serde_json::Value::Array(items)) => items
      .into_iter()
      .map(|v| v.as_str().unwrap_or_default().to_string())
      .collect(),
    _ => Vec::new(),
  }
}
