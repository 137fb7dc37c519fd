// examples/retry_handling.rs

//! A feature whose step fails twice before succeeding, recovered by an
//! error handler that answers each failure with a delayed, capped retry.
//!
//! Run with: `cargo run --example retry_handling`

use orchid::{
  error_handler_fn, Context, ErrorDisposition, Feature, HttpMethod, Orchid, Request, Response,
  RetrySignal,
};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn touch(path: &Path) -> anyhow::Result<()> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, b"")?;
  Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,orchid=debug".into()),
    )
    .init();

  let tmp = tempfile::tempdir()?;
  let steps_dir = tmp.path().join("steps");
  touch(&steps_dir.join("10-call-backend.rs"))?;

  let engine = Orchid::new();
  let units = engine.units();

  // Fails on the first two passes, succeeds on the third. The per-request
  // context survives every pass, so the attempt count can live there too.
  let backend_calls = Arc::new(AtomicUsize::new(0));
  let calls = backend_calls.clone();
  units.register_step(steps_dir.join("10-call-backend.rs"), move |ctx: Context, _req, res: Response| {
    let calls = calls.clone();
    async move {
      let pass = calls.fetch_add(1, Ordering::SeqCst) + 1;
      ctx.push("passes", pass as u64);
      if pass < 3 {
        anyhow::bail!("backend unavailable (pass {pass})")
      }
      res.send_json(200, json!({ "passes": ctx.get("passes") }));
      Ok(())
    }
  });

  let feature = Feature::new(HttpMethod::Get, "/flaky", units.clone())
    .with_steps_dir(&steps_dir)
    .with_error_handler(error_handler_fn(|err, _ctx, _req, _res| async move {
      println!("[handler] {err}, retrying in 100ms");
      Ok(ErrorDisposition::Retry(
        RetrySignal::new()
          .with_delay(Duration::from_millis(100))
          .with_max_attempts(5),
      ))
    }));
  engine.register(Arc::new(feature))?;

  let res = Response::new();
  engine
    .dispatch(Arc::new(Request::new(HttpMethod::Get, "/flaky")), res.clone())
    .await?;

  println!("-> {} {}", res.status(), res.body_json().unwrap_or_default());
  Ok(())
}
