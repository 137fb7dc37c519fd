// examples/basic_feature.rs

//! Scaffolds a small convention tree, registers the unit executables,
//! scans it and dispatches one request.
//!
//! Run with: `cargo run --example basic_feature`

use orchid::{Context, HttpMethod, Orchid, Request, Response};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

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

  // The directory layout IS the routing table: features/orders/@post
  // becomes `POST /orders`, and its steps/ directory is the pipeline.
  let tmp = tempfile::tempdir()?;
  let root = tmp.path().join("features");
  let feature = root.join("orders/@post");
  touch(&feature.join("steps/10-validate.rs"))?;
  touch(&feature.join("steps/20-save.rs"))?;
  touch(&feature.join("steps/30-respond.rs"))?;
  touch(&feature.join("async-tasks/send-confirmation.rs"))?;

  let engine = Orchid::new();
  let units = engine.units();

  units.register_step(feature.join("steps/10-validate.rs"), |ctx: Context, req, _res| async move {
    let qty = req
      .body
      .as_ref()
      .and_then(|b| b.get("qty"))
      .and_then(|q| q.as_u64())
      .ok_or_else(|| anyhow::anyhow!("body must carry a numeric qty"))?;
    ctx.insert("qty", qty);
    Ok(())
  });

  units.register_step(feature.join("steps/20-save.rs"), |ctx: Context, _req, _res| async move {
    // A real step would talk to storage here.
    ctx.insert("order_id", "ord_1001");
    Ok(())
  });

  units.register_step(feature.join("steps/30-respond.rs"), |ctx: Context, _req, res: Response| async move {
    res.send_json(
      201,
      json!({ "id": ctx.get_str("order_id"), "qty": ctx.get_u64("qty") }),
    );
    Ok(())
  });

  units.register_async_task(feature.join("async-tasks/send-confirmation.rs"), |ctx: Context| async move {
    println!(
      "[task] confirmation queued for {}",
      ctx.get_str("order_id").unwrap_or_default()
    );
    Ok(())
  });

  let registered = engine.scan(&root)?;
  println!("scanned {registered} feature(s):");
  for (method, path) in engine.routes() {
    println!("  {method} {path}");
  }

  let req = Arc::new(Request::new(HttpMethod::Post, "/orders").with_body(json!({ "qty": 2 })));
  let res = Response::new();
  engine.dispatch(req, res.clone()).await?;

  println!("-> {} {}", res.status(), res.body_json().unwrap_or_default());

  // Give the detached confirmation task a moment to run.
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;
  Ok(())
}
