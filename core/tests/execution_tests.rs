// tests/execution_tests.rs
mod common;

use common::*;
use orchid::{
  step_fn, AnyFeature, Context, Feature, HttpMethod, OrchidError, RequestHandler, Response,
  UnitRegistry,
};
use serde_json::json;
use std::sync::Arc;

fn scaffold() -> (tempfile::TempDir, UnitRegistry) {
  (tempfile::tempdir().unwrap(), UnitRegistry::new())
}

#[tokio::test]
async fn steps_run_in_ordinal_order_against_one_context() {
  setup_tracing();
  let (tmp, units) = scaffold();
  let steps_dir = mkdirs(&tmp.path().join("steps"));

  touch(&steps_dir.join("100-first.rs"));
  touch(&steps_dir.join("200-second.rs"));
  touch(&steps_dir.join("300-respond.rs"));
  register_log_step(&units, steps_dir.join("100-first.rs"), "first");
  register_log_step(&units, steps_dir.join("200-second.rs"), "second");
  register_sending_step(&units, steps_dir.join("300-respond.rs"), "respond", 200);

  let feature = Feature::new(HttpMethod::Get, "/ordered", units.clone()).with_steps_dir(&steps_dir);
  let res = Response::new();
  feature.handle(request(HttpMethod::Get, "/ordered"), res.clone()).await.unwrap();

  assert_eq!(res.status(), 200);
  assert_eq!(
    res.body_json().unwrap(),
    json!({ "log": ["first", "second", "respond"] })
  );
}

#[tokio::test]
async fn early_exit_prevents_subsequent_steps() {
  setup_tracing();
  let (tmp, units) = scaffold();
  let steps_dir = mkdirs(&tmp.path().join("steps"));

  touch(&steps_dir.join("10-first.rs"));
  touch(&steps_dir.join("20-answer.rs"));
  touch(&steps_dir.join("30-never.rs"));
  register_log_step(&units, steps_dir.join("10-first.rs"), "first");
  register_sending_step(&units, steps_dir.join("20-answer.rs"), "answer", 202);
  register_log_step(&units, steps_dir.join("30-never.rs"), "never");

  let feature = Feature::new(HttpMethod::Get, "/short", units.clone()).with_steps_dir(&steps_dir);
  let res = Response::new();
  feature.handle(request(HttpMethod::Get, "/short"), res.clone()).await.unwrap();

  assert_eq!(res.status(), 202);
  // The log inside the response was taken at send time: two entries, and
  // the third step must not have run afterwards either.
  assert_eq!(res.body_json().unwrap(), json!({ "log": ["first", "answer"] }));
}

#[tokio::test]
async fn completing_without_a_response_is_a_protocol_error() {
  setup_tracing();
  let (tmp, units) = scaffold();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  touch(&steps_dir.join("10-quiet.rs"));
  register_log_step(&units, steps_dir.join("10-quiet.rs"), "quiet");

  let feature = Feature::new(HttpMethod::Get, "/mute", units.clone()).with_steps_dir(&steps_dir);
  let res = Response::new();
  let err = feature.handle(request(HttpMethod::Get, "/mute"), res.clone()).await.unwrap_err();

  assert!(matches!(err, OrchidError::NoResponse { .. }));
  assert!(!res.is_sent());
}

#[tokio::test]
async fn step_failures_are_wrapped_with_ordinal_and_name() {
  setup_tracing();
  let (tmp, units) = scaffold();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  touch(&steps_dir.join("10-ok.rs"));
  touch(&steps_dir.join("20-explode.rs"));
  touch(&steps_dir.join("30-never.rs"));
  register_log_step(&units, steps_dir.join("10-ok.rs"), "ok");
  register_failing_step(&units, steps_dir.join("20-explode.rs"), "explode", "boom");
  register_log_step(&units, steps_dir.join("30-never.rs"), "never");

  let feature = Feature::new(HttpMethod::Post, "/frag", units.clone()).with_steps_dir(&steps_dir);
  let res = Response::new();
  let err = feature.handle(request(HttpMethod::Post, "/frag"), res.clone()).await.unwrap_err();

  match err {
    OrchidError::StepFailure { ordinal, name, context, source } => {
      assert_eq!(ordinal, 20);
      assert_eq!(name, "explode");
      assert_eq!(source.to_string(), "boom");
      // The wrap carries the context as it was at the failure.
      assert_eq!(log_entries(&context), vec!["ok", "explode"]);
    }
    other => panic!("expected StepFailure, got {other:?}"),
  }
}

#[tokio::test]
async fn initializer_and_middleware_run_before_the_pipeline() {
  setup_tracing();
  let (tmp, units) = scaffold();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  touch(&steps_dir.join("10-respond.rs"));
  units.register_step(steps_dir.join("10-respond.rs"), |ctx: Context, _req, res: Response| async move {
    res.send_json(
      200,
      json!({
        "tenant": ctx.get_str("tenant"),
        "log": ctx.get("log"),
      }),
    );
    Ok(())
  });

  let feature = Feature::new(HttpMethod::Get, "/init", units.clone())
    .with_steps_dir(&steps_dir)
    .with_initializer(orchid::context_init_fn(|ctx: Context, _req, _res| async move {
      ctx.insert("tenant", "acme");
      Ok(())
    }))
    .with_middleware(step_fn(|ctx: Context, _req, _res| async move {
      ctx.push("log", "mw");
      Ok(())
    }));

  let res = Response::new();
  feature.handle(request(HttpMethod::Get, "/init"), res.clone()).await.unwrap();
  assert_eq!(
    res.body_json().unwrap(),
    json!({ "tenant": "acme", "log": ["mw"] })
  );
}

#[tokio::test]
async fn middleware_can_short_circuit_the_pipeline() {
  setup_tracing();
  let (tmp, units) = scaffold();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  touch(&steps_dir.join("10-never.rs"));
  register_log_step(&units, steps_dir.join("10-never.rs"), "never");

  let feature = Feature::new(HttpMethod::Get, "/guard", units.clone())
    .with_steps_dir(&steps_dir)
    .with_middleware(step_fn(|_ctx, _req, res: Response| async move {
      res.send_json(401, json!({ "error": "unauthorized" }));
      Ok(())
    }));

  let res = Response::new();
  feature.handle(request(HttpMethod::Get, "/guard"), res.clone()).await.unwrap();
  assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn middleware_failures_carry_their_index() {
  setup_tracing();
  let (tmp, units) = scaffold();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  touch(&steps_dir.join("10-never.rs"));
  register_log_step(&units, steps_dir.join("10-never.rs"), "never");

  let feature = Feature::new(HttpMethod::Get, "/mwfail", units.clone())
    .with_steps_dir(&steps_dir)
    .with_middleware(step_fn(|_ctx, _req, _res| async move { Ok(()) }))
    .with_middleware(step_fn(|_ctx, _req, _res| async move { anyhow::bail!("nope") }));

  let res = Response::new();
  let err = feature.handle(request(HttpMethod::Get, "/mwfail"), res).await.unwrap_err();
  match err {
    OrchidError::MiddlewareFailure { index, .. } => assert_eq!(index, 1),
    other => panic!("expected MiddlewareFailure, got {other:?}"),
  }
}

#[tokio::test]
async fn info_reports_counts_after_lazy_initialization() {
  setup_tracing();
  let (tmp, units) = scaffold();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  let tasks_dir = mkdirs(&tmp.path().join("async-tasks"));
  touch(&steps_dir.join("10-a.rs"));
  touch(&steps_dir.join("20-b.rs"));
  touch(&tasks_dir.join("notify.rs"));
  register_log_step(&units, steps_dir.join("10-a.rs"), "a");
  register_log_step(&units, steps_dir.join("20-b.rs"), "b");
  let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
  register_notify_task(&units, tasks_dir.join("notify.rs"), tx, "notify", false);

  let feature = Feature::new(HttpMethod::Put, "/counted", units.clone())
    .with_steps_dir(&steps_dir)
    .with_async_tasks_dir(&tasks_dir);

  let info = feature.info().unwrap();
  assert_eq!(info.method, HttpMethod::Put);
  assert_eq!(info.path, "/counted");
  assert_eq!(info.step_count, 2);
  assert_eq!(info.async_task_count, 1);
  assert!(!info.has_error_handler);
}

#[tokio::test]
async fn the_produced_handler_is_a_standalone_callable() {
  setup_tracing();
  let (tmp, units) = scaffold();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  touch(&steps_dir.join("10-respond.rs"));
  register_sending_step(&units, steps_dir.join("10-respond.rs"), "respond", 200);

  let feature =
    Arc::new(Feature::new(HttpMethod::Get, "/fn", units.clone()).with_steps_dir(&steps_dir));
  let handler: RequestHandler = feature.handler();

  // The callable closes over the feature; a transport layer needs nothing
  // else to serve the route.
  let res = Response::new();
  handler(request(HttpMethod::Get, "/fn"), res.clone()).await.unwrap();
  assert_eq!(res.status(), 200);

  // And it is reusable across requests.
  let res = Response::new();
  handler(request(HttpMethod::Get, "/fn"), res.clone()).await.unwrap();
  assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn discovery_errors_surface_on_first_use() {
  setup_tracing();
  let (tmp, units) = scaffold();
  let steps_dir = mkdirs(&tmp.path().join("steps")); // exists but empty

  let feature = Feature::new(HttpMethod::Get, "/lazy", units.clone()).with_steps_dir(&steps_dir);
  let err = feature
    .handle(request(HttpMethod::Get, "/lazy"), Response::new())
    .await
    .unwrap_err();
  assert!(matches!(err, OrchidError::NoStepsFound { .. }));
}
