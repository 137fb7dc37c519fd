// tests/convention_tests.rs
mod common; // Reference the common module

use common::*;
use orchid::convention::{
  find_async_tasks_dir, find_features_base_dir, find_steps_dir, infer_method, infer_path,
  method_from_marker, ConventionCache,
};
use orchid::{HttpMethod, OrchidError};
use std::path::{Path, PathBuf};

#[test]
fn infer_method_accepts_marked_methods_case_insensitively() {
  setup_tracing();
  assert_eq!(infer_method(Path::new("/app/features/orders/@get")).unwrap(), HttpMethod::Get);
  assert_eq!(infer_method(Path::new("/app/features/orders/@POST")).unwrap(), HttpMethod::Post);
  assert_eq!(infer_method(Path::new("/app/features/orders/@Put")).unwrap(), HttpMethod::Put);
  assert_eq!(infer_method(Path::new("/app/features/orders/@patch")).unwrap(), HttpMethod::Patch);
  assert_eq!(infer_method(Path::new("/app/features/orders/@DELETE")).unwrap(), HttpMethod::Delete);
}

#[test]
fn infer_method_requires_the_marker_prefix() {
  setup_tracing();
  // A resource literally named like a method must not be mistaken for one.
  let err = infer_method(Path::new("/app/features/workflows/get")).unwrap_err();
  assert!(matches!(err, OrchidError::InvalidConvention { .. }));

  let err = method_from_marker("steps").unwrap_err();
  assert!(matches!(err, OrchidError::InvalidConvention { .. }));
}

#[test]
fn infer_method_rejects_unknown_method_names() {
  setup_tracing();
  let err = method_from_marker("@head").unwrap_err();
  match err {
    OrchidError::InvalidConvention { segment, .. } => assert_eq!(segment, "@head"),
    other => panic!("expected InvalidConvention, got {other:?}"),
  }
}

#[test]
fn infer_path_drops_marker_and_rewrites_params() {
  setup_tracing();
  let base = Path::new("/app/features");

  assert_eq!(infer_path(Path::new("/app/features/orders/@post"), base).unwrap(), "/orders");
  assert_eq!(
    infer_path(Path::new("/app/features/users/[id]/posts/[post_id]/@get"), base).unwrap(),
    "/users/:id/posts/:post_id"
  );
  // A feature directly at the base maps to the root route.
  assert_eq!(infer_path(Path::new("/app/features/@get"), base).unwrap(), "/");
}

#[test]
fn infer_path_requires_dir_under_base() {
  setup_tracing();
  let err = infer_path(Path::new("/elsewhere/orders/@post"), Path::new("/app/features")).unwrap_err();
  assert!(matches!(err, OrchidError::ConfigurationError { .. }));
}

#[test]
fn convention_round_trips_for_param_routes() {
  setup_tracing();
  let base = PathBuf::from("/srv/features");
  let routes = [
    "/",
    "/orders",
    "/orders/:id",
    "/users/:uid/posts/:pid",
    "/workflows/:id/steps",
    "/a/:b/c/:d/e",
  ];

  for route in routes {
    // Rebuild the directory a scaffolder would create for this route.
    let mut dir = base.clone();
    for segment in route.split('/').filter(|s| !s.is_empty()) {
      match segment.strip_prefix(':') {
        Some(name) => dir.push(format!("[{name}]")),
        None => dir.push(segment),
      }
    }
    dir.push("@get");

    assert_eq!(infer_path(&dir, &base).unwrap(), route, "route {route}");
  }
}

#[test]
fn steps_and_async_tasks_dirs_are_optional() {
  setup_tracing();
  let tmp = tempfile::tempdir().unwrap();
  let feature_dir = mkdirs(&tmp.path().join("features/orders/@post"));

  assert_eq!(find_steps_dir(&feature_dir), None);
  assert_eq!(find_async_tasks_dir(&feature_dir), None);

  let steps = mkdirs(&feature_dir.join("steps"));
  let tasks = mkdirs(&feature_dir.join("async-tasks"));
  assert_eq!(find_steps_dir(&feature_dir), Some(steps));
  assert_eq!(find_async_tasks_dir(&feature_dir), Some(tasks));

  // A plain file named like the directory does not count.
  let other = mkdirs(&tmp.path().join("features/carts/@post"));
  touch(&other.join("steps"));
  assert_eq!(find_steps_dir(&other), None);
}

#[test]
fn base_dir_walk_finds_and_caches_the_features_ancestor() {
  setup_tracing();
  let cache = ConventionCache::new();
  let start = Path::new("/app/src/features/orders/@post");

  let base = find_features_base_dir(start, &cache).unwrap();
  assert_eq!(base, Path::new("/app/src/features"));
  assert_eq!(cache.len(), 1);

  // Second resolution is served from the cache.
  let again = find_features_base_dir(start, &cache).unwrap();
  assert_eq!(again, base);
  assert_eq!(cache.len(), 1);

  cache.clear();
  assert!(cache.is_empty());
}

#[test]
fn base_dir_walk_fails_outside_a_features_tree() {
  setup_tracing();
  let cache = ConventionCache::new();
  let err = find_features_base_dir(Path::new("/srv/app/handlers/orders/@post"), &cache).unwrap_err();
  match err {
    OrchidError::MissingBaseDir { root_name, .. } => assert_eq!(root_name, "features"),
    other => panic!("expected MissingBaseDir, got {other:?}"),
  }
  assert!(cache.is_empty());
}
