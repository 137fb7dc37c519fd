// tests/discovery_tests.rs
mod common;

use common::*;
use orchid::discovery::{discover_async_tasks, discover_steps};
use orchid::{OrchidError, UnitRegistry};

#[test]
fn steps_are_sorted_ascending_by_ordinal() {
  setup_tracing();
  let tmp = tempfile::tempdir().unwrap();
  let steps_dir = mkdirs(&tmp.path().join("steps"));

  for name in ["100-save.rs", "20-validate.rs", "3-load.rs"] {
    touch(&steps_dir.join(name));
  }

  let units = UnitRegistry::new();
  register_log_step(&units, steps_dir.join("100-save.rs"), "save");
  register_log_step(&units, steps_dir.join("20-validate.rs"), "validate");
  register_log_step(&units, steps_dir.join("3-load.rs"), "load");

  let steps = discover_steps(&steps_dir, &units).unwrap();
  let ordinals: Vec<u32> = steps.iter().map(|s| s.ordinal).collect();
  let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
  assert_eq!(ordinals, vec![3, 20, 100]);
  assert_eq!(names, vec!["load", "validate", "save"]);
}

#[test]
fn duplicate_ordinals_are_rejected_naming_the_ordinal() {
  setup_tracing();
  let tmp = tempfile::tempdir().unwrap();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  touch(&steps_dir.join("10-first.rs"));
  touch(&steps_dir.join("10-second.rs"));

  let units = UnitRegistry::new();
  register_log_step(&units, steps_dir.join("10-first.rs"), "first");
  register_log_step(&units, steps_dir.join("10-second.rs"), "second");

  let err = discover_steps(&steps_dir, &units).unwrap_err();
  match err {
    OrchidError::DuplicateOrdinal { ordinal, first, second } => {
      assert_eq!(ordinal, 10);
      let mut files = vec![first, second];
      files.sort();
      assert_eq!(files, vec!["10-first.rs".to_string(), "10-second.rs".to_string()]);
    }
    other => panic!("expected DuplicateOrdinal, got {other:?}"),
  }
}

#[test]
fn missing_steps_dir_is_an_error() {
  setup_tracing();
  let tmp = tempfile::tempdir().unwrap();
  let err = discover_steps(&tmp.path().join("steps"), &UnitRegistry::new()).unwrap_err();
  assert!(matches!(err, OrchidError::MissingStepsDir { .. }));
}

#[test]
fn zero_matching_files_is_an_error() {
  setup_tracing();
  let tmp = tempfile::tempdir().unwrap();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  touch(&steps_dir.join("README.md"));
  touch(&steps_dir.join("helper.rs")); // no ordinal prefix

  let err = discover_steps(&steps_dir, &UnitRegistry::new()).unwrap_err();
  assert!(matches!(err, OrchidError::NoStepsFound { .. }));
}

#[test]
fn non_step_files_are_ignored_next_to_real_steps() {
  setup_tracing();
  let tmp = tempfile::tempdir().unwrap();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  touch(&steps_dir.join("10-only.rs"));
  touch(&steps_dir.join("helper.rs"));
  touch(&steps_dir.join("notes.txt"));

  let units = UnitRegistry::new();
  register_log_step(&units, steps_dir.join("10-only.rs"), "only");

  let steps = discover_steps(&steps_dir, &units).unwrap();
  assert_eq!(steps.len(), 1);
  assert_eq!(steps[0].ordinal, 10);
}

#[test]
fn unregistered_step_unit_fails_per_file() {
  setup_tracing();
  let tmp = tempfile::tempdir().unwrap();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  touch(&steps_dir.join("10-ghost.rs"));

  let err = discover_steps(&steps_dir, &UnitRegistry::new()).unwrap_err();
  assert!(matches!(err, OrchidError::UnitNotRegistered { .. }));
}

#[test]
fn wrong_unit_kind_fails_per_file() {
  setup_tracing();
  let tmp = tempfile::tempdir().unwrap();
  let steps_dir = mkdirs(&tmp.path().join("steps"));
  touch(&steps_dir.join("10-task.rs"));

  let units = UnitRegistry::new();
  units.register_async_task(steps_dir.join("10-task.rs"), |_ctx| async { Ok(()) });

  let err = discover_steps(&steps_dir, &units).unwrap_err();
  match err {
    OrchidError::UnitKindMismatch { expected, .. } => assert_eq!(expected, "step"),
    other => panic!("expected UnitKindMismatch, got {other:?}"),
  }
}

#[test]
fn absent_async_tasks_dir_yields_empty_list() {
  setup_tracing();
  let tmp = tempfile::tempdir().unwrap();
  let tasks = discover_async_tasks(&tmp.path().join("async-tasks"), &UnitRegistry::new()).unwrap();
  assert!(tasks.is_empty());
}

#[test]
fn async_tasks_accept_arbitrary_names_in_filename_order() {
  setup_tracing();
  let tmp = tempfile::tempdir().unwrap();
  let tasks_dir = mkdirs(&tmp.path().join("async-tasks"));
  touch(&tasks_dir.join("send-email.rs"));
  touch(&tasks_dir.join("audit.rs"));
  touch(&tasks_dir.join("notes.txt")); // not a unit

  let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
  let units = UnitRegistry::new();
  register_notify_task(&units, tasks_dir.join("send-email.rs"), tx.clone(), "email", false);
  register_notify_task(&units, tasks_dir.join("audit.rs"), tx, "audit", false);

  let tasks = discover_async_tasks(&tasks_dir, &units).unwrap();
  let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
  assert_eq!(names, vec!["audit", "send-email"]);
}
