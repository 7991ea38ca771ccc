// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aurelia_core::{Component, RuntimeStatus, Task, TaskStatus};
use tempfile::tempdir;

fn task(id: &str) -> Task {
    Task::new(
        id.to_string(),
        "thread-0001".to_string(),
        Component::Coder,
        "aurelia/cand-0001",
        "Improve the solution.",
    )
}

#[test]
fn test_initialize_creates_subdirectories() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path().join(".aurelia"));
    store.initialize().unwrap();

    for name in ["state", "logs", "cache", "reports", "config"] {
        assert!(dir.path().join(".aurelia").join(name).is_dir());
    }
}

#[test]
fn test_runtime_round_trip() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());

    let mut state = RuntimeState::default();
    state.status = RuntimeStatus::Running;
    state.heartbeat_count = 7;
    state.next_event_seq = 99;

    store.save_runtime(&state).unwrap();
    let loaded = store.load_runtime();

    assert_eq!(loaded.status, RuntimeStatus::Running);
    assert_eq!(loaded.heartbeat_count, 7);
    assert_eq!(loaded.next_event_seq, 99);
}

#[test]
fn test_missing_files_load_empty_defaults() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());

    assert_eq!(store.load_runtime().status, RuntimeStatus::Stopped);
    assert!(store.load_tasks().is_empty());
    assert!(store.load_candidates().is_empty());
    assert!(store.load_evaluations().is_empty());
    assert!(store.load_plan().is_none());
}

#[test]
fn test_tasks_round_trip() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());

    let mut t = task("task-0001");
    t.status = TaskStatus::Success;
    store.save_tasks(&[t, task("task-0002")]).unwrap();

    let loaded = store.load_tasks();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].id, "task-0001");
    assert_eq!(loaded[0].status, TaskStatus::Success);
}

#[test]
fn test_saves_rotate_backups() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    let state_dir = dir.path().join("state");

    for count in 1..=5u64 {
        let mut state = RuntimeState::default();
        state.heartbeat_count = count;
        store.save_runtime(&state).unwrap();
    }

    // Primary holds the latest write, backups the three before it
    assert_eq!(store.load_runtime().heartbeat_count, 5);
    for (bak, expected) in [(1u32, 4u64), (2, 3), (3, 2)] {
        let raw =
            std::fs::read_to_string(state_dir.join(format!("runtime.json.bak.{bak}"))).unwrap();
        let parsed: RuntimeState = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.heartbeat_count, expected);
    }
    assert!(!state_dir.join("runtime.json.bak.4").exists());
}

#[test]
fn test_corrupt_primary_falls_back_to_backup() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    let primary = dir.path().join("state/runtime.json");

    let mut state = RuntimeState::default();
    state.heartbeat_count = 3;
    store.save_runtime(&state).unwrap();
    state.heartbeat_count = 4;
    store.save_runtime(&state).unwrap();

    // Corrupt the primary; the most recent backup holds count=3
    std::fs::write(&primary, "{\"status\": \"runni").unwrap();

    assert_eq!(store.load_runtime().heartbeat_count, 3);
}

#[test]
fn test_all_copies_corrupt_loads_default() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    let state_dir = dir.path().join("state");
    std::fs::create_dir_all(&state_dir).unwrap();

    std::fs::write(state_dir.join("tasks.json"), "garbage").unwrap();
    std::fs::write(state_dir.join("tasks.json.bak.1"), "more garbage").unwrap();

    assert!(store.load_tasks().is_empty());
}

#[test]
fn test_no_temp_file_left_behind() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());

    store.save_runtime(&RuntimeState::default()).unwrap();

    assert!(dir.path().join("state/runtime.json").exists());
    assert!(!dir.path().join("state/runtime.json.tmp").exists());
}

#[test]
fn test_primary_rewritten_on_next_save_after_corruption() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    let primary = dir.path().join("state/runtime.json");

    store.save_runtime(&RuntimeState::default()).unwrap();
    std::fs::write(&primary, "corrupt").unwrap();

    let mut state = RuntimeState::default();
    state.heartbeat_count = 9;
    store.save_runtime(&state).unwrap();

    let raw = std::fs::read_to_string(&primary).unwrap();
    let parsed: RuntimeState = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.heartbeat_count, 9);
}
