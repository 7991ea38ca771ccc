// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn spec() -> SandboxSpec {
    SandboxSpec {
        image: "aurelia-agent:latest".to_string(),
        memory_limit: "2g".to_string(),
        cpu_limit: 1.0,
        network: false,
        timeout_s: 300,
    }
}

#[test]
fn test_run_args_include_resource_caps() {
    let args = build_run_args(&spec(), &["sh".into(), "-c".into(), "true".into()], "/workspace", &[], &[]);

    let joined = args.join(" ");
    assert!(joined.starts_with("run --rm"));
    assert!(joined.contains("--memory 2g"));
    assert!(joined.contains("--cpus 1"));
    assert!(joined.contains("--network none"));
    assert!(joined.contains("-w /workspace"));
    assert!(joined.ends_with("aurelia-agent:latest sh -c true"));
}

#[test]
fn test_network_enabled_drops_none_flag() {
    let mut s = spec();
    s.network = true;
    let args = build_run_args(&s, &["true".into()], "/workspace", &[], &[]);
    assert!(!args.join(" ").contains("--network none"));
}

#[test]
fn test_env_and_mounts_are_rendered() {
    let env = vec![("GEMINI_API_KEY".to_string(), "k".to_string())];
    let mounts = vec![(PathBuf::from("/tmp/wt"), "/workspace".to_string(), false)];
    let ro_mounts = vec![(PathBuf::from("/tmp/data"), "/data".to_string(), true)];

    let args = build_run_args(&spec(), &["true".into()], "/workspace", &env, &mounts);
    let joined = args.join(" ");
    assert!(joined.contains("-e GEMINI_API_KEY=k"));
    assert!(joined.contains("-v /tmp/wt:/workspace"));

    let args = build_run_args(&spec(), &["true".into()], "/workspace", &[], &ro_mounts);
    assert!(args.join(" ").contains("-v /tmp/data:/data:ro"));
}
