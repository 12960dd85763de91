/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! End-to-end checks of the `spindle` binary.

use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Output};

use tempfile::TempDir;

fn spindle(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_spindle"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to launch spindle binary")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn default_scenario_prints_fibers_in_creation_order() {
    let out = spindle(&[]);
    assert!(out.status.success(), "status: {:?}", out.status);
    assert_eq!(stdout_lines(&out), vec!["A", "B", "C"]);
}

#[test]
fn ping_pong_round_robin_interleaves_workers() {
    let out = spindle(&[
        "--scenario", "ping-pong", "--workers", "2", "--rounds", "2", "--policy", "round-robin",
    ]);
    assert!(out.status.success(), "status: {:?}", out.status);
    assert_eq!(
        stdout_lines(&out),
        vec![
            "worker 1 round 0",
            "worker 2 round 0",
            "worker 1 round 1",
            "worker 2 round 1",
            "worker 1 done",
            "worker 2 done",
        ]
    );
}

#[test]
fn config_file_selects_policy_and_flags_override_it() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("spindle.yaml");
    fs::write(
        &path,
        "scheduler:\n  capacity: 4\n  stack_size: 32768\n  policy: round_robin\n",
    )
    .unwrap();
    let path = path.to_str().unwrap();

    let out = spindle(&["-c", path, "-s", "ping-pong", "-w", "2", "-r", "1"]);
    assert!(out.status.success());
    assert_eq!(
        stdout_lines(&out),
        vec!["worker 1 round 0", "worker 2 round 0", "worker 1 done", "worker 2 done"]
    );

    let out = spindle(&["-c", path, "-s", "ping-pong", "-w", "2", "-r", "1", "-p", "lowest"]);
    assert!(out.status.success());
    assert_eq!(
        stdout_lines(&out),
        vec!["worker 1 round 0", "worker 1 done", "worker 2 round 0", "worker 2 done"]
    );
}

#[test]
fn orphan_finish_aborts_the_process() {
    let out = spindle(&["--scenario", "orphan-finish"]);
    assert!(!out.status.success());
    assert_eq!(out.status.signal(), Some(libc::SIGABRT));
    assert!(out.stdout.is_empty());
}

#[test]
fn more_workers_than_slots_exits_with_code_1() {
    let out = spindle(&["-s", "ping-pong", "--capacity", "3", "--workers", "3"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
}

#[test]
fn out_of_range_capacity_exits_with_code_1() {
    let out = spindle(&["--capacity", "1"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn unreadable_config_file_exits_with_code_1() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.yaml");
    let out = spindle(&["-c", missing.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
}
