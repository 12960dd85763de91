/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Canned fiber workloads run by the `spindle` binary.
//!
//! Each scenario creates its own scheduler on the calling thread and
//! returns the events its fibers recorded, in the order they happened.

use std::cell::RefCell;
use std::convert::Infallible;

use tracing::info;

use crate::config::SchedulerConfig;
use crate::scheduler::{Scheduler, SchedulerError};

thread_local! {
    static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn record(event: String) {
    EVENTS.with(|events| events.borrow_mut().push(event));
}

fn take_events() -> Vec<String> {
    EVENTS.with(|events| std::mem::take(&mut *events.borrow_mut()))
}

// ── sequence ──────────────────────────────────────────────────────────────────

fn announce_and_finish(sched: &Scheduler, name: i32, _: i32) {
    let name = char::from_u32(name as u32).unwrap_or('?');
    record(name.to_string());
    sched.finish();
}

/// Fibers A, B and C each record their name and finish; root yields until
/// it is the only runnable fiber left.  Needs a capacity of at least 4.
pub fn run_sequence(config: SchedulerConfig) -> Result<Vec<String>, SchedulerError> {
    let sched = Scheduler::init(config)?;
    take_events();

    for name in ['A', 'B', 'C'] {
        sched.create(Some(announce_and_finish), name as i32, 0)?;
    }

    let mut switches = 0;
    while sched.yield_now().is_some() {
        switches += 1;
    }
    info!(switches, "sequence scenario complete");

    Ok(take_events())
}

// ── ping-pong ─────────────────────────────────────────────────────────────────

fn worker(sched: &Scheduler, id: i32, rounds: i32) {
    for round in 0..rounds {
        record(format!("worker {id} round {round}"));
        sched.yield_now();
    }
    record(format!("worker {id} done"));
    sched.finish();
}

/// `workers` fibers each record and yield `rounds` times, then finish.
/// The interleaving shows the configured selection policy at work.
pub fn run_ping_pong(
    config: SchedulerConfig,
    workers: u32,
    rounds: u32,
) -> Result<Vec<String>, SchedulerError> {
    let sched = Scheduler::init(config)?;
    take_events();

    let rounds = i32::try_from(rounds).unwrap_or(i32::MAX);
    for id in 1..=workers {
        let id = i32::try_from(id).unwrap_or(i32::MAX);
        sched.create(Some(worker), id, rounds)?;
    }

    while sched.yield_now().is_some() {}

    let stats = sched.stats();
    info!(
        policy    = %sched.policy(),
        allocated = stats.allocated,
        released  = stats.released,
        "ping-pong scenario complete"
    );

    Ok(take_events())
}

// ── orphan-finish ─────────────────────────────────────────────────────────────

/// Root calls `finish` with no other fiber alive.  There is nobody to hand
/// control to, so the process aborts; this function only ever returns an
/// initialisation error.
pub fn run_orphan_finish(config: SchedulerConfig) -> Result<Infallible, SchedulerError> {
    let sched = Scheduler::init(config)?;
    info!("root fiber finishing with no other fiber runnable");
    sched.finish()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
