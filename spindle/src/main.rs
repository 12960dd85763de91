/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

use spindle::config::{SchedPolicy, SchedulerConfig};
use spindle::scenario;
use spindle::scheduler::SchedulerError;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Workload to run on the fiber scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Fibers A, B, C record their name and finish.
    Sequence,
    /// Workers take turns yielding for a number of rounds.
    PingPong,
    /// Root finishes with nobody left to run; the process aborts.
    OrphanFinish,
}

/// Spindle cooperative fiber scheduler demo.
///
/// Example:
///   spindle --scenario ping-pong --workers 3 --rounds 2 --policy round-robin
#[derive(Debug, Parser)]
#[command(
    name = "spindle",
    about = "Spindle cooperative fiber scheduler – demo workloads",
    long_about = None,
)]
struct Cli {
    /// Path to a YAML scheduler configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Table capacity (slots, root included); overrides the file.
    #[arg(long)]
    capacity: Option<usize>,

    /// Usable stack bytes per fiber; overrides the file.
    #[arg(long = "stack-size")]
    stack_size: Option<usize>,

    /// Selection policy: lowest-index-first or round-robin; overrides the file.
    #[arg(short = 'p', long)]
    policy: Option<SchedPolicy>,

    /// Workload to run.
    #[arg(short = 's', long, value_enum, default_value_t = Scenario::Sequence)]
    scenario: Scenario,

    /// Number of worker fibers (ping-pong only).
    #[arg(short = 'w', long, default_value_t = 3)]
    workers: u32,

    /// Yields per worker (ping-pong only).
    #[arg(short = 'r', long, default_value_t = 3)]
    rounds: u32,
}

/// Builds the effective configuration: file (or defaults), then CLI
/// overrides, then validation.
fn resolve_config(cli: &Cli) -> Result<SchedulerConfig> {
    let mut config = match &cli.config {
        Some(path) => SchedulerConfig::load_from_file(path)?,
        None => {
            warn!("No configuration file provided, using default scheduler settings");
            SchedulerConfig::default()
        }
    };

    if let Some(capacity) = cli.capacity {
        config.capacity = capacity;
    }
    if let Some(stack_size) = cli.stack_size {
        config.stack_size = stack_size;
    }
    if let Some(policy) = cli.policy {
        config.policy = policy;
    }

    config
        .validate()
        .context("Invalid command-line scheduler settings")?;
    Ok(config)
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    // Logs go to stderr so scenario output on stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load scheduler configuration: {:#}", e);
            process::exit(1);
        }
    };

    info!(
        capacity   = config.capacity,
        stack_size = config.stack_size,
        policy     = %config.policy,
        scenario   = ?cli.scenario,
        "Configuration"
    );

    let result: Result<Vec<String>, SchedulerError> = match cli.scenario {
        Scenario::Sequence => scenario::run_sequence(config),
        Scenario::PingPong => scenario::run_ping_pong(config, cli.workers, cli.rounds),
        Scenario::OrphanFinish => scenario::run_orphan_finish(config).map(|never| match never {}),
    };

    match result {
        Ok(events) => {
            for event in events {
                println!("{event}");
            }
        }
        Err(e) => {
            error!("Scenario {:?} failed: {:#}", cli.scenario, anyhow::Error::new(e));
            process::exit(1);
        }
    }
}
