/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scheduler configuration: table capacity, per-fiber stack size and the
//! selection policy used by `yield_now`.
//!
//! All three values are fixed once a [`Scheduler`](crate::scheduler::Scheduler)
//! has been initialised.  They can be built in code or loaded from an optional
//! YAML file:
//! ```yaml
//! scheduler:
//!   capacity: 8          # slots, including the root fiber
//!   stack_size: 131072   # bytes per fiber
//!   policy: round_robin  # or lowest_index_first
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Default number of slots, root included.
pub const DEFAULT_CAPACITY: usize = 16;

/// Default usable stack size per fiber (64 KiB).
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Smallest stack a fiber may be configured with.
///
/// The fiber trampoline, panic capture and `tracing` macros all run on the
/// fiber stack; anything below 16 KiB overflows into the guard page quickly.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Upper bound on the table capacity.  Scheduling is a linear scan, so the
/// table is kept small.
pub const MAX_CAPACITY: usize = 256;

// ── Selection policy ──────────────────────────────────────────────────────────

/// How `yield_now` picks the next slot to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedPolicy {
    /// Scan from slot 0 on every call and take the first runnable slot.
    ///
    /// A low-indexed fiber that stays runnable is always preferred over
    /// higher-indexed ones, so this is an approximate round robin only.
    #[default]
    LowestIndexFirst,

    /// Scan from `current + 1`, wrapping around, so every runnable slot gets
    /// a turn before any slot runs twice.
    RoundRobin,
}

impl SchedPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SchedPolicy::LowestIndexFirst => "lowest_index_first",
            SchedPolicy::RoundRobin => "round_robin",
        }
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedPolicy {
    type Err = ConfigError;

    /// Accepts the YAML spelling as well as the dashed CLI spelling.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "lowest_index_first" | "lowest" => Ok(SchedPolicy::LowestIndexFirst),
            "round_robin" | "rr" => Ok(SchedPolicy::RoundRobin),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// A configuration value the scheduler cannot run with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Capacity must leave room for the root fiber plus at least one fiber.
    #[error("capacity {capacity} is out of range (expected 2..={max})")]
    CapacityOutOfRange { capacity: usize, max: usize },

    #[error("stack size of {size} bytes is below the minimum of {min} bytes")]
    StackTooSmall { size: usize, min: usize },

    #[error("unknown scheduling policy '{0}' (valid: lowest_index_first, round_robin)")]
    UnknownPolicy(String),
}

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    scheduler: SchedulerSection,
}

/// Every field is optional; absent values keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchedulerSection {
    capacity: Option<usize>,
    stack_size: Option<usize>,
    policy: Option<SchedPolicy>,
}

// ── SchedulerConfig ───────────────────────────────────────────────────────────

/// Fixed parameters of one scheduler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum simultaneous fibers, root included.
    pub capacity: usize,
    /// Usable stack bytes per created fiber.  Rounded up to whole pages when
    /// the stack is mapped.
    pub stack_size: usize,
    pub policy: SchedPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            stack_size: DEFAULT_STACK_SIZE,
            policy: SchedPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn with_policy(mut self, policy: SchedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Checks the values against [`MAX_CAPACITY`] and [`MIN_STACK_SIZE`].
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(2..=MAX_CAPACITY).contains(&self.capacity) {
            return Err(ConfigError::CapacityOutOfRange {
                capacity: self.capacity,
                max: MAX_CAPACITY,
            });
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::StackTooSmall {
                size: self.stack_size,
                min: MIN_STACK_SIZE,
            });
        }
        Ok(())
    }

    /// Parses `path` and overlays its values on the defaults.
    ///
    /// A file without a `scheduler:` section yields the default
    /// configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is structurally
    /// invalid, or the resulting configuration fails [`validate`](Self::validate).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading scheduler configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        // An empty document deserializes to unit, not to a mapping.
        let file: ConfigFile = if content.trim().is_empty() {
            warn!("Configuration file is empty, using default scheduler settings");
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?
        };

        let defaults = Self::default();
        let section = file.scheduler;
        let config = Self {
            capacity: section.capacity.unwrap_or(defaults.capacity),
            stack_size: section.stack_size.unwrap_or(defaults.stack_size),
            policy: section.policy.unwrap_or(defaults.policy),
        };

        debug!(
            capacity   = config.capacity,
            stack_size = config.stack_size,
            policy     = %config.policy,
            "parsed scheduler configuration"
        );

        config
            .validate()
            .with_context(|| format!("Invalid scheduler configuration in {}", path.display()))?;

        Ok(config)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
