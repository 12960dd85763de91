/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error type for the fiber scheduler.
//!
//! Every failing operation leaves the scheduler exactly as it was: no slot
//! changes state and no stack is counted as allocated.  None of the
//! variants describe a transient condition, so callers should not retry.
//!
//! | Variant | Returned by | Cause |
//! |---|---|---|
//! | `AlreadyInitialized` | `init` | another scheduler is alive on this thread |
//! | `InvalidConfig` | `init` | capacity or stack size out of range |
//! | `MissingEntry` | `create` | `None` passed as entry point |
//! | `TableFull` | `create` | every non-root slot is in use |
//! | `StackAllocation` | `create` | the stack could not be mapped |
//! | `Context` | `init`, `create` | capturing the execution context failed |
//!
//! The one unrecoverable condition, `finish` with no fiber left to run, is
//! not represented here: `finish` never returns, so it logs and aborts.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::stack::StackError;

/// Error returned by [`Scheduler::init`](super::Scheduler::init) and
/// [`Scheduler::create`](super::Scheduler::create).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `init` was called while another scheduler is still alive on the
    /// calling thread.
    #[error("a fiber scheduler is already initialised on this thread")]
    AlreadyInitialized,

    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// `create` was called without an entry point.
    #[error("no entry point given — a fiber needs a function to run")]
    MissingEntry,

    /// All `capacity - 1` fiber slots are occupied (slot 0 is reserved for
    /// the root fiber).
    #[error("context table is full — all {capacity} slots are in use")]
    TableFull { capacity: usize },

    #[error("could not allocate a {size}-byte fiber stack: {source}")]
    StackAllocation {
        size: usize,
        #[source]
        source: StackError,
    },

    /// The platform refused to capture an execution context.
    #[error("failed to capture execution context: {0}")]
    Context(#[source] io::Error),
}
