/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Spindle – fixed-capacity cooperative fiber scheduler
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/      – capacity, stack size, selection policy (+ YAML file)
//! ├── context/     – ExecutionContext trait and the ucontext backend
//! ├── stack        – guarded, mmap-backed fiber stacks
//! ├── table        – fixed slot array and slot lifecycle states
//! ├── scheduler/   – init / create / yield_now / finish, policies, errors
//! └── scenario     – canned workloads run by the `spindle` binary
//! ```

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
compile_error!("spindle switches contexts through glibc's ucontext functions; only Linux/glibc targets are supported");

pub mod config;
pub mod context;
pub mod scenario;
pub mod scheduler;
pub mod stack;
pub mod table;

pub use config::{SchedPolicy, SchedulerConfig};
pub use scheduler::{Entry, Scheduler, SchedulerError, StackStats};
pub use table::{SlotId, SlotState, ROOT_SLOT};
