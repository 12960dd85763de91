/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Saved execution contexts and the three primitives the scheduler needs
//! from the platform: capture, switch and build.
//!
//! The scheduler only talks to [`ExecutionContext`]; [`UContext`] is the
//! default implementation on top of the System V `ucontext` family.
//!
//! # Address stability
//! Implementations may store pointers into themselves (glibc keeps a pointer
//! to its own FPU save area inside `ucontext_t`).  A context must therefore
//! not be moved once `capture`, `build` or `switch` has written to it.  The
//! scheduler keeps every context in a heap-allocated slot array for its
//! whole lifetime.

pub mod ucontext;

use std::ffi::c_void;
use std::io;

use crate::stack::FiberStack;

pub use ucontext::UContext;

/// First routine executed on a freshly built context.  Receives the opaque
/// payload pointer handed to [`ExecutionContext::build`].
pub type StartRoutine = unsafe extern "C" fn(*mut c_void);

/// Opaque saved state of one flow of execution: registers, program counter
/// and stack pointer.
pub trait ExecutionContext: Sized {
    /// Storage that holds no resumable state yet.
    fn blank() -> Self;

    /// Saves the caller's live state into `self`.
    ///
    /// The captured state is only used as a template: it is overwritten by a
    /// later [`switch`](Self::switch) or [`build`](Self::build) before anyone
    /// resumes it.
    fn capture(&mut self) -> io::Result<()>;

    /// Rewrites a captured context so that resuming it runs
    /// `start(payload)` on `stack`.  When `start` returns, `continuation` is
    /// resumed as if it had been switched to.
    ///
    /// # Safety
    /// * `self` must have been captured first.
    /// * `stack` must outlive every resumption of `self`.
    /// * `continuation` must point to a context that stays valid (and at the
    ///   same address) for as long as `self` can run.
    unsafe fn build(
        &mut self,
        stack: &FiberStack,
        start: StartRoutine,
        payload: *mut c_void,
        continuation: *const Self,
    );

    /// Saves the running state into `from` and resumes `to`.  Returns when
    /// some other flow switches back to `from`.
    ///
    /// # Safety
    /// Both pointers must be valid, `from` must not alias `to`, and `to` must
    /// hold a resumable state (captured, built or previously switched out).
    unsafe fn switch(from: *mut Self, to: *const Self) -> io::Result<()>;
}
