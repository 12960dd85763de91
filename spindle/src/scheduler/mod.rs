/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cooperative fiber scheduler.
//!
//! # Operations
//! | Operation | Effect |
//! |---|---|
//! | [`Scheduler::init`] | captures the caller as the root fiber in slot 0 |
//! | [`Scheduler::create`] | fills the lowest empty slot with a new fiber; does not switch |
//! | [`Scheduler::yield_now`] | switches to the next runnable slot, if any |
//! | [`Scheduler::finish`] | retires the calling fiber and switches away; never returns |
//!
//! Exactly one fiber runs at a time and it runs until it calls `yield_now`
//! or `finish` (or its entry returns).  There are no other suspension
//! points.
//!
//! # Stack release
//! A finishing fiber is still executing on its own stack while it picks a
//! successor, so its [`FiberStack`] is parked in a one-entry reaper and
//! unmapped by whichever fiber runs next, right after the switch.  Each stack
//! is therefore released exactly once and never while in use.
//!
//! # Example
//! ```
//! use spindle::config::SchedulerConfig;
//! use spindle::scheduler::Scheduler;
//!
//! fn worker(sched: &Scheduler, id: i32, rounds: i32) {
//!     for round in 0..rounds {
//!         println!("fiber {id}, round {round}");
//!         sched.yield_now();
//!     }
//!     sched.finish();
//! }
//!
//! let sched = Scheduler::init(SchedulerConfig::default().with_capacity(4)).unwrap();
//! sched.create(Some(worker), 1, 2).unwrap();
//! sched.create(Some(worker), 2, 2).unwrap();
//!
//! while sched.yield_now().is_some() {}
//!
//! assert_eq!(sched.runnable_count(), 1);
//! assert_eq!(sched.stats().outstanding(), 0);
//! ```

pub mod error;
pub mod policy;

use std::cell::Cell;
use std::ffi::c_void;
use std::fmt;
use std::marker::{PhantomData, PhantomPinned};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::process;

use tracing::{debug, error, info, trace, warn};

use crate::config::{SchedPolicy, SchedulerConfig};
use crate::context::{ExecutionContext, UContext};
use crate::stack::FiberStack;
use crate::table::{ContextTable, Launch, SlotId, SlotState, ROOT_SLOT};

pub use error::SchedulerError;
use policy::Selection;

/// Fiber entry point: receives the scheduler it runs on plus the two
/// arguments given to [`Scheduler::create`].
pub type Entry<C = UContext> = fn(&Scheduler<C>, i32, i32);

thread_local! {
    /// Set while a scheduler is alive on this thread.
    static ACTIVE: Cell<bool> = const { Cell::new(false) };
}

// ── Stack accounting ──────────────────────────────────────────────────────────

/// Running totals of fiber stacks handed to slots and released again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackStats {
    /// Stacks mapped by a successful `create`.
    pub allocated: u64,
    /// Stacks unmapped by the reaper or by dropping the scheduler.
    pub released: u64,
}

impl StackStats {
    /// Stacks currently owned by a slot or waiting in the reaper.
    pub fn outstanding(&self) -> u64 {
        self.allocated - self.released
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// Fixed-capacity cooperative scheduler bound to the thread that created
/// it.
///
/// [`init`](Scheduler::init) returns the scheduler pinned: fibers hold its
/// address, so it can never be moved out of its allocation.
///
/// ```compile_fail
/// use spindle::config::SchedulerConfig;
/// use spindle::scheduler::Scheduler;
///
/// let pinned = Scheduler::init(SchedulerConfig::default()).unwrap();
/// let moved: Scheduler = *pinned;
/// ```
///
/// ```compile_fail
/// use spindle::config::SchedulerConfig;
/// use spindle::scheduler::Scheduler;
///
/// let pinned = Scheduler::init(SchedulerConfig::default()).unwrap();
/// let unpinned: Box<Scheduler> = std::pin::Pin::into_inner(pinned);
/// ```
pub struct Scheduler<C: ExecutionContext = UContext> {
    config: SchedulerConfig,
    table: ContextTable<C>,
    /// Stack of the most recently finished fiber, waiting to be unmapped.
    reaper: Cell<Option<(SlotId, FiberStack)>>,
    stats: Cell<StackStats>,
    /// Contexts are only meaningful on the thread that captured them.
    _not_send: PhantomData<*const ()>,
    _pinned: PhantomPinned,
}

impl Scheduler<UContext> {
    /// Creates the scheduler for the calling thread, which becomes the root
    /// fiber in slot 0.
    ///
    /// # Errors
    /// * [`SchedulerError::InvalidConfig`] if `config` does not validate.
    /// * [`SchedulerError::AlreadyInitialized`] if this thread already has a
    ///   live scheduler.
    /// * [`SchedulerError::Context`] if the caller's context cannot be
    ///   captured.
    pub fn init(config: SchedulerConfig) -> Result<Pin<Box<Self>>, SchedulerError> {
        Self::init_with(config)
    }
}

impl<C: ExecutionContext> Scheduler<C> {
    /// [`init`](Scheduler::init) for an arbitrary [`ExecutionContext`]
    /// backend.
    pub fn init_with(config: SchedulerConfig) -> Result<Pin<Box<Self>>, SchedulerError> {
        config.validate()?;

        if ACTIVE.with(|active| active.replace(true)) {
            return Err(SchedulerError::AlreadyInitialized);
        }

        // From here on, dropping `scheduler` clears ACTIVE again.
        let scheduler = Box::pin(Self {
            config,
            table: ContextTable::new(config.capacity),
            reaper: Cell::new(None),
            stats: Cell::new(StackStats::default()),
            _not_send: PhantomData,
            _pinned: PhantomPinned,
        });

        let root = scheduler.table.slot(ROOT_SLOT);
        // SAFETY: the table was just created; nothing else refers to the root
        // context yet.
        unsafe { (*root.context_ptr()).capture() }.map_err(SchedulerError::Context)?;
        root.state.set(SlotState::Runnable);
        scheduler.table.set_current(ROOT_SLOT);

        info!(
            capacity   = config.capacity,
            stack_size = config.stack_size,
            policy     = %config.policy,
            "fiber scheduler initialised"
        );

        Ok(scheduler)
    }

    /// Registers a new fiber that will run `entry(self, arg1, arg2)` on its
    /// own stack the first time it is scheduled.
    ///
    /// The fiber takes the lowest-indexed empty slot and becomes runnable;
    /// control stays with the caller.  If `entry` returns instead of calling
    /// [`finish`](Self::finish), the fiber is retired and control goes back
    /// to the root fiber.
    ///
    /// # Errors
    /// Fails without changing any slot when `entry` is `None`, the table is
    /// full, or the stack or context cannot be set up.
    pub fn create(
        &self,
        entry: Option<Entry<C>>,
        arg1: i32,
        arg2: i32,
    ) -> Result<SlotId, SchedulerError> {
        let entry = entry.ok_or(SchedulerError::MissingEntry)?;
        let id = self
            .table
            .first_empty()
            .ok_or(SchedulerError::TableFull {
                capacity: self.capacity(),
            })?;
        let slot = self.table.slot(id);

        // SAFETY: the slot is Empty, so no fiber can resume this context
        // while it is rewritten in place.
        unsafe { (*slot.context_ptr()).capture() }.map_err(SchedulerError::Context)?;

        let stack = FiberStack::new(self.config.stack_size).map_err(|source| {
            SchedulerError::StackAllocation {
                size: self.config.stack_size,
                source,
            }
        })?;

        // `self` is pinned inside the allocation made by `init`.
        let payload = (self as *const Self).cast_mut().cast::<c_void>();
        let continuation = self.table.slot(ROOT_SLOT).context_ptr();
        // SAFETY: the stack moves into this slot below and is only released
        // after the fiber has left it; the root context and `self` live in
        // heap allocations that outlive every fiber.
        unsafe {
            (*slot.context_ptr()).build(&stack, fiber_main::<C>, payload, continuation);
        }

        slot.launch.set(Some(Launch { entry, arg1, arg2 }));
        slot.stack.set(Some(stack));
        slot.state.set(SlotState::Runnable);
        self.update_stats(|stats| stats.allocated += 1);

        debug!(
            slot       = id,
            arg1,
            arg2,
            stack_size = self.config.stack_size,
            "fiber created"
        );

        Ok(id)
    }

    /// Suspends the calling fiber and resumes another runnable one.
    ///
    /// Returns `None` straight away, without switching, when no other fiber
    /// is runnable.  Otherwise returns `Some(n)`, where `n` is the number of
    /// other runnable fibers seen at the time of the call; the value is
    /// observed once the caller is scheduled again.
    pub fn yield_now(&self) -> Option<usize> {
        let current = self.table.current();
        let Selection { next, others } = self.select_next(current)?;
        self.switch_to(current, next);
        Some(others)
    }

    /// Terminates the calling fiber: its slot becomes empty, its stack is
    /// released, and control passes to the next runnable fiber.
    ///
    /// Aborts the process if no other fiber is runnable, since the caller's
    /// stack is about to be released.
    pub fn finish(&self) -> ! {
        let id = self.table.current();
        self.retire(id);

        match self.select_next(id) {
            Some(selection) => self.switch_to(id, selection.next),
            None => {
                error!(slot = id, "finish: no runnable fiber left to transfer control to; aborting");
                process::abort();
            }
        }

        error!(slot = id, "a finished fiber was resumed; aborting");
        process::abort();
    }

    // ── Introspection ─────────────────────────────────────────────────────────

    /// Slot of the fiber that is executing right now.
    pub fn current(&self) -> SlotId {
        self.table.current()
    }

    /// `None` for an index outside `[0, capacity)`.
    pub fn slot_state(&self, id: SlotId) -> Option<SlotState> {
        self.table.state(id)
    }

    /// Runnable slots, the current one and root included.
    pub fn runnable_count(&self) -> usize {
        self.table.runnable_count()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn policy(&self) -> SchedPolicy {
        self.config.policy
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn stats(&self) -> StackStats {
        self.stats.get()
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn select_next(&self, current: SlotId) -> Option<Selection> {
        policy::select(self.config.policy, self.capacity(), current, |id| {
            self.table.is_runnable(id)
        })
    }

    /// Makes `to` current and switches to it.  Returns when some fiber
    /// switches back to `from`.
    fn switch_to(&self, from: SlotId, to: SlotId) {
        trace!(from, to, "switching fibers");
        self.table.set_current(to);

        let from_ctx = self.table.slot(from).context_ptr();
        let to_ctx = self.table.slot(to).context_ptr();
        // SAFETY: `from != to` (selection skips the current slot), both
        // contexts live in the boxed table, and `to` is Runnable, i.e. it was
        // built by `create` or saved by an earlier switch.
        if let Err(err) = unsafe { C::switch(from_ctx, to_ctx) } {
            error!(from, to, error = %err, "context switch failed; aborting");
            process::abort();
        }

        self.reap();
    }

    /// Moves slot `id` from Runnable to Empty.  Its stack goes to the reaper
    /// because the caller may still be running on it.
    fn retire(&self, id: SlotId) {
        let slot = self.table.slot(id);
        slot.state.set(SlotState::Finishing);
        slot.launch.set(None);

        if id != ROOT_SLOT {
            if let Some(stack) = slot.stack.take() {
                self.reap();
                self.reaper.set(Some((id, stack)));
            }
        }

        slot.state.set(SlotState::Empty);
        debug!(slot = id, "fiber finished");
    }

    /// Releases the stack of a fiber that has already been switched away
    /// from.  Must never run on the stack being released.
    fn reap(&self) {
        if let Some((slot, stack)) = self.reaper.take() {
            drop(stack);
            self.update_stats(|stats| stats.released += 1);
            debug!(slot, "released stack of finished fiber");
        }
    }

    /// Entry returned normally: retire the fiber and let the context
    /// continuation take control back to root.
    fn exit_to_continuation(&self) {
        let id = self.table.current();
        if !self.table.is_runnable(ROOT_SLOT) {
            debug!(slot = id, "entry returned after root finished; finishing fiber instead");
            self.finish();
        }

        self.retire(id);
        self.table.set_current(ROOT_SLOT);
        trace!(from = id, to = ROOT_SLOT, "entry returned, resuming root");
    }

    fn update_stats(&self, f: impl FnOnce(&mut StackStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl<C: ExecutionContext> Drop for Scheduler<C> {
    fn drop(&mut self) {
        // A fiber would be unmapping the stack it is running on.
        let current = self.table.current();
        if current != ROOT_SLOT {
            error!(slot = current, "scheduler dropped from inside a fiber; aborting");
            process::abort();
        }

        self.reap();

        let mut abandoned = 0usize;
        for (id, slot) in self.table.slots().skip(1) {
            if slot.stack.take().is_some() {
                abandoned += 1;
                self.update_stats(|stats| stats.released += 1);
                debug!(slot = id, "released stack of unfinished fiber");
            }
            slot.launch.set(None);
            slot.state.set(SlotState::Empty);
        }
        if abandoned > 0 {
            warn!(
                abandoned,
                "scheduler dropped with unfinished fibers; their stacks were released without unwinding"
            );
        }

        let stats = self.stats.get();
        info!(
            allocated = stats.allocated,
            released  = stats.released,
            "fiber scheduler shut down"
        );
        ACTIVE.with(|active| active.set(false));
    }
}

impl<C: ExecutionContext> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("current", &self.table.current())
            .field("runnable", &self.table.runnable_count())
            .field("stats", &self.stats.get())
            .finish()
    }
}

/// First frame of every created fiber, reached through
/// [`ExecutionContext::build`].
unsafe extern "C" fn fiber_main<C: ExecutionContext>(payload: *mut c_void) {
    // SAFETY: `create` passed the address of the pinned scheduler, which
    // only the root fiber can drop.
    let scheduler = unsafe { &*payload.cast_const().cast::<Scheduler<C>>() };
    scheduler.reap();

    let id = scheduler.table.current();
    let Some(launch) = scheduler.table.slot(id).launch.take() else {
        error!(slot = id, "fiber started without an entry point; aborting");
        process::abort();
    };
    trace!(slot = id, "fiber started");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        (launch.entry)(scheduler, launch.arg1, launch.arg2)
    }));
    if outcome.is_err() {
        // Unwinding cannot continue past the first frame of a fiber stack.
        error!(slot = id, "fiber panicked; aborting");
        process::abort();
    }

    scheduler.exit_to_continuation();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
