/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The context table: a fixed array of slots plus the index of the slot
//! that is currently executing.
//!
//! ```text
//! slot 0            slot 1            slot 2           …  slot capacity-1
//! ┌──────────────┐ ┌──────────────┐ ┌──────────────┐     ┌──────────────┐
//! │ root fiber   │ │ context      │ │ context      │     │ context      │
//! │ Runnable     │ │ Runnable     │ │ Empty        │  …  │ Empty        │
//! │ no stack     │ │ FiberStack   │ │ –            │     │ –            │
//! └──────────────┘ └──────────────┘ └──────────────┘     └──────────────┘
//!        ▲
//!     current
//! ```
//!
//! # Ownership model
//! The table is pure data; every state transition is driven by
//! [`Scheduler`](crate::scheduler::Scheduler).  Only one fiber executes at a
//! time, so fields use `Cell` / `UnsafeCell` instead of locks, and no borrow
//! of a slot is ever held across a context switch.

use std::cell::{Cell, UnsafeCell};

use crate::context::ExecutionContext;
use crate::scheduler::Entry;
use crate::stack::FiberStack;

/// Index of a slot in `[0, capacity)`.
pub type SlotId = usize;

/// Slot permanently reserved for the flow that called `init`.
pub const ROOT_SLOT: SlotId = 0;

// ── Lifecycle state ───────────────────────────────────────────────────────────

/// Lifecycle of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// Free for the next `create`.
    #[default]
    Empty,
    /// Holds a fiber that is running or ready to run.
    Runnable,
    /// Held only while `finish` tears the slot down; it is back to `Empty`
    /// before control leaves the finishing fiber, so no other fiber ever
    /// observes it.
    Finishing,
}

// ── Launch record ─────────────────────────────────────────────────────────────

/// Entry point and arguments of a fiber that has not started yet.  Taken by
/// the fiber trampoline on first resumption.
pub(crate) struct Launch<C: ExecutionContext> {
    pub(crate) entry: Entry<C>,
    pub(crate) arg1: i32,
    pub(crate) arg2: i32,
}

// ── Slot ──────────────────────────────────────────────────────────────────────

pub(crate) struct Slot<C: ExecutionContext> {
    /// Saved execution state.  Written in place by capture/build/switch and
    /// never moved afterwards.
    pub(crate) context: UnsafeCell<C>,
    pub(crate) state: Cell<SlotState>,
    /// `None` for the root slot and for empty slots.
    pub(crate) stack: Cell<Option<FiberStack>>,
    pub(crate) launch: Cell<Option<Launch<C>>>,
}

impl<C: ExecutionContext> Slot<C> {
    fn new() -> Self {
        Self {
            context: UnsafeCell::new(C::blank()),
            state: Cell::new(SlotState::Empty),
            stack: Cell::new(None),
            launch: Cell::new(None),
        }
    }

    /// Raw pointer to the saved context, for the switch primitives.
    pub(crate) fn context_ptr(&self) -> *mut C {
        self.context.get()
    }

    /// Reports whether a stack is attached without taking it out.
    pub(crate) fn has_stack(&self) -> bool {
        let stack = self.stack.take();
        let present = stack.is_some();
        self.stack.set(stack);
        present
    }
}

// ── ContextTable ──────────────────────────────────────────────────────────────

pub(crate) struct ContextTable<C: ExecutionContext> {
    /// Boxed slice: slot addresses are stable for the table's lifetime.
    slots: Box<[Slot<C>]>,
    current: Cell<SlotId>,
}

impl<C: ExecutionContext> ContextTable<C> {
    /// All slots `Empty`, current = root.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Slot::new()).collect(),
            current: Cell::new(ROOT_SLOT),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slot(&self, id: SlotId) -> &Slot<C> {
        &self.slots[id]
    }

    pub(crate) fn slots(&self) -> impl Iterator<Item = (SlotId, &Slot<C>)> {
        self.slots.iter().enumerate()
    }

    pub(crate) fn current(&self) -> SlotId {
        self.current.get()
    }

    pub(crate) fn set_current(&self, id: SlotId) {
        self.current.set(id);
    }

    /// `None` for an out-of-range index.
    pub(crate) fn state(&self, id: SlotId) -> Option<SlotState> {
        self.slots.get(id).map(|s| s.state.get())
    }

    pub(crate) fn is_runnable(&self, id: SlotId) -> bool {
        self.state(id) == Some(SlotState::Runnable)
    }

    /// Lowest-indexed `Empty` slot, never the root slot.
    pub(crate) fn first_empty(&self) -> Option<SlotId> {
        self.slots()
            .skip(1)
            .find(|(_, slot)| slot.state.get() == SlotState::Empty)
            .map(|(id, _)| id)
    }

    pub(crate) fn runnable_count(&self) -> usize {
        self.slots()
            .filter(|(_, slot)| slot.state.get() == SlotState::Runnable)
            .count()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
