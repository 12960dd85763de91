/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! [`ExecutionContext`] backed by `getcontext` / `makecontext` /
//! `swapcontext`.

use std::ffi::{c_int, c_uint, c_void};
use std::fmt;
use std::io;
use std::mem;

use super::{ExecutionContext, StartRoutine};
use crate::stack::FiberStack;

/// Number of `c_uint` words `makecontext` passes to [`launch`].
const LAUNCH_ARGC: c_int = 4;

/// A `ucontext_t` owned by one table slot.
#[repr(transparent)]
pub struct UContext(libc::ucontext_t);

impl ExecutionContext for UContext {
    fn blank() -> Self {
        // SAFETY: ucontext_t is plain data; all-zero is a valid (if not yet
        // resumable) bit pattern.
        UContext(unsafe { mem::zeroed() })
    }

    fn capture(&mut self) -> io::Result<()> {
        // SAFETY: `self.0` is valid, writable storage.
        if unsafe { libc::getcontext(&mut self.0) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    unsafe fn build(
        &mut self,
        stack: &FiberStack,
        start: StartRoutine,
        payload: *mut c_void,
        continuation: *const Self,
    ) {
        self.0.uc_stack.ss_sp = stack.bottom().cast();
        self.0.uc_stack.ss_size = stack.size();
        self.0.uc_stack.ss_flags = 0;
        // repr(transparent): a `*const UContext` is a `*const ucontext_t`.
        self.0.uc_link = continuation.cast::<libc::ucontext_t>().cast_mut();

        // makecontext only forwards int-sized arguments, so both pointers
        // travel as (high, low) 32-bit halves.
        let (start_hi, start_lo) = split(start as usize);
        let (payload_hi, payload_lo) = split(payload as usize);

        // SAFETY: makecontext calls the function with exactly LAUNCH_ARGC
        // `c_uint` arguments, which is the real signature of `launch`.
        let entry = mem::transmute::<extern "C" fn(c_uint, c_uint, c_uint, c_uint), extern "C" fn()>(
            launch,
        );
        libc::makecontext(
            &mut self.0,
            entry,
            LAUNCH_ARGC,
            start_hi,
            start_lo,
            payload_hi,
            payload_lo,
        );
    }

    unsafe fn switch(from: *mut Self, to: *const Self) -> io::Result<()> {
        if libc::swapcontext(from.cast::<libc::ucontext_t>(), to.cast::<libc::ucontext_t>()) == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl fmt::Debug for UContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UContext")
            .field("stack", &self.0.uc_stack.ss_sp)
            .field("stack_size", &self.0.uc_stack.ss_size)
            .field("has_link", &!self.0.uc_link.is_null())
            .finish()
    }
}

/// First frame on every built context: reassembles the start routine and
/// its payload, then runs it.  Returning from here resumes `uc_link`.
extern "C" fn launch(start_hi: c_uint, start_lo: c_uint, payload_hi: c_uint, payload_lo: c_uint) {
    // SAFETY: the halves were produced by `split` from a valid StartRoutine
    // in `build`.
    let start = unsafe { mem::transmute::<usize, StartRoutine>(join(start_hi, start_lo)) };
    let payload = join(payload_hi, payload_lo) as *mut c_void;
    // SAFETY: `build`'s caller vouched for the payload.
    unsafe { start(payload) }
}

fn split(value: usize) -> (c_uint, c_uint) {
    let wide = value as u64;
    ((wide >> 32) as c_uint, wide as c_uint)
}

fn join(hi: c_uint, lo: c_uint) -> usize {
    (((hi as u64) << 32) | lo as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static SEEN: Cell<usize> = const { Cell::new(0) };
    }

    #[test]
    fn split_and_join_are_inverse() {
        for v in [0usize, 1, 0xFFFF_FFFF, 0x1_0000_0000, usize::MAX, 0x7fff_dead_beef] {
            let (hi, lo) = split(v);
            assert_eq!(join(hi, lo), v);
        }
    }

    unsafe extern "C" fn record_payload(payload: *mut c_void) {
        SEEN.with(|s| s.set(payload as usize));
    }

    #[test]
    fn built_context_runs_start_and_resumes_continuation() {
        let mut main = Box::new(UContext::blank());
        let mut fiber = Box::new(UContext::blank());
        let stack = FiberStack::new(64 * 1024).unwrap();

        fiber.capture().unwrap();
        let main_ptr: *mut UContext = &mut *main;
        unsafe {
            fiber.build(&stack, record_payload, 0xC0FFEE as *mut c_void, main_ptr);
            UContext::switch(main_ptr, &*fiber).unwrap();
        }

        // Back here through uc_link once record_payload returned.
        assert_eq!(SEEN.with(Cell::get), 0xC0FFEE);
    }

    #[test]
    fn blank_context_has_no_stack_or_link() {
        let ctx = UContext::blank();
        assert!(ctx.0.uc_stack.ss_sp.is_null());
        assert!(ctx.0.uc_link.is_null());
    }
}
