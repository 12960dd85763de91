/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fiber stack buffers.
//!
//! Each [`FiberStack`] is an anonymous private mapping laid out as:
//!
//! ```text
//! low addr                                               high addr
//! ┌────────────┬───────────────────────────────────────────────┐
//! │ guard page │ usable stack (size rounded up to whole pages) │
//! │ PROT_NONE  │ PROT_READ | PROT_WRITE          grows ◄────── │
//! └────────────┴───────────────────────────────────────────────┘
//! ```
//!
//! The stack grows downwards, so an overflow runs into the guard page and
//! faults instead of silently corrupting a neighbouring allocation.
//!
//! A `FiberStack` has exactly one owner.  The mapping is released in `Drop`,
//! so a stack is unmapped exactly once.

use std::fmt;
use std::io;
use std::ptr::{self, NonNull};

use thiserror::Error;
use tracing::error;

/// Fallback used only if `sysconf(_SC_PAGESIZE)` reports nonsense.
const FALLBACK_PAGE_SIZE: usize = 4096;

/// Why a stack could not be mapped.
#[derive(Debug, Error)]
pub enum StackError {
    /// Rounding the request up to whole pages (plus the guard page)
    /// overflows `usize`.
    #[error("stack size of {requested} bytes overflows when rounded to whole pages")]
    SizeOverflow { requested: usize },

    #[error("mmap of {len} bytes failed: {source}")]
    Map {
        len: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to protect the guard page: {source}")]
    Guard {
        #[source]
        source: io::Error,
    },
}

/// Size of one page on this machine.
pub fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if raw > 0 {
        raw as usize
    } else {
        FALLBACK_PAGE_SIZE
    }
}

/// A guarded, page-aligned stack region owned by a single fiber.
pub struct FiberStack {
    /// Start of the whole mapping (the guard page).
    base: NonNull<u8>,
    /// Length of the whole mapping, guard page included.
    mapped_len: usize,
    guard_len: usize,
}

impl FiberStack {
    /// Maps a new stack with at least `size` usable bytes.
    pub fn new(size: usize) -> Result<Self, StackError> {
        let page = page_size();
        let usable = size
            .checked_add(page - 1)
            .map(|s| s & !(page - 1))
            .ok_or(StackError::SizeOverflow { requested: size })?;
        let mapped_len = usable
            .checked_add(page)
            .ok_or(StackError::SizeOverflow { requested: size })?;

        // SAFETY: anonymous private mapping, no file descriptor involved; the
        // kernel picks the address.
        let raw = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapped_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_STACK,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(StackError::Map {
                len: mapped_len,
                source: io::Error::last_os_error(),
            });
        }
        let base = NonNull::new(raw.cast::<u8>()).ok_or_else(|| StackError::Map {
            len: mapped_len,
            source: io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping"),
        })?;

        // SAFETY: the first page lies inside the mapping created above.
        if unsafe { libc::mprotect(raw, page, libc::PROT_NONE) } != 0 {
            let source = io::Error::last_os_error();
            // SAFETY: unmapping exactly the region mapped above.
            unsafe { libc::munmap(raw, mapped_len) };
            return Err(StackError::Guard { source });
        }

        Ok(Self {
            base,
            mapped_len,
            guard_len: page,
        })
    }

    /// Lowest usable address (just above the guard page).
    pub fn bottom(&self) -> *mut u8 {
        // SAFETY: guard_len < mapped_len, so the result stays in the mapping.
        unsafe { self.base.as_ptr().add(self.guard_len) }
    }

    /// One past the highest usable address.  Stacks grow down from here.
    pub fn top(&self) -> *mut u8 {
        // SAFETY: one-past-the-end of the mapping.
        unsafe { self.base.as_ptr().add(self.mapped_len) }
    }

    /// Usable bytes, excluding the guard page.
    pub fn size(&self) -> usize {
        self.mapped_len - self.guard_len
    }
}

impl Drop for FiberStack {
    fn drop(&mut self) {
        // SAFETY: `base`/`mapped_len` describe exactly the mapping made in
        // `new`, and `FiberStack` is not `Clone`, so this runs once.
        let rc = unsafe { libc::munmap(self.base.as_ptr().cast(), self.mapped_len) };
        if rc != 0 {
            error!(
                base  = ?self.base,
                len   = self.mapped_len,
                error = %io::Error::last_os_error(),
                "munmap of fiber stack failed"
            );
        }
    }
}

impl fmt::Debug for FiberStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberStack")
            .field("bottom", &self.bottom())
            .field("size", &self.size())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
