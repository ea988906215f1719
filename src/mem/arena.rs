//! Bump arena over a single anonymous mapping
//!
//! ```text
//!   base                      cursor                         base + limit
//!   ├──────┬──────┬───────────┼──────────────────────────────┤
//!   │  s1  │  s2  │    s3     │          free space          │
//!   └──────┴──────┴───────────┴──────────────────────────────┘
//! ```
//!
//! Each allocation bumps the cursor forward. Nothing is freed individually:
//! [`Arena::reset`] rewinds the cursor to `base`, [`Arena::release`] unmaps
//! the whole region. `reset` takes `&mut self`, so no slice handed out by
//! [`Arena::allocate`] can survive it.

use crate::error::{RawError, Result};
use nix::errno::Errno;
use std::cell::Cell;
use std::ffi::CStr;
use std::fmt;
use std::ptr::{self, NonNull};

/// Default capacity of a process-wide arena (256 MiB).
pub const DEFAULT_ARENA_CAPACITY: usize = 256 * 1024 * 1024;

/// A bump allocator over one fixed-capacity private mapping
pub struct Arena {
    base: NonNull<u8>,
    cursor: Cell<usize>,
    limit: usize,
    released: bool,
}

impl Arena {
    /// Map `capacity` bytes of zeroed, read-write, process-private memory.
    pub fn reserve(capacity: usize) -> Result<Self> {
        // mmap rejects zero-length mappings
        let len = capacity.max(1);

        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if addr == libc::MAP_FAILED {
            return Err(RawError::syscall("mmap", b"<arena>", Errno::last()));
        }

        let base = NonNull::new(addr as *mut u8)
            .ok_or_else(|| RawError::syscall("mmap", b"<arena>", Errno::ENOMEM))?;

        tracing::debug!(
            "Reserved arena of {}",
            humansize::format_size(len as u64, humansize::BINARY)
        );

        Ok(Self {
            base,
            cursor: Cell::new(0),
            limit: capacity,
            released: false,
        })
    }

    /// Bump the cursor by `n` bytes and hand out the region it passed over.
    ///
    /// Returned regions never overlap. Memory handed out after a [`reset`]
    /// may hold bytes from earlier allocations.
    ///
    /// [`reset`]: Arena::reset
    #[allow(clippy::mut_from_ref)]
    pub fn allocate(&self, n: usize) -> Result<&mut [u8]> {
        let start = self.cursor.get();
        let end = start
            .checked_add(n)
            .filter(|&end| end <= self.limit)
            .ok_or(RawError::AllocationExhausted {
                requested: n,
                remaining: self.limit - start,
                capacity: self.limit,
            })?;

        self.cursor.set(end);

        // SAFETY: [start, end) lies inside the mapping and the cursor only
        // moves forward until `reset`, which needs `&mut self`, so no other
        // live slice covers these bytes.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr().add(start), n) })
    }

    /// Copy `bytes` into the arena and append a terminator.
    ///
    /// The copy stops at the first NUL in `bytes`, as a C string would.
    pub fn alloc_str(&self, bytes: &[u8]) -> Result<ArenaStr<'_>> {
        let len = crate::text::length(bytes);
        let buf = self.allocate(len + 1)?;
        buf[..len].copy_from_slice(&bytes[..len]);
        buf[len] = 0;
        Ok(ArenaStr { with_nul: buf })
    }

    /// Rewind the cursor to the start of the region.
    pub fn reset(&mut self) {
        tracing::debug!("Arena reset after {} bytes", self.cursor.get());
        self.cursor.set(0);
    }

    /// Return the mapping to the OS.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.unmap()
    }

    fn unmap(&self) -> Result<()> {
        let ret = unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.limit.max(1)) };
        Errno::result(ret)
            .map(drop)
            .map_err(|errno| RawError::syscall("munmap", b"<arena>", errno))
    }

    /// Bytes handed out since the last reset
    pub fn used(&self) -> usize {
        self.cursor.get()
    }

    /// Bytes still available
    pub fn remaining(&self) -> usize {
        self.limit - self.cursor.get()
    }

    /// Total capacity of the mapping
    pub fn capacity(&self) -> usize {
        self.limit
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.unmap() {
                tracing::warn!("Failed to release arena: {}", e);
            }
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("used", &self.used())
            .field("capacity", &self.limit)
            .finish()
    }
}

/// A terminated byte string living inside an [`Arena`]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ArenaStr<'a> {
    // Always ends in exactly one NUL, with no NUL before it.
    with_nul: &'a [u8],
}

impl<'a> ArenaStr<'a> {
    /// Bytes without the terminator
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.with_nul[..self.with_nul.len() - 1]
    }

    /// Bytes including the terminator
    pub fn as_bytes_with_nul(&self) -> &'a [u8] {
        self.with_nul
    }

    /// View as a C string for passing to syscalls
    pub fn as_c_str(&self) -> &'a CStr {
        // SAFETY: constructors write exactly one trailing NUL and copy no
        // byte at or past the first NUL of their input.
        unsafe { CStr::from_bytes_with_nul_unchecked(self.with_nul) }
    }

    /// Length in bytes, excluding the terminator
    pub fn len(&self) -> usize {
        self.with_nul.len() - 1
    }

    /// Whether the string is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn from_terminated(with_nul: &'a [u8]) -> Self {
        debug_assert_eq!(with_nul.last(), Some(&0));
        Self { with_nul }
    }
}

impl fmt::Debug for ArenaStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}
