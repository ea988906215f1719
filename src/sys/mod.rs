//! Raw syscall module
//!
//! Typed, single-call wrappers over open/close/read/write/stat/mkdir/rmdir/
//! creat/unlink/truncate/chmod/getdents64/access/exit.

mod raw;

pub use raw::*;
