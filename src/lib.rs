//! # RawUtils - cp and ls over raw syscalls
//!
//! RawUtils reimplements a recursive file copier (`rawcp`) and a
//! long-format directory lister (`rawls`) directly on top of the OS
//! primitives: open/read/write/stat/mkdir/getdents64 and friends. No
//! standard allocator or formatting machinery sits on the hot path; every
//! path and output line is built in a bump arena over one anonymous
//! mapping.
//!
//! ## Layers
//!
//! - [`mem`]: the bump [`Arena`](mem::Arena) and terminated
//!   [`ArenaStr`](mem::ArenaStr) strings
//! - [`sys`]: one-call syscall wrappers returning `Result<T, Errno>`
//! - [`text`]: length, compare, concat and decimal rendering
//! - [`fs`]: `getdents64` record decoding and long-format rows
//! - [`core`]: the copy engine and the lister
//! - [`config`]: CLI arguments and runtime settings
//!
//! ## Quick Start
//!
//! ```no_run
//! use rawutils::config::RuntimeConfig;
//! use rawutils::core::simple_copy;
//!
//! let stats = simple_copy(b"/source", b"/destination", &RuntimeConfig::default()).unwrap();
//! println!("Copied {} files ({} bytes)", stats.files_copied, stats.bytes_copied);
//! ```
//!
//! ## Listing
//!
//! ```no_run
//! use rawutils::core::Lister;
//! use rawutils::fs::TimeReference;
//! use rawutils::mem::Arena;
//! use rawutils::sys::RawStream;
//!
//! let arena = Arena::reserve(16 * 1024 * 1024).unwrap();
//! let now = chrono::Utc::now().timestamp();
//! let mut lister = Lister::new(arena, TimeReference::utc(now), RawStream::stdout(), RawStream::stderr());
//! let failures = lister.list_all(&[b"/tmp"]);
//! lister.finish().unwrap();
//! assert_eq!(failures, 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(not(target_os = "linux"))]
compile_error!("rawutils talks to the Linux syscall interface directly (getdents64) and only builds on Linux");

pub mod config;
pub mod core;
pub mod error;
pub mod fs;
pub mod mem;
pub mod sys;
pub mod text;

// Re-export commonly used types
pub use config::RuntimeConfig;
pub use core::{CopyEngine, CopyStats, Lister};
pub use error::{RawError, Result};
pub use mem::{Arena, ArenaStr};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use rawutils::prelude::*;
    //! ```

    pub use crate::config::{CopyArgs, ListArgs, RuntimeConfig};
    pub use crate::core::{report, simple_copy, ByteSink, CopyEngine, CopyStats, Lister};
    pub use crate::error::{RawError, Result};
    pub use crate::fs::{for_each_entry, permission_string, TimeReference};
    pub use crate::mem::{Arena, ArenaStr};
    pub use crate::sys::RawStream;
}
