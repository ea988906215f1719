//! File system module
//!
//! Directory-entry decoding over `getdents64` and long-format row
//! rendering for the lister.

mod dirent;
mod format;

pub use dirent::*;
pub use format::*;
