//! Scratch memory module
//!
//! Provides the bump arena every path and output string is built in.

mod arena;

pub use arena::*;
