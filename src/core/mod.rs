//! Core engines
//!
//! The recursive copier, the long-format lister, and the byte sinks they
//! write their output and diagnostics to.

mod copier;
mod lister;
mod sink;

pub use copier::*;
pub use lister::*;
pub use sink::*;
