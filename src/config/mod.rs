//! Configuration module for RawUtils
//!
//! CLI arguments for both tools and the runtime settings built from them.

mod settings;

pub use settings::*;
