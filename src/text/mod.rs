//! String operations module
//!
//! Length, copy, concatenation, comparison and decimal rendering over
//! terminated byte strings allocated from an arena.

mod strings;

pub use strings::*;
