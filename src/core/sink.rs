//! Output sinks
//!
//! Tool output and diagnostics are raw byte sequences. In the binaries
//! they go straight to a standard stream with no buffering; tests collect
//! them in a `Vec<u8>`.

use crate::error::{RawError, Result};
use crate::sys::RawStream;

/// Trait for destinations of raw output bytes
pub trait ByteSink {
    /// Write all of `bytes`
    fn put(&mut self, bytes: &[u8]) -> Result<()>;

    /// Write every part in order
    fn put_all(&mut self, parts: &[&[u8]]) -> Result<()> {
        for part in parts {
            self.put(part)?;
        }
        Ok(())
    }
}

impl ByteSink for RawStream {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_parts(&[bytes])
            .map_err(|errno| RawError::syscall("write", b"<stream>", errno))
    }
}

impl ByteSink for Vec<u8> {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).put(bytes)
    }
}

/// Write `"<tool>: <error>\n"` to `sink`, ignoring failures to do so
pub fn report<S: ByteSink + ?Sized>(sink: &mut S, tool: &str, err: &RawError) {
    let message = err.to_string();
    let _ = sink.put_all(&[tool.as_bytes(), b": ", message.as_bytes(), b"\n"]);
}
