//! Error types for RawUtils
//!
//! Every failure of the copier and the lister is unrecoverable for the
//! current top-level invocation; this module defines the taxonomy they
//! report and the glue that lifts raw syscall results into it.

use nix::errno::Errno;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for RawUtils operations
#[derive(Error, Debug)]
pub enum RawError {
    /// Source path missing or not readable
    #[error("cannot access '{0}': No such file or directory")]
    NotFound(PathBuf),

    /// Destination exists but is not a directory
    #[error("target '{0}' is not a directory")]
    NotADirectory(PathBuf),

    /// Source and destination are the same literal path
    #[error("'{0}' and '{0}' are the same file")]
    SameFile(PathBuf),

    /// Destination lies inside the source directory
    #[error("cannot copy a directory, '{src}', into itself, '{dst}'")]
    IntoItself { src: PathBuf, dst: PathBuf },

    /// Destination could not be opened for writing
    #[error("cannot open '{0}' for writing: Permission denied")]
    PermissionDenied(PathBuf),

    /// Arena capacity exceeded
    #[error("out of scratch memory: requested {requested} bytes, {remaining} of {capacity} left")]
    AllocationExhausted {
        requested: usize,
        remaining: usize,
        capacity: usize,
    },

    /// A wrapped OS call failed
    #[error("{op} '{path}': {errno}")]
    Syscall {
        op: &'static str,
        path: PathBuf,
        errno: Errno,
    },

    /// Directory enumeration failed mid-scan
    #[error("reading directory '{path}': {errno}")]
    DirectoryRead { path: PathBuf, errno: Errno },

    /// A directory record does not fit the buffer it was read into
    #[error("malformed directory entry at offset {offset} (record length {record_len}, buffer {filled})")]
    MalformedDirent {
        offset: usize,
        record_len: usize,
        filled: usize,
    },
}

impl RawError {
    /// Create a syscall error for a byte path
    pub fn syscall(op: &'static str, path: &[u8], errno: Errno) -> Self {
        Self::Syscall {
            op,
            path: path_of(path),
            errno,
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::NotFound(path)
            | Self::NotADirectory(path)
            | Self::SameFile(path)
            | Self::PermissionDenied(path)
            | Self::Syscall { path, .. }
            | Self::DirectoryRead { path, .. }
            | Self::IntoItself { src: path, .. } => Some(path),
            _ => None,
        }
    }

    /// Get the OS error number, if this error came from a syscall
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::Syscall { errno, .. } | Self::DirectoryRead { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Check if the underlying OS error was "no such file or directory"
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound(_)) || self.errno() == Some(Errno::ENOENT)
    }
}

/// Result type alias for RawUtils operations
pub type Result<T> = std::result::Result<T, RawError>;

/// Convert raw path bytes into a `PathBuf` for diagnostics
pub fn path_of(bytes: &[u8]) -> PathBuf {
    PathBuf::from(OsStr::from_bytes(bytes))
}

/// Extension trait for adding operation and path context to a raw syscall result
pub trait SysResultExt<T> {
    /// Lift an errno into [`RawError::Syscall`]
    fn with_op(self, op: &'static str, path: &[u8]) -> Result<T>;
}

impl<T> SysResultExt<T> for std::result::Result<T, Errno> {
    fn with_op(self, op: &'static str, path: &[u8]) -> Result<T> {
        self.map_err(|errno| RawError::syscall(op, path, errno))
    }
}
