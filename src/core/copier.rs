//! Recursive copy engine
//!
//! Copies a file or a directory tree into a destination directory using
//! only the raw syscall layer. Every path is built in the caller's arena;
//! the call stack is the task queue.
//!
//! Per invocation:
//!
//! 1. the source must be accessible, else [`RawError::NotFound`]
//! 2. identical source and destination strings fail with [`RawError::SameFile`]
//! 3. a directory source whose destination lies below it fails with
//!    [`RawError::IntoItself`]
//! 4. a missing destination is created as a directory; an existing
//!    non-directory fails with [`RawError::NotADirectory`]
//! 5. a directory source has its entries copied into the destination,
//!    recursing into subdirectories; a regular file is copied into the
//!    destination under its base name; anything else is skipped with a
//!    diagnostic
//!
//! If step 4 created the destination and a later step fails, the whole
//! destination tree is removed again on the way out, deepest entries first.
//! A destination that already existed is never touched by cleanup.
//!
//! A directory's entries are gathered and its handle closed before any
//! child is copied, so recursion depth costs neither descriptors nor
//! `getdents64` buffers.

use crate::config::{RuntimeConfig, COPIER_NAME};
use crate::core::ByteSink;
use crate::error::{path_of, RawError, Result, SysResultExt};
use crate::fs::{for_each_entry, DT_DIR, DT_UNKNOWN};
use crate::mem::{Arena, ArenaStr};
use crate::sys::{self, FileKind, Handle, Metadata};
use crate::text::{base_name, compare, is_path_within, join_path};
use nix::errno::Errno;
use std::cmp::Ordering;
use std::ffi::CStr;

/// Longest entry name `getdents64` can return, terminator included
const NAME_CAPACITY: usize = 256;

/// Copy operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Regular files copied
    pub files_copied: u64,
    /// Bytes streamed
    pub bytes_copied: u64,
    /// Directories created
    pub dirs_created: u64,
    /// Entries skipped with a diagnostic
    pub skipped: u64,
}

/// Removes a directory tree this invocation created unless disarmed
#[derive(Debug)]
pub struct CleanupGuard<'a> {
    path: ArenaStr<'a>,
    armed: bool,
}

impl<'a> CleanupGuard<'a> {
    /// Guard a freshly created directory
    pub fn new(path: ArenaStr<'a>) -> Self {
        Self { path, armed: true }
    }

    /// Keep the directory
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        match remove_tree(self.path) {
            Ok(()) => tracing::debug!("Removed {:?} after failure", path_of(self.path.as_bytes())),
            Err(e) => tracing::warn!(
                "Could not remove {:?} after failure: {}",
                path_of(self.path.as_bytes()),
                e
            ),
        }
    }
}

/// Remove `path` and everything below it
fn remove_tree(path: ArenaStr<'_>) -> Result<()> {
    let dir = sys::open_directory(path.as_c_str()).with_op("cannot open directory", path.as_bytes())?;
    clear_directory(&dir, path.as_bytes())?;
    dir.close().with_op("cannot close directory", path.as_bytes())?;
    sys::remove_directory(path.as_c_str()).with_op("cannot remove directory", path.as_bytes())
}

/// Empty the open directory `dir` without allocating.
///
/// Each pass unlinks every non-directory it sees and remembers one
/// subdirectory, which is emptied and removed once the pass is over. Passes
/// repeat from the start of the directory until one finds nothing.
fn clear_directory(dir: &Handle, label: &[u8]) -> Result<()> {
    loop {
        sys::rewind_directory(dir).with_op("cannot rewind directory", label)?;

        let mut seen = false;
        let mut subdir = [0u8; NAME_CAPACITY];
        let mut subdir_len = 0;

        for_each_entry(dir, label, |entry| {
            seen = true;
            if entry.kind_hint != DT_DIR {
                match sys::remove_at(dir, entry.c_name, false) {
                    Ok(()) => return Ok(()),
                    Err(Errno::EISDIR) if entry.kind_hint == DT_UNKNOWN => {}
                    Err(errno) => return Err(RawError::syscall("cannot remove", entry.name, errno)),
                }
            }
            if subdir_len == 0 {
                let name = entry.c_name.to_bytes_with_nul();
                if name.len() > subdir.len() {
                    return Err(RawError::syscall("cannot remove", entry.name, Errno::ENAMETOOLONG));
                }
                subdir[..name.len()].copy_from_slice(name);
                subdir_len = name.len();
            }
            Ok(())
        })?;

        if !seen {
            return Ok(());
        }
        if subdir_len == 0 {
            continue;
        }

        let name = CStr::from_bytes_until_nul(&subdir[..subdir_len])
            .map_err(|_| RawError::syscall("cannot remove", &subdir[..subdir_len], Errno::EINVAL))?;
        let child = sys::open_directory_at(dir, name).with_op("cannot open directory", name.to_bytes())?;
        clear_directory(&child, name.to_bytes())?;
        child.close().with_op("cannot close directory", name.to_bytes())?;
        sys::remove_at(dir, name, true).with_op("cannot remove directory", name.to_bytes())?;
    }
}

/// Main copy engine
pub struct CopyEngine<'a, D: ByteSink> {
    /// Scratch memory for paths
    arena: &'a Arena,
    /// Streaming buffer, carved from the arena once
    chunk: &'a mut [u8],
    /// Where diagnostics go
    diagnostics: D,
    /// Counters
    stats: CopyStats,
}

impl<'a, D: ByteSink> CopyEngine<'a, D> {
    /// Create a new copy engine
    pub fn new(arena: &'a Arena, config: &RuntimeConfig, diagnostics: D) -> Result<Self> {
        let chunk = arena.allocate(config.chunk_size.max(1))?;

        Ok(Self {
            arena,
            chunk,
            diagnostics,
            stats: CopyStats::default(),
        })
    }

    /// Counters so far
    pub fn stats(&self) -> CopyStats {
        self.stats
    }

    /// Copy `source` into the directory `destination`
    pub fn execute(&mut self, source: &[u8], destination: &[u8]) -> Result<CopyStats> {
        let src = self.arena.alloc_str(source)?;
        let dst = self.arena.alloc_str(destination)?;

        if !sys::path_accessible(src.as_c_str()) {
            return Err(RawError::NotFound(path_of(src.as_bytes())));
        }

        // literal comparison: two spellings of one inode are not caught
        if compare(src.as_bytes(), dst.as_bytes()) == Ordering::Equal {
            return Err(RawError::SameFile(path_of(src.as_bytes())));
        }

        let src_meta = stat(src)?;
        if src_meta.is_dir() && is_path_within(src.as_bytes(), dst.as_bytes()) {
            return Err(RawError::IntoItself {
                src: path_of(src.as_bytes()),
                dst: path_of(dst.as_bytes()),
            });
        }

        let guard = self.resolve_destination(dst)?;

        let target = stat(dst)?;
        if !target.is_dir() {
            return Err(RawError::NotADirectory(path_of(dst.as_bytes())));
        }

        if src_meta.is_dir() {
            self.copy_dir_contents(src, dst)?;
        } else {
            let file_dst = join_path(self.arena, dst.as_bytes(), base_name(src.as_bytes()))?;
            self.copy_file(src, file_dst)?;
        }

        if let Some(guard) = guard {
            guard.disarm();
        }

        tracing::debug!(
            "Copied {} files ({}), created {} directories, skipped {}",
            self.stats.files_copied,
            humansize::format_size(self.stats.bytes_copied, humansize::BINARY),
            self.stats.dirs_created,
            self.stats.skipped
        );

        Ok(self.stats)
    }

    /// Create `dst` if it is missing; a guard comes back only if it was created
    fn resolve_destination(&mut self, dst: ArenaStr<'a>) -> Result<Option<CleanupGuard<'a>>> {
        if self.ensure_directory(dst)? {
            Ok(Some(CleanupGuard::new(dst)))
        } else {
            Ok(None)
        }
    }

    /// Make sure `path` is a directory, creating it if missing.
    /// Returns whether it was created.
    fn ensure_directory(&mut self, path: ArenaStr<'a>) -> Result<bool> {
        match sys::stat_path(path.as_c_str()) {
            Ok(meta) if meta.is_dir() => Ok(false),
            Ok(_) => Err(RawError::NotADirectory(path_of(path.as_bytes()))),
            Err(Errno::ENOENT) => {
                sys::make_directory(path.as_c_str()).with_op("cannot create directory", path.as_bytes())?;
                self.stats.dirs_created += 1;
                tracing::debug!("Created directory {:?}", path_of(path.as_bytes()));
                Ok(true)
            }
            Err(errno) => Err(RawError::syscall("cannot stat", path.as_bytes(), errno)),
        }
    }

    /// Copy every entry of the directory `src` into the directory `dst`
    fn copy_dir_contents(&mut self, src: ArenaStr<'a>, dst: ArenaStr<'a>) -> Result<()> {
        let dir = sys::open_directory(src.as_c_str()).with_op("cannot open directory", src.as_bytes())?;
        let arena = self.arena;
        let mut children = Vec::new();

        for_each_entry(&dir, src.as_bytes(), |entry| {
            let child_src = join_path(arena, src.as_bytes(), entry.name)?;
            let child_dst = join_path(arena, dst.as_bytes(), entry.name)?;
            children.push((child_src, child_dst));
            Ok(())
        })?;
        dir.close().with_op("cannot close directory", src.as_bytes())?;

        for (child_src, child_dst) in children {
            self.copy_entry(child_src, child_dst)?;
        }
        Ok(())
    }

    fn copy_entry(&mut self, src: ArenaStr<'a>, dst: ArenaStr<'a>) -> Result<()> {
        if stat(src)?.is_dir() {
            self.ensure_directory(dst)?;
            self.copy_dir_contents(src, dst)
        } else {
            self.copy_file(src, dst)
        }
    }

    /// Byte-copy one regular file, then match its size and permission bits
    fn copy_file(&mut self, src: ArenaStr<'a>, dst: ArenaStr<'a>) -> Result<()> {
        let src_meta = stat(src)?;
        match src_meta.kind {
            FileKind::Regular => {}
            FileKind::Directory => return self.omit(src, b"is a directory"),
            FileKind::Other => return self.omit(src, b"not a regular file"),
        }

        let input = sys::open_for_read(src.as_c_str()).with_op("cannot open", src.as_bytes())?;

        let existed = sys::stat_path(dst.as_c_str()).is_ok();
        sys::create_file(dst.as_c_str())
            .map_err(|errno| destination_error("cannot create", dst.as_bytes(), errno))?
            .close()
            .with_op("cannot close", dst.as_bytes())?;

        let output = match sys::open_or_create(dst.as_c_str()) {
            Ok(handle) => handle,
            Err(errno) => {
                self.discard_partial(dst, existed);
                return Err(destination_error("cannot open", dst.as_bytes(), errno));
            }
        };

        let copied = match self.stream(&input, &output, src, dst) {
            Ok(copied) => copied,
            Err(e) => {
                drop(output);
                self.discard_partial(dst, existed);
                return Err(e);
            }
        };

        reconcile_size(src, dst)?;
        sys::chmod(dst.as_c_str(), src_meta.permissions()).with_op("cannot set permissions on", dst.as_bytes())?;
        output.close().with_op("cannot close", dst.as_bytes())?;

        self.stats.files_copied += 1;
        self.stats.bytes_copied += copied;
        tracing::debug!(
            "Copied {:?} -> {:?} ({})",
            path_of(src.as_bytes()),
            path_of(dst.as_bytes()),
            humansize::format_size(copied, humansize::BINARY)
        );

        Ok(())
    }

    /// Skip `src` with a diagnostic
    fn omit(&mut self, src: ArenaStr<'a>, reason: &[u8]) -> Result<()> {
        self.stats.skipped += 1;
        tracing::debug!("Skipping {:?}", path_of(src.as_bytes()));
        self.diagnostics.put_all(&[
            COPIER_NAME.as_bytes(),
            b": omitting '",
            src.as_bytes(),
            b"': ",
            reason,
            b"\n",
        ])
    }

    /// Pump chunks until read reports end of file
    fn stream(&mut self, input: &Handle, output: &Handle, src: ArenaStr<'a>, dst: ArenaStr<'a>) -> Result<u64> {
        let mut copied = 0u64;

        loop {
            let n = sys::read(input, self.chunk).with_op("error reading", src.as_bytes())?;
            if n == 0 {
                break;
            }

            sys::write_all(output.as_raw(), &self.chunk[..n]).with_op("error writing", dst.as_bytes())?;
            copied += n as u64;
        }

        Ok(copied)
    }

    /// Remove a destination file this call created; pre-existing files stay
    fn discard_partial(&self, dst: ArenaStr<'a>, existed: bool) {
        if existed {
            return;
        }
        if let Err(e) = sys::remove_file(dst.as_c_str()) {
            tracing::warn!("Could not remove partial file {:?}: {}", path_of(dst.as_bytes()), e);
        }
    }
}

/// Truncate `dst` to the current size of `src` when they differ.
/// Returns whether it truncated.
fn reconcile_size(src: ArenaStr<'_>, dst: ArenaStr<'_>) -> Result<bool> {
    let src_size = stat(src)?.size;
    let dst_size = stat(dst)?.size;
    if src_size == dst_size {
        return Ok(false);
    }

    tracing::debug!(
        "Size mismatch on {:?} ({} vs {}), truncating",
        path_of(dst.as_bytes()),
        dst_size,
        src_size
    );
    sys::truncate(dst.as_c_str(), src_size).with_op("cannot truncate", dst.as_bytes())?;
    Ok(true)
}

/// Errors creating or opening a destination file
fn destination_error(op: &'static str, dst: &[u8], errno: Errno) -> RawError {
    match errno {
        Errno::EACCES | Errno::EPERM => RawError::PermissionDenied(path_of(dst)),
        errno => RawError::syscall(op, dst, errno),
    }
}

fn stat(path: ArenaStr<'_>) -> Result<Metadata> {
    sys::stat_path(path.as_c_str()).map_err(|errno| match errno {
        Errno::ENOENT => RawError::NotFound(path_of(path.as_bytes())),
        errno => RawError::syscall("cannot stat", path.as_bytes(), errno),
    })
}

/// Copy `source` into `destination` with a fresh arena sized by `config`
pub fn simple_copy(source: &[u8], destination: &[u8], config: &RuntimeConfig) -> Result<CopyStats> {
    let arena = Arena::reserve(config.arena_capacity)?;
    let stats = {
        let mut engine = CopyEngine::new(&arena, config, sys::RawStream::stderr())?;
        engine.execute(source, destination)?
    };
    arena.release()?;
    Ok(stats)
}
