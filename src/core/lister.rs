//! Long-format lister
//!
//! Each path argument gets one listing built in two passes: stat every
//! entry into a [`Listing`] while column widths grow, then render every row
//! with uniform padding. The arena is reset between arguments, so scratch
//! memory never outlives the argument that allocated it.
//!
//! An entry that cannot be stat'ed (a dangling symlink, or one removed
//! after enumeration) is reported and left out; the rest of its directory
//! is still listed.

use crate::config::LISTER_NAME;
use crate::core::{report, ByteSink};
use crate::error::{path_of, RawError, Result, SysResultExt};
use crate::fs::{for_each_entry, Listing, Row, TimeReference};
use crate::mem::{Arena, ArenaStr};
use crate::sys::{self, Metadata};
use crate::text::join_path;
use chrono::{TimeZone, Utc};
use nix::errno::Errno;

/// Lists paths to `out`, reporting failures to `err`
pub struct Lister<W: ByteSink, E: ByteSink, Tz: TimeZone = Utc> {
    arena: Arena,
    reference: TimeReference<Tz>,
    out: W,
    err: E,
    /// Whether anything has been written to `out` yet
    emitted: bool,
}

impl<W: ByteSink, E: ByteSink, Tz: TimeZone> Lister<W, E, Tz> {
    /// Create a lister owning `arena`
    pub fn new(arena: Arena, reference: TimeReference<Tz>, out: W, err: E) -> Self {
        Self {
            arena,
            reference,
            out,
            err,
            emitted: false,
        }
    }

    /// List every path in order, continuing past failures.
    ///
    /// Returns the number of paths that could not be listed completely.
    pub fn list_all<P: AsRef<[u8]>>(&mut self, paths: &[P]) -> usize {
        let with_header = paths.len() > 1;
        let mut failures = 0;

        for path in paths {
            match self.list_path(path.as_ref(), with_header) {
                Ok(0) => {}
                Ok(_) => failures += 1,
                Err(e) => {
                    report(&mut self.err, LISTER_NAME, &e);
                    failures += 1;
                }
            }
        }

        failures
    }

    /// List one path: a directory's entries, or a single row for anything else.
    ///
    /// Returns how many entries were reported and skipped.
    pub fn list_path(&mut self, path: &[u8], with_header: bool) -> Result<usize> {
        self.arena.reset();
        let arena = &self.arena;

        let target = arena.alloc_str(path)?;
        let meta = stat(target)?;

        let mut listing = Listing::new();
        let mut skipped = 0;
        if meta.is_dir() {
            skipped = collect_entries(arena, target, &self.reference, &mut listing, &mut self.err)?;
        } else {
            listing.push(Row::build(arena, &meta, target.as_bytes(), &self.reference)?);
        }

        // render everything before writing so a late failure prints nothing
        let lines = listing.render_lines(arena).collect::<Result<Vec<_>>>()?;

        if self.emitted && with_header {
            self.out.put(b"\n")?;
        }
        if with_header && meta.is_dir() {
            self.out.put_all(&[target.as_bytes(), b":\n"])?;
        }
        for line in &lines {
            self.out.put(line.as_bytes())?;
        }
        self.emitted = true;

        tracing::debug!(
            "Listed {:?}: {} rows, {} bytes of scratch",
            path_of(path),
            lines.len(),
            arena.used()
        );

        Ok(skipped)
    }

    /// Unmap the arena
    pub fn finish(self) -> Result<()> {
        self.arena.release()
    }
}

/// First pass over a directory: one row per entry, widths tracked.
/// Entries that cannot be stat'ed are reported to `err` and counted.
fn collect_entries<'a, Tz: TimeZone, E: ByteSink>(
    arena: &'a Arena,
    dir_path: ArenaStr<'a>,
    reference: &TimeReference<Tz>,
    listing: &mut Listing<'a>,
    err: &mut E,
) -> Result<usize> {
    let dir = sys::open_directory(dir_path.as_c_str()).with_op("cannot open directory", dir_path.as_bytes())?;
    let mut skipped = 0;

    for_each_entry(&dir, dir_path.as_bytes(), |entry| {
        let child = join_path(arena, dir_path.as_bytes(), entry.name)?;
        match stat(child) {
            Ok(meta) => listing.push(Row::build(arena, &meta, entry.name, reference)?),
            Err(e) => {
                report(err, LISTER_NAME, &e);
                skipped += 1;
            }
        }
        Ok(())
    })?;

    dir.close().with_op("cannot close directory", dir_path.as_bytes())?;
    Ok(skipped)
}

fn stat(path: ArenaStr<'_>) -> Result<Metadata> {
    sys::stat_path(path.as_c_str()).map_err(|errno| match errno {
        Errno::ENOENT => RawError::NotFound(path_of(path.as_bytes())),
        errno => RawError::syscall("cannot access", path.as_bytes(), errno),
    })
}
