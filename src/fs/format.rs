//! Long-format row rendering
//!
//! Turns one stat record into the fixed columns of a long listing and
//! lays rows out with uniform column widths. No formatting machinery is
//! involved: every field is written byte by byte into arena memory.
//!
//! ```text
//!   drwxr-xr-x  2    0    0 4096 14 Mar 09:41 src
//!   -rw-r--r--  1 1000 1000    5  3 Jan  2021 a.txt
//!   └────┬────┘ └┬┘ └─┬┘ └─┬┘ └─┬┘ └────┬─────┘ └─┬─┘
//!     perms   links uid  gid  size   mod time   name
//! ```

use crate::error::Result;
use crate::mem::{Arena, ArenaStr};
use crate::sys::Metadata;
use crate::text::{decimal_in, int_to_decimal, MAX_DECIMAL_DIGITS};
use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Timelike, Utc};
use nix::sys::stat::{Mode, SFlag};

/// Width of a permission string, separating space included.
pub const PERMISSION_WIDTH: usize = 11;

const MONTHS: [&[u8; 3]; 12] = [
    b"Jan", b"Feb", b"Mar", b"Apr", b"May", b"Jun", b"Jul", b"Aug", b"Sep", b"Oct", b"Nov", b"Dec",
];

// user, group, other in display order
const RWX_BITS: [(Mode, u8); 9] = [
    (Mode::S_IRUSR, b'r'),
    (Mode::S_IWUSR, b'w'),
    (Mode::S_IXUSR, b'x'),
    (Mode::S_IRGRP, b'r'),
    (Mode::S_IWGRP, b'w'),
    (Mode::S_IXGRP, b'x'),
    (Mode::S_IROTH, b'r'),
    (Mode::S_IWOTH, b'w'),
    (Mode::S_IXOTH, b'x'),
];

/// Render the `d?????????` type/permission string plus a separating space
pub fn permission_string(mode: u32) -> [u8; PERMISSION_WIDTH] {
    let mut out = [b'-'; PERMISSION_WIDTH];

    let file_type = mode & SFlag::S_IFMT.bits() as u32;
    if file_type == SFlag::S_IFDIR.bits() as u32 {
        out[0] = b'd';
    }

    for (i, (bit, ch)) in RWX_BITS.iter().enumerate() {
        if mode & bit.bits() as u32 != 0 {
            out[i + 1] = *ch;
        }
    }

    out[PERMISSION_WIDTH - 1] = b' ';
    out
}

/// Reference point for rendering modification times: the zone every
/// timestamp is shown in and the year counted as "current".
///
/// Each timestamp is converted on its own, so entries on either side of a
/// daylight-saving change get their own offset.
#[derive(Debug, Clone)]
pub struct TimeReference<Tz: TimeZone = Utc> {
    tz: Tz,
    current_year: i32,
}

impl<Tz: TimeZone> TimeReference<Tz> {
    /// Build from "now" in epoch seconds and the zone to display in
    pub fn new(now: i64, tz: Tz) -> Self {
        let current_year = local_time(now, &tz).year();
        Self { tz, current_year }
    }

    /// Year entries are compared against
    pub fn current_year(&self) -> i32 {
        self.current_year
    }
}

impl TimeReference<Utc> {
    /// Build from "now", displaying in UTC
    pub fn utc(now: i64) -> Self {
        Self::new(now, Utc)
    }
}

impl TimeReference<FixedOffset> {
    /// Build from "now", displaying at a fixed distance from UTC
    pub fn fixed(now: i64, utc_offset_secs: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| Utc.fix());
        Self::new(now, offset)
    }
}

fn local_time<Tz: TimeZone>(epoch_secs: i64, tz: &Tz) -> DateTime<Tz> {
    match tz.timestamp_opt(epoch_secs, 0).earliest() {
        Some(t) => t,
        None => DateTime::<Utc>::default().with_timezone(tz),
    }
}

/// Render `"<day> <Mon> HH:MM"`, or `"<day> <Mon>  <year>"` when the entry
/// is not from the reference year. Days under 10 get a leading space.
pub fn format_mod_time<'a, Tz: TimeZone>(
    arena: &'a Arena,
    epoch_secs: i64,
    reference: &TimeReference<Tz>,
) -> Result<ArenaStr<'a>> {
    // "dd Mon " + widest of "HH:MM" / " " + year
    let mut buf = [0u8; 7 + 2 + MAX_DECIMAL_DIGITS];
    let len = write_mod_time(&mut buf, epoch_secs, reference);
    arena.alloc_str(&buf[..len])
}

fn write_mod_time<Tz: TimeZone>(buf: &mut [u8], epoch_secs: i64, reference: &TimeReference<Tz>) -> usize {
    let t = local_time(epoch_secs, &reference.tz);

    write_two_digits(&mut buf[0..2], t.day(), b' ');
    buf[2] = b' ';
    buf[3..6].copy_from_slice(MONTHS[t.month0() as usize]);
    buf[6] = b' ';

    if t.year() == reference.current_year {
        write_two_digits(&mut buf[7..9], t.hour(), b'0');
        buf[9] = b':';
        write_two_digits(&mut buf[10..12], t.minute(), b'0');
        12
    } else {
        buf[7] = b' ';
        let mut at = 8;
        let year = t.year();
        if year < 0 {
            buf[at] = b'-';
            at += 1;
        }
        at + int_to_decimal(&mut buf[at..], year.unsigned_abs() as u64)
    }
}

fn write_two_digits(out: &mut [u8], value: u32, pad: u8) {
    out[0] = if value < 10 { pad } else { b'0' + (value / 10) as u8 };
    out[1] = b'0' + (value % 10) as u8;
}

/// One rendered row of a long listing
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    /// Type and permission string, trailing space included
    pub permissions: [u8; PERMISSION_WIDTH],
    /// Hard link count
    pub links: ArenaStr<'a>,
    /// Owner user id
    pub uid: ArenaStr<'a>,
    /// Owner group id
    pub gid: ArenaStr<'a>,
    /// Size in bytes
    pub size: ArenaStr<'a>,
    /// Modification time
    pub mod_time: ArenaStr<'a>,
    /// Entry name as given
    pub name: ArenaStr<'a>,
}

impl<'a> Row<'a> {
    /// Render every field of `meta` for the entry called `name`
    pub fn build<Tz: TimeZone>(
        arena: &'a Arena,
        meta: &Metadata,
        name: &[u8],
        reference: &TimeReference<Tz>,
    ) -> Result<Self> {
        Ok(Self {
            permissions: permission_string(meta.mode),
            links: decimal_in(arena, meta.nlink)?,
            uid: decimal_in(arena, meta.uid as u64)?,
            gid: decimal_in(arena, meta.gid as u64)?,
            size: decimal_in(arena, meta.size)?,
            mod_time: format_mod_time(arena, meta.mtime, reference)?,
            name: arena.alloc_str(name)?,
        })
    }

    fn numeric_columns(&self) -> [ArenaStr<'a>; 4] {
        [self.links, self.uid, self.gid, self.size]
    }

    /// Lay out the row as one `\n`-terminated line, left-padding each
    /// numeric column to `widths`
    pub fn render(&self, arena: &'a Arena, widths: &ColumnWidths) -> Result<ArenaStr<'a>> {
        let columns = self.numeric_columns();
        let widths = widths.as_array();

        let numeric: usize = columns
            .iter()
            .zip(widths.iter())
            .map(|(col, &w)| w.max(col.len()) + 1)
            .sum();
        let len = PERMISSION_WIDTH + numeric + self.mod_time.len() + 1 + self.name.len() + 1;

        let buf = arena.allocate(len + 1)?;
        buf[..PERMISSION_WIDTH].copy_from_slice(&self.permissions);
        let mut at = PERMISSION_WIDTH;

        for (col, &w) in columns.iter().zip(widths.iter()) {
            let pad = w.saturating_sub(col.len());
            buf[at..at + pad].fill(b' ');
            at += pad;
            buf[at..at + col.len()].copy_from_slice(col.as_bytes());
            at += col.len();
            buf[at] = b' ';
            at += 1;
        }

        buf[at..at + self.mod_time.len()].copy_from_slice(self.mod_time.as_bytes());
        at += self.mod_time.len();
        buf[at] = b' ';
        at += 1;
        buf[at..at + self.name.len()].copy_from_slice(self.name.as_bytes());
        at += self.name.len();
        buf[at] = b'\n';
        buf[at + 1] = 0;

        Ok(ArenaStr::from_terminated(buf))
    }
}

/// Widest rendering seen so far in each numeric column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnWidths {
    /// Link count column
    pub links: usize,
    /// User id column
    pub uid: usize,
    /// Group id column
    pub gid: usize,
    /// Size column
    pub size: usize,
}

impl ColumnWidths {
    /// Widen columns to fit `row`
    pub fn observe(&mut self, row: &Row<'_>) {
        self.links = self.links.max(row.links.len());
        self.uid = self.uid.max(row.uid.len());
        self.gid = self.gid.max(row.gid.len());
        self.size = self.size.max(row.size.len());
    }

    fn as_array(&self) -> [usize; 4] {
        [self.links, self.uid, self.gid, self.size]
    }
}

/// The rows of one directory, in the order they were added
#[derive(Debug, Default)]
pub struct Listing<'a> {
    rows: Vec<Row<'a>>,
    widths: ColumnWidths,
}

impl<'a> Listing<'a> {
    /// Create an empty listing
    pub fn new() -> Self {
        Self::default()
    }

    /// First pass: record a row and widen the columns for it
    pub fn push(&mut self, row: Row<'a>) {
        self.widths.observe(&row);
        self.rows.push(row);
    }

    /// Rows in insertion order
    pub fn rows(&self) -> &[Row<'a>] {
        &self.rows
    }

    /// Column widths over every row pushed so far
    pub fn widths(&self) -> ColumnWidths {
        self.widths
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the listing has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Second pass: render every row with uniform padding
    pub fn render_lines(&self, arena: &'a Arena) -> impl Iterator<Item = Result<ArenaStr<'a>>> + '_ {
        self.rows.iter().map(move |row| row.render(arena, &self.widths))
    }
}
