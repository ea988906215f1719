//! Byte-string primitives built over the arena
//!
//! Strings follow C conventions: a NUL byte, when present, terminates the
//! string and nothing after it is looked at.

use crate::error::Result;
use crate::mem::{Arena, ArenaStr};
use std::cmp::Ordering;

/// Widest decimal rendering of a `u64`.
pub const MAX_DECIMAL_DIGITS: usize = 20;

/// Length of `s` up to (not including) the first NUL
pub fn length(s: &[u8]) -> usize {
    s.iter().position(|&b| b == 0).unwrap_or(s.len())
}

/// Copy the first `n` bytes of `src` into `dest`.
///
/// # Panics
///
/// Panics if either slice is shorter than `n`.
pub fn copy(dest: &mut [u8], src: &[u8], n: usize) {
    dest[..n].copy_from_slice(&src[..n]);
}

/// Allocate `a` followed by `b` plus a terminator
pub fn concat<'a>(arena: &'a Arena, a: &[u8], b: &[u8]) -> Result<ArenaStr<'a>> {
    concat_all(arena, &[a, b])
}

/// Allocate every part back to back plus a terminator
pub fn concat_all<'a>(arena: &'a Arena, parts: &[&[u8]]) -> Result<ArenaStr<'a>> {
    let lens: usize = parts.iter().map(|p| length(p)).sum();
    let buf = arena.allocate(lens + 1)?;

    let mut at = 0;
    for part in parts {
        let n = length(part);
        copy(&mut buf[at..], part, n);
        at += n;
    }
    buf[at] = 0;

    Ok(ArenaStr::from_terminated(buf))
}

/// Build `dir/name`, without doubling a trailing slash on `dir`
pub fn join_path<'a>(arena: &'a Arena, dir: &[u8], name: &[u8]) -> Result<ArenaStr<'a>> {
    let dir = &dir[..length(dir)];
    if dir.is_empty() || dir.ends_with(b"/") {
        concat(arena, dir, name)
    } else {
        concat_all(arena, &[dir, b"/", name])
    }
}

/// Final component of `path`, ignoring trailing slashes
pub fn base_name(path: &[u8]) -> &[u8] {
    let path = &path[..length(path)];
    let trimmed = match path.iter().rposition(|&b| b != b'/') {
        Some(last) => &path[..=last],
        // all slashes (or empty): the root is its own base name
        None => return if path.is_empty() { path } else { &path[..1] },
    };

    match trimmed.iter().rposition(|&b| b == b'/') {
        Some(slash) => &trimmed[slash + 1..],
        None => trimmed,
    }
}

/// Whether `path` names something strictly below the directory `dir`.
///
/// Purely textual: `dir` and `dir/x` match, `./dir/x` or `dir/../dir/x`
/// do not.
pub fn is_path_within(dir: &[u8], path: &[u8]) -> bool {
    let dir = &dir[..length(dir)];
    let path = &path[..length(path)];
    let dir = match dir.iter().rposition(|&b| b != b'/') {
        Some(last) => &dir[..=last],
        // "/" (or "//"): everything absolute is below it
        None if !dir.is_empty() => &dir[..0],
        None => return false,
    };

    path.len() > dir.len() + 1
        && path.starts_with(dir)
        && path[dir.len()] == b'/'
        && path[dir.len()..].iter().any(|&b| b != b'/')
}

/// Compare byte by byte, stopping at the first mismatch or terminator
pub fn compare(a: &[u8], b: &[u8]) -> Ordering {
    let mut i = 0;
    loop {
        let ca = a.get(i).copied().unwrap_or(0);
        let cb = b.get(i).copied().unwrap_or(0);

        if ca != cb {
            return ca.cmp(&cb);
        }
        if ca == 0 {
            return Ordering::Equal;
        }
        i += 1;
    }
}

/// Number of decimal digits in `n` (`0` has one)
pub fn digit_count(mut n: u64) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

/// Render `n` into the front of `buf`, least-significant digit written
/// first at the rightmost position. Returns the digit count.
///
/// # Panics
///
/// Panics if `buf` is shorter than [`digit_count`]`(n)`.
pub fn int_to_decimal(buf: &mut [u8], mut n: u64) -> usize {
    let digits = digit_count(n);
    let mut pos = digits;

    loop {
        pos -= 1;
        buf[pos] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }

    digits
}

/// Allocate the decimal rendering of `n`
pub fn decimal_in(arena: &Arena, n: u64) -> Result<ArenaStr<'_>> {
    let mut digits = [0u8; MAX_DECIMAL_DIGITS];
    let len = int_to_decimal(&mut digits, n);
    arena.alloc_str(&digits[..len])
}
