//! Directory entry decoding
//!
//! `getdents64` fills a buffer with variable-length records:
//!
//! ```text
//!   offset  0        8        16       18       19
//!           ├────────┼────────┼────────┼────────┼──────────────────┐
//!           │ d_ino  │ d_off  │ reclen │ d_type │ d_name ... \0 pad│
//!           └────────┴────────┴────────┴────────┴──────────────────┘
//!           ◄─────────────────────── reclen ────────────────────────►
//! ```
//!
//! [`DirentIter`] walks such a buffer by record length with bounds checks,
//! so tests can feed it synthetic buffers. [`for_each_entry`] drives it
//! over a live directory handle.

use crate::error::{path_of, RawError, Result};
use crate::sys::{self, Handle};
use std::ffi::CStr;

/// Size of the stack buffer handed to `getdents64`.
pub const DIRENT_BUFFER_SIZE: usize = 8 * 1024;

const INO_OFFSET: usize = 0;
const RECLEN_OFFSET: usize = 16;
const TYPE_OFFSET: usize = 18;
const NAME_OFFSET: usize = 19;

/// `d_type` value for a directory
pub const DT_DIR: u8 = libc::DT_DIR;
/// `d_type` value when the filesystem does not report a type
pub const DT_UNKNOWN: u8 = libc::DT_UNKNOWN;

/// One decoded directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDirEntry<'b> {
    /// Inode number
    pub ino: u64,
    /// Declared record length
    pub record_len: usize,
    /// Kernel type hint (`DT_*`)
    pub kind_hint: u8,
    /// Entry name, without terminator
    pub name: &'b [u8],
    /// Entry name as stored in the record, terminator included
    pub c_name: &'b CStr,
}

impl RawDirEntry<'_> {
    /// Whether this is `.` or `..`
    pub fn is_dot(&self) -> bool {
        is_dot_name(self.name)
    }
}

/// Whether `name` is `.` or `..`
pub fn is_dot_name(name: &[u8]) -> bool {
    name == b"." || name == b".."
}

/// Iterator over the records in a filled `getdents64` buffer
#[derive(Debug, Clone)]
pub struct DirentIter<'b> {
    buf: &'b [u8],
    offset: usize,
    failed: bool,
}

impl<'b> DirentIter<'b> {
    /// Iterate over the first `filled` bytes of `buf`
    pub fn new(buf: &'b [u8], filled: usize) -> Self {
        Self {
            buf: &buf[..filled.min(buf.len())],
            offset: 0,
            failed: false,
        }
    }

    fn malformed(&mut self, record_len: usize) -> Option<Result<RawDirEntry<'b>>> {
        self.failed = true;
        Some(Err(RawError::MalformedDirent {
            offset: self.offset,
            record_len,
            filled: self.buf.len(),
        }))
    }
}

impl<'b> Iterator for DirentIter<'b> {
    type Item = Result<RawDirEntry<'b>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }

        let rest = &self.buf[self.offset..];
        if rest.len() < NAME_OFFSET {
            return self.malformed(rest.len());
        }

        let record_len = u16::from_ne_bytes([rest[RECLEN_OFFSET], rest[RECLEN_OFFSET + 1]]) as usize;
        if record_len < NAME_OFFSET || record_len > rest.len() {
            return self.malformed(record_len);
        }

        let mut ino = [0u8; 8];
        ino.copy_from_slice(&rest[INO_OFFSET..INO_OFFSET + 8]);

        let c_name = match CStr::from_bytes_until_nul(&rest[NAME_OFFSET..record_len]) {
            Ok(name) => name,
            Err(_) => return self.malformed(record_len),
        };

        self.offset += record_len;

        Some(Ok(RawDirEntry {
            ino: u64::from_ne_bytes(ino),
            record_len,
            kind_hint: rest[TYPE_OFFSET],
            name: c_name.to_bytes(),
            c_name,
        }))
    }
}

/// Visit every entry of an open directory except `.` and `..`.
///
/// Entries arrive in whatever order the kernel returns them. `path` only
/// labels diagnostics. The visitor's first error stops the walk.
pub fn for_each_entry<F>(dir: &Handle, path: &[u8], mut visit: F) -> Result<()>
where
    F: FnMut(&RawDirEntry<'_>) -> Result<()>,
{
    let mut buf = [0u8; DIRENT_BUFFER_SIZE];

    loop {
        let filled = match sys::get_dir_entries(dir, &mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(errno) => {
                tracing::debug!("getdents64 failed on {:?}: {}", path_of(path), errno);
                return Err(RawError::DirectoryRead {
                    path: path_of(path),
                    errno,
                });
            }
        };

        for entry in DirentIter::new(&buf, filled) {
            let entry = entry?;
            if entry.is_dot() {
                continue;
            }
            visit(&entry)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use libc::DT_REG;
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use tempfile::TempDir;

    fn push_record(buf: &mut Vec<u8>, ino: u64, kind: u8, name: &[u8]) {
        // header + name + NUL, padded to 8 like the kernel does
        let record_len = (NAME_OFFSET + name.len() + 1 + 7) & !7;
        let start = buf.len();
        buf.resize(start + record_len, 0);

        buf[start..start + 8].copy_from_slice(&ino.to_ne_bytes());
        buf[start + 8..start + 16].copy_from_slice(&(start as i64 + record_len as i64).to_ne_bytes());
        buf[start + RECLEN_OFFSET..start + RECLEN_OFFSET + 2]
            .copy_from_slice(&(record_len as u16).to_ne_bytes());
        buf[start + TYPE_OFFSET] = kind;
        buf[start + NAME_OFFSET..start + NAME_OFFSET + name.len()].copy_from_slice(name);
    }

    #[test]
    fn test_decode_synthetic_buffer() {
        let mut buf = Vec::new();
        push_record(&mut buf, 1, DT_DIR, b".");
        push_record(&mut buf, 2, DT_DIR, b"..");
        push_record(&mut buf, 42, DT_REG, b"a.txt");
        push_record(&mut buf, 43, DT_DIR, b"a_rather_long_directory_name");

        let entries: Vec<_> = DirentIter::new(&buf, buf.len())
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(entries.len(), 4);
        assert!(entries[0].is_dot());
        assert!(entries[1].is_dot());
        assert_eq!(entries[2].name, b"a.txt");
        assert_eq!(entries[2].c_name.to_bytes_with_nul(), b"a.txt\0");
        assert_eq!(entries[2].ino, 42);
        assert_eq!(entries[2].kind_hint, DT_REG);
        assert_eq!(entries[3].name, b"a_rather_long_directory_name");
        assert_eq!(entries[3].kind_hint, DT_DIR);
        assert_eq!(entries.iter().map(|e| e.record_len).sum::<usize>(), buf.len());
    }

    #[test]
    fn test_partial_fill_only_reads_filled_region() {
        let mut buf = Vec::new();
        push_record(&mut buf, 1, DT_REG, b"first");
        let first_len = buf.len();
        push_record(&mut buf, 2, DT_REG, b"second");

        let names: Vec<_> = DirentIter::new(&buf, first_len)
            .map(|e| e.unwrap().name.to_vec())
            .collect();
        assert_eq!(names, vec![b"first".to_vec()]);
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(DirentIter::new(&[], 0).count(), 0);
    }

    #[test]
    fn test_record_running_past_buffer_is_malformed() {
        let mut buf = Vec::new();
        push_record(&mut buf, 1, DT_REG, b"ok");
        let cut = buf.len();
        push_record(&mut buf, 2, DT_REG, b"truncated");

        let mut iter = DirentIter::new(&buf, cut + 20);
        assert!(iter.next().unwrap().is_ok());
        match iter.next() {
            Some(Err(RawError::MalformedDirent { offset, filled, .. })) => {
                assert_eq!(offset, cut);
                assert_eq!(filled, cut + 20);
            }
            other => panic!("expected malformed record, got {:?}", other),
        }
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_zero_record_length_does_not_loop() {
        let mut buf = vec![0u8; 24];
        buf[RECLEN_OFFSET] = 0;
        let results: Vec<_> = DirentIter::new(&buf, buf.len()).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_unterminated_name_is_malformed() {
        let mut buf = Vec::new();
        push_record(&mut buf, 7, DT_REG, b"abc");
        let record_len = buf.len();
        buf[NAME_OFFSET..record_len].fill(b'x');

        let results: Vec<_> = DirentIter::new(&buf, buf.len()).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(RawError::MalformedDirent { offset: 0, .. })));
    }

    #[test]
    fn test_read_failure_is_directory_read_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"not a directory").unwrap();

        let path = CString::new(file.as_os_str().as_bytes()).unwrap();
        let handle = sys::open_for_read(&path).unwrap();

        let mut visits = 0;
        let result = for_each_entry(&handle, path.as_bytes(), |_| {
            visits += 1;
            Ok(())
        });

        match result {
            Err(RawError::DirectoryRead { path: p, errno }) => {
                assert_eq!(p, file);
                assert_eq!(errno, nix::errno::Errno::ENOTDIR);
            }
            other => panic!("expected directory read error, got {:?}", other),
        }
        assert_eq!(visits, 0);
    }

    #[test]
    fn test_for_each_entry_skips_dots() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("one"), b"1").unwrap();
        std::fs::write(dir.path().join("two"), b"2").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let path = CString::new(dir.path().as_os_str().as_bytes()).unwrap();
        let handle = sys::open_directory(&path).unwrap();

        let mut seen = BTreeSet::new();
        for_each_entry(&handle, path.as_bytes(), |entry| {
            seen.insert(entry.name.to_vec());
            Ok(())
        })
        .unwrap();

        let expected: BTreeSet<_> = [b"one".to_vec(), b"sub".to_vec(), b"two".to_vec()].into();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_for_each_entry_many_entries_span_reads() {
        let dir = TempDir::new().unwrap();
        // enough names to need several getdents64 calls
        for i in 0..600 {
            std::fs::write(dir.path().join(format!("entry_with_a_long_name_{:04}", i)), b"").unwrap();
        }

        let path = CString::new(dir.path().as_os_str().as_bytes()).unwrap();
        let handle = sys::open_directory(&path).unwrap();

        let mut count = 0;
        for_each_entry(&handle, path.as_bytes(), |_| {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 600);
    }

    #[test]
    fn test_visitor_error_stops_walk() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("one"), b"1").unwrap();
        std::fs::write(dir.path().join("two"), b"2").unwrap();

        let path = CString::new(dir.path().as_os_str().as_bytes()).unwrap();
        let handle = sys::open_directory(&path).unwrap();

        let mut visits = 0;
        let result = for_each_entry(&handle, path.as_bytes(), |_| {
            visits += 1;
            Err(RawError::NotFound(std::path::PathBuf::from("stop")))
        });
        assert!(result.is_err());
        assert_eq!(visits, 1);
    }
}
