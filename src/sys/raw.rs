//! Thin typed wrappers over the raw syscall surface
//!
//! Every wrapper performs exactly one OS operation and returns either its
//! non-negative result or the errno it failed with. Nothing here retries,
//! buffers or interprets errors.

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::stat::{Mode, SFlag};
use std::ffi::CStr;
use std::os::unix::io::RawFd;

/// Raw syscall result: a value or the errno the call failed with
pub type SysResult<T> = std::result::Result<T, Errno>;

/// Mode used when creating files and directories; the umask applies.
pub const CREATE_MODE: libc::mode_t = 0o666;
/// Mode used when creating directories; the umask applies.
pub const DIR_MODE: libc::mode_t = 0o777;

/// An open file or directory descriptor with a single owner.
///
/// Closed exactly once: by [`Handle::close`] or, failing that, on drop.
#[derive(Debug)]
pub struct Handle {
    fd: RawFd,
}

impl Handle {
    /// Raw descriptor number
    pub fn as_raw(&self) -> RawFd {
        self.fd
    }

    /// Close the descriptor, reporting any error
    pub fn close(self) -> SysResult<()> {
        let fd = self.fd;
        std::mem::forget(self);
        close_handle(fd)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let _ = close_handle(self.fd);
    }
}

/// File kind as reported by stat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file
    Regular,
    /// Directory
    Directory,
    /// Anything else (fifo, socket, device)
    Other,
}

/// Metadata from one raw stat call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// File kind
    pub kind: FileKind,
    /// Size in bytes
    pub size: u64,
    /// Full `st_mode`, type bits included
    pub mode: u32,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// Hard link count
    pub nlink: u64,
    /// Modification time, seconds since the epoch
    pub mtime: i64,
}

impl Metadata {
    /// Whether this is a directory
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Permission bits (rwx for user, group, other plus setuid/setgid/sticky)
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    fn from_raw(st: &libc::stat) -> Self {
        let mode = st.st_mode as u32;
        let kind = match mode & SFlag::S_IFMT.bits() as u32 {
            m if m == SFlag::S_IFDIR.bits() as u32 => FileKind::Directory,
            m if m == SFlag::S_IFREG.bits() as u32 => FileKind::Regular,
            _ => FileKind::Other,
        };

        Self {
            kind,
            size: st.st_size.max(0) as u64,
            mode,
            uid: st.st_uid,
            gid: st.st_gid,
            nlink: st.st_nlink as u64,
            mtime: st.st_mtime,
        }
    }
}

fn open_raw(path: &CStr, flags: OFlag, mode: libc::mode_t) -> SysResult<Handle> {
    let fd = unsafe { libc::open(path.as_ptr(), flags.bits(), mode as libc::c_uint) };
    Errno::result(fd).map(|fd| Handle { fd })
}

/// Open an existing file read-only
pub fn open_for_read(path: &CStr) -> SysResult<Handle> {
    open_raw(path, OFlag::O_RDONLY | OFlag::O_CLOEXEC, 0)
}

/// Open a directory for entry enumeration
pub fn open_directory(path: &CStr) -> SysResult<Handle> {
    open_raw(path, OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC, 0)
}

/// Open the subdirectory `name` of `dir` without following a final symlink
pub fn open_directory_at(dir: &Handle, name: &CStr) -> SysResult<Handle> {
    let flags = OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_NOFOLLOW | OFlag::O_CLOEXEC;
    let fd = unsafe { libc::openat(dir.fd, name.as_ptr(), flags.bits()) };
    Errno::result(fd).map(|fd| Handle { fd })
}

/// Open for writing, creating and truncating as needed
pub fn open_or_create(path: &CStr) -> SysResult<Handle> {
    open_raw(
        path,
        OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC | OFlag::O_CLOEXEC,
        CREATE_MODE,
    )
}

/// Create (or truncate) a file, returning a write handle to it
pub fn create_file(path: &CStr) -> SysResult<Handle> {
    let fd = unsafe { libc::creat(path.as_ptr(), CREATE_MODE) };
    Errno::result(fd).map(|fd| Handle { fd })
}

/// Close a raw descriptor
pub fn close_handle(fd: RawFd) -> SysResult<()> {
    Errno::result(unsafe { libc::close(fd) }).map(drop)
}

/// Read up to `buf.len()` bytes; `0` means end of file
pub fn read(handle: &Handle, buf: &mut [u8]) -> SysResult<usize> {
    let n = unsafe { libc::read(handle.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    Errno::result(n).map(|n| n as usize)
}

/// Write once; the count may be short
pub fn write(fd: RawFd, buf: &[u8]) -> SysResult<usize> {
    let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
    Errno::result(n).map(|n| n as usize)
}

/// Write the whole buffer, looping over short writes
pub fn write_all(fd: RawFd, mut buf: &[u8]) -> SysResult<()> {
    while !buf.is_empty() {
        match write(fd, buf) {
            Ok(0) => return Err(Errno::EIO),
            Ok(n) => buf = &buf[n..],
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Stat a path, following symbolic links
pub fn stat_path(path: &CStr) -> SysResult<Metadata> {
    let mut st = std::mem::MaybeUninit::<libc::stat>::uninit();
    let ret = unsafe { libc::stat(path.as_ptr(), st.as_mut_ptr()) };
    Errno::result(ret)?;
    // SAFETY: stat filled the buffer on success
    Ok(Metadata::from_raw(unsafe { &st.assume_init() }))
}

/// Create a directory
pub fn make_directory(path: &CStr) -> SysResult<()> {
    Errno::result(unsafe { libc::mkdir(path.as_ptr(), DIR_MODE) }).map(drop)
}

/// Remove an empty directory
pub fn remove_directory(path: &CStr) -> SysResult<()> {
    Errno::result(unsafe { libc::rmdir(path.as_ptr()) }).map(drop)
}

/// Remove a file
pub fn remove_file(path: &CStr) -> SysResult<()> {
    Errno::result(unsafe { libc::unlink(path.as_ptr()) }).map(drop)
}

/// Remove the entry `name` of `dir`; `directory` selects rmdir semantics
pub fn remove_at(dir: &Handle, name: &CStr, directory: bool) -> SysResult<()> {
    let flags = if directory { libc::AT_REMOVEDIR } else { 0 };
    Errno::result(unsafe { libc::unlinkat(dir.fd, name.as_ptr(), flags) }).map(drop)
}

/// Move a directory handle back to its first entry
pub fn rewind_directory(dir: &Handle) -> SysResult<()> {
    Errno::result(unsafe { libc::lseek(dir.fd, 0, libc::SEEK_SET) }).map(drop)
}

/// Set a file's length
pub fn truncate(path: &CStr, length: u64) -> SysResult<()> {
    let length = libc::off_t::try_from(length).map_err(|_| Errno::EFBIG)?;
    Errno::result(unsafe { libc::truncate(path.as_ptr(), length) }).map(drop)
}

/// Set permission bits
pub fn chmod(path: &CStr, mode: u32) -> SysResult<()> {
    let mode = Mode::from_bits_truncate(mode as libc::mode_t);
    Errno::result(unsafe { libc::chmod(path.as_ptr(), mode.bits()) }).map(drop)
}

/// Whether `path` exists and is readable by the caller
pub fn path_accessible(path: &CStr) -> bool {
    unsafe { libc::access(path.as_ptr(), libc::R_OK) == 0 }
}

/// Fill `buf` with `linux_dirent64` records; `0` means end of directory
pub fn get_dir_entries(dir: &Handle, buf: &mut [u8]) -> SysResult<usize> {
    let n = unsafe {
        libc::syscall(
            libc::SYS_getdents64,
            dir.fd as libc::c_long,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len() as libc::c_long,
        )
    };
    Errno::result(n).map(|n| n as usize)
}

/// Terminate the process immediately with `code`
pub fn terminate_process(code: i32) -> ! {
    unsafe { libc::exit(code) }
}

/// One of the standard output streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStream {
    fd: RawFd,
}

impl RawStream {
    /// Standard output
    pub fn stdout() -> Self {
        Self { fd: libc::STDOUT_FILENO }
    }

    /// Standard error
    pub fn stderr() -> Self {
        Self { fd: libc::STDERR_FILENO }
    }

    /// Write every part in order, unbuffered
    pub fn write_parts(&self, parts: &[&[u8]]) -> SysResult<()> {
        for part in parts {
            write_all(self.fd, part)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn name(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn c_path(path: &Path) -> CString {
        CString::new(path.as_os_str().as_bytes()).unwrap()
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = TempDir::new().unwrap();
        let path = c_path(&dir.path().join("data.bin"));

        let out = open_or_create(&path).unwrap();
        write_all(out.as_raw(), b"raw bytes").unwrap();
        out.close().unwrap();

        let input = open_for_read(&path).unwrap();
        let mut buf = [0u8; 32];
        let n = read(&input, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"raw bytes");
        assert_eq!(read(&input, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_stat_kinds_and_size() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("five"), b"12345").unwrap();

        let meta = stat_path(&c_path(&dir.path().join("five"))).unwrap();
        assert_eq!(meta.kind, FileKind::Regular);
        assert_eq!(meta.size, 5);
        assert!(meta.nlink >= 1);

        let meta = stat_path(&c_path(dir.path())).unwrap();
        assert!(meta.is_dir());

        let err = stat_path(&c_path(&dir.path().join("missing"))).unwrap_err();
        assert_eq!(err, Errno::ENOENT);
    }

    #[test]
    fn test_directory_lifecycle() {
        let dir = TempDir::new().unwrap();
        let sub = c_path(&dir.path().join("sub"));

        make_directory(&sub).unwrap();
        assert_eq!(make_directory(&sub).unwrap_err(), Errno::EEXIST);
        remove_directory(&sub).unwrap();
        assert!(!dir.path().join("sub").exists());
    }

    #[test]
    fn test_truncate_and_chmod() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"0123456789").unwrap();
        let path = c_path(&file);

        truncate(&path, 4).unwrap();
        assert_eq!(std::fs::read(&file).unwrap(), b"0123");

        chmod(&path, 0o640).unwrap();
        let mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);

        remove_file(&path).unwrap();
        assert!(!path_accessible(&path));
    }

    #[test]
    fn test_create_file_truncates() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"old contents").unwrap();

        create_file(&c_path(&file)).unwrap().close().unwrap();
        assert_eq!(std::fs::metadata(&file).unwrap().len(), 0);
    }

    #[test]
    fn test_open_directory_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();

        assert_eq!(open_directory(&c_path(&file)).unwrap_err(), Errno::ENOTDIR);
        assert!(open_directory(&c_path(dir.path())).is_ok());
    }

    #[test]
    fn test_relative_open_and_remove() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/f"), b"x").unwrap();

        let root = open_directory(&c_path(dir.path())).unwrap();
        let sub = open_directory_at(&root, &name("sub")).unwrap();

        assert_eq!(remove_at(&root, &name("sub"), true).unwrap_err(), Errno::ENOTEMPTY);
        assert_eq!(remove_at(&sub, &name("f"), true).unwrap_err(), Errno::ENOTDIR);
        remove_at(&sub, &name("f"), false).unwrap();
        remove_at(&root, &name("sub"), true).unwrap();
        assert!(!dir.path().join("sub").exists());
    }

    #[test]
    fn test_open_directory_at_rejects_symlink() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink("real", dir.path().join("link")).unwrap();

        let root = open_directory(&c_path(dir.path())).unwrap();
        assert!(open_directory_at(&root, &name("link")).is_err());
        assert!(open_directory_at(&root, &name("real")).is_ok());
    }

    #[test]
    fn test_rewind_directory() {
        let dir = TempDir::new().unwrap();
        let handle = open_directory(&c_path(dir.path())).unwrap();
        let mut buf = [0u8; 4096];

        let first = get_dir_entries(&handle, &mut buf).unwrap();
        assert_eq!(get_dir_entries(&handle, &mut buf).unwrap(), 0);
        rewind_directory(&handle).unwrap();
        assert_eq!(get_dir_entries(&handle, &mut buf).unwrap(), first);
    }

    #[test]
    fn test_get_dir_entries_reaches_eof() {
        let dir = TempDir::new().unwrap();
        let handle = open_directory(&c_path(dir.path())).unwrap();
        let mut buf = [0u8; 4096];

        // "." and ".." come first, then the stream ends
        assert!(get_dir_entries(&handle, &mut buf).unwrap() > 0);
        assert_eq!(get_dir_entries(&handle, &mut buf).unwrap(), 0);
    }
}
