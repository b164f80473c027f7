//! Safe wrappers over the raw filesystem syscalls the walker needs
//!
//! The traversal engine works below `std::fs`: it needs the directory
//! stream's type hints (`d_type`), stat relative to an open directory
//! descriptor (avoiding a path-walk race with concurrent renames), xattr
//! existence probes, and exact control over open flags and timestamp
//! updates during copies. All unsafe FFI is encapsulated here with proper
//! error handling; callers only ever see `io::Result`.

use crate::entry::{EntryStat, EntryType};
use std::ffi::{CStr, CString};
use std::fs::File;
use std::io;
use std::os::fd::{FromRawFd, RawFd};

/// Convert a path string into a `CString`, mapping interior NULs to an error
fn to_cstring(path: &str) -> io::Result<CString> {
    CString::new(path.as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))
}

/// One entry read from a `DirStream`
///
/// The raw name bytes are captured before the next `readdir` call
/// invalidates the dirent, and are what syscalls like `fstatat` receive.
#[derive(Debug)]
pub struct DirStreamEntry {
    name: CString,
    hint: EntryType,
}

impl DirStreamEntry {
    /// Raw entry name for use in *at syscalls
    pub fn name_c(&self) -> &CStr {
        &self.name
    }

    /// Entry name for path construction and matching (lossy UTF-8)
    pub fn file_name(&self) -> String {
        String::from_utf8_lossy(self.name.as_bytes()).into_owned()
    }

    /// Type hint from the directory stream (`Unknown` when the filesystem
    /// does not fill in `d_type`)
    pub fn hint(&self) -> EntryType {
        self.hint
    }

    /// Check if this is the "." or ".." entry
    pub fn is_dot(&self) -> bool {
        matches!(self.name.as_bytes(), b"." | b"..")
    }
}

/// An open directory stream (opendir/readdir/closedir with RAII cleanup)
///
/// `DirStream` is Send but not Sync: each stream is owned by exactly one
/// scanning thread and closed before `scan` returns.
#[derive(Debug)]
pub struct DirStream {
    dir: *mut libc::DIR,
}

unsafe impl Send for DirStream {}

impl DirStream {
    /// Open a directory for iteration
    pub fn open(path: &str) -> io::Result<Self> {
        let c_path = to_cstring(path)?;
        let dir = unsafe { libc::opendir(c_path.as_ptr()) };
        if dir.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { dir })
    }

    /// File descriptor of the open stream, for fstatat
    pub fn fd(&self) -> RawFd {
        unsafe { libc::dirfd(self.dir) }
    }

    /// Read the next entry
    ///
    /// Returns `Ok(None)` at end of stream. readdir reports errors through
    /// errno, so errno is cleared before the call to tell the two NULL
    /// cases apart.
    pub fn next_entry(&mut self) -> io::Result<Option<DirStreamEntry>> {
        unsafe {
            *libc::__errno_location() = 0;
        }

        let dirent = unsafe { libc::readdir(self.dir) };
        if dirent.is_null() {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(0) {
                return Ok(None); // end of stream
            }
            return Err(err);
        }

        let name = unsafe { CStr::from_ptr((*dirent).d_name.as_ptr()) }.to_owned();
        let hint = EntryType::from_dirent_type(unsafe { (*dirent).d_type });

        Ok(Some(DirStreamEntry { name, hint }))
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        unsafe {
            libc::closedir(self.dir);
        }
    }
}

/// Stat an entry relative to an open directory, without following symlinks
pub fn fstatat_nofollow(dirfd: RawFd, name: &CStr) -> io::Result<EntryStat> {
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let res = unsafe { libc::fstatat(dirfd, name.as_ptr(), &mut st, libc::AT_SYMLINK_NOFOLLOW) };
    if res != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(EntryStat::from(st))
}

/// lstat a path (does not follow a final symlink)
pub fn lstat(path: &str) -> io::Result<EntryStat> {
    let c_path = to_cstring(path)?;
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let res = unsafe { libc::lstat(c_path.as_ptr(), &mut st) };
    if res != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(EntryStat::from(st))
}

/// stat a path (follows symlinks; used for --newer and --mount references)
pub fn stat(path: &str) -> io::Result<EntryStat> {
    let c_path = to_cstring(path)?;
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let res = unsafe { libc::stat(c_path.as_ptr(), &mut st) };
    if res != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(EntryStat::from(st))
}

/// Probe an extended attribute on a path without following symlinks
///
/// A zero-length get is enough to learn whether the attribute exists; the
/// value itself is never fetched.
pub fn xattr_exists(path: &str, attr_name: &CStr) -> io::Result<()> {
    let c_path = to_cstring(path)?;
    let res = unsafe {
        libc::lgetxattr(
            c_path.as_ptr(),
            attr_name.as_ptr(),
            std::ptr::null_mut(),
            0,
        )
    };
    if res < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read a symlink target into the given buffer, returning the number of
/// bytes written (readlink does not NUL-terminate)
pub fn readlink_into(path: &str, buf: &mut [u8]) -> io::Result<usize> {
    let c_path = to_cstring(path)?;
    let res = unsafe {
        libc::readlink(
            c_path.as_ptr(),
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
        )
    };
    if res < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(res as usize)
}

/// Create a symlink at `dest` pointing to `target` (raw bytes)
pub fn symlink(target: &[u8], dest: &str) -> io::Result<()> {
    let c_target = CString::new(target)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "link target contains NUL"))?;
    let c_dest = to_cstring(dest)?;
    let res = unsafe { libc::symlink(c_target.as_ptr(), c_dest.as_ptr()) };
    if res != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Create a directory with the given mode
pub fn mkdir(path: &str, mode: u32) -> io::Result<()> {
    let c_path = to_cstring(path)?;
    let res = unsafe { libc::mkdir(c_path.as_ptr(), mode as libc::mode_t) };
    if res != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Unlink a path
pub fn unlink(path: &str) -> io::Result<()> {
    let c_path = to_cstring(path)?;
    let res = unsafe { libc::unlink(c_path.as_ptr()) };
    if res != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// atime/mtime pair taken from a source entry's stat info
#[derive(Debug, Clone, Copy)]
pub struct FileTimes {
    pub atime: i64,
    pub atime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
}

impl FileTimes {
    pub fn from_stat(st: &EntryStat) -> Self {
        Self {
            atime: st.atime,
            atime_nsec: st.atime_nsec,
            mtime: st.mtime,
            mtime_nsec: st.mtime_nsec,
        }
    }

    fn as_timespec(&self) -> [libc::timespec; 2] {
        [
            libc::timespec {
                tv_sec: self.atime,
                tv_nsec: self.atime_nsec,
            },
            libc::timespec {
                tv_sec: self.mtime,
                tv_nsec: self.mtime_nsec,
            },
        ]
    }
}

/// Set atime/mtime on a path, optionally without following a final symlink
pub fn set_file_times(path: &str, times: FileTimes, follow_symlink: bool) -> io::Result<()> {
    let c_path = to_cstring(path)?;
    let ts = times.as_timespec();
    let flags = if follow_symlink {
        0
    } else {
        libc::AT_SYMLINK_NOFOLLOW
    };
    let res = unsafe { libc::utimensat(libc::AT_FDCWD, c_path.as_ptr(), ts.as_ptr(), flags) };
    if res != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Set atime/mtime through an open file descriptor
pub fn set_fd_times(file: &File, times: FileTimes) -> io::Result<()> {
    use std::os::fd::AsRawFd;
    let ts = times.as_timespec();
    let res = unsafe { libc::futimens(file.as_raw_fd(), ts.as_ptr()) };
    if res != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Open a file read-only with a no-atime-update hint
///
/// O_NOATIME is refused with EPERM for files the caller does not own, in
/// which case the open is retried without the hint.
pub fn open_read_noatime(path: &str) -> io::Result<File> {
    let c_path = to_cstring(path)?;

    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY | libc::O_NOATIME) };
    if fd >= 0 {
        return Ok(unsafe { File::from_raw_fd(fd) });
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::EPERM) {
        return Err(err);
    }

    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { File::from_raw_fd(fd) })
}

/// Open (create/truncate) a copy destination file with the given mode
pub fn open_create_trunc(path: &str, mode: u32) -> io::Result<File> {
    let c_path = to_cstring(path)?;
    let fd = unsafe {
        libc::open(
            c_path.as_ptr(),
            libc::O_CREAT | libc::O_TRUNC | libc::O_WRONLY,
            mode as libc::mode_t,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { File::from_raw_fd(fd) })
}

/// Resolve a user name to a numeric UID via the passwd database
pub fn lookup_uid(name: &str) -> Option<u32> {
    let c_name = CString::new(name.as_bytes()).ok()?;
    let pw = unsafe { libc::getpwnam(c_name.as_ptr()) };
    if pw.is_null() {
        return None;
    }
    Some(unsafe { (*pw).pw_uid } as u32)
}

/// Resolve a group name to a numeric GID via the group database
pub fn lookup_gid(name: &str) -> Option<u32> {
    let c_name = CString::new(name.as_bytes()).ok()?;
    let gr = unsafe { libc::getgrnam(c_name.as_ptr()) };
    if gr.is_null() {
        return None;
    }
    Some(unsafe { (*gr).gr_gid } as u32)
}

/// Send SIGTERM to the whole process group
///
/// Last-resort teardown: a child spawned by the exec action that died on a
/// signal may have siblings in the same group that the in-process fatal
/// flag cannot reach.
pub fn terminate_process_group() {
    unsafe {
        libc::kill(0, libc::SIGTERM);
    }
}
