//! Entry type and attribute model
//!
//! These types describe a single filesystem entry as the walker sees it:
//! a type hint from the directory stream, and optionally a full set of
//! `stat` attributes when the configuration (or an unknown hint) required
//! the extra syscall.

/// Type of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Block device
    BlockDevice,
    /// Character device
    CharDevice,
    /// Named pipe (FIFO)
    Fifo,
    /// Unix socket
    Socket,
    /// Unknown type (directory stream gave no hint and stat was unavailable)
    Unknown,
}

impl EntryType {
    /// Convert from a directory-stream `d_type` value
    pub fn from_dirent_type(d_type: u8) -> Self {
        match d_type {
            libc::DT_BLK => EntryType::BlockDevice,
            libc::DT_CHR => EntryType::CharDevice,
            libc::DT_DIR => EntryType::Directory,
            libc::DT_FIFO => EntryType::Fifo,
            libc::DT_LNK => EntryType::Symlink,
            libc::DT_REG => EntryType::File,
            libc::DT_SOCK => EntryType::Socket,
            _ => EntryType::Unknown,
        }
    }

    /// Convert from stat mode bits
    pub fn from_mode(mode: u32) -> Self {
        match mode & libc::S_IFMT {
            libc::S_IFREG => EntryType::File,
            libc::S_IFDIR => EntryType::Directory,
            libc::S_IFLNK => EntryType::Symlink,
            libc::S_IFBLK => EntryType::BlockDevice,
            libc::S_IFCHR => EntryType::CharDevice,
            libc::S_IFIFO => EntryType::Fifo,
            libc::S_IFSOCK => EntryType::Socket,
            _ => EntryType::Unknown,
        }
    }

    /// Convert from a `--type` search character (values taken from find(1))
    pub fn from_search_char(c: char) -> Option<Self> {
        match c {
            'b' => Some(EntryType::BlockDevice),
            'c' => Some(EntryType::CharDevice),
            'd' => Some(EntryType::Directory),
            'p' => Some(EntryType::Fifo),
            'l' => Some(EntryType::Symlink),
            'f' => Some(EntryType::File),
            's' => Some(EntryType::Socket),
            _ => None,
        }
    }

    /// Type tag string used in JSON output
    pub fn json_label(&self) -> &'static str {
        match self {
            EntryType::BlockDevice => "blockdev",
            EntryType::CharDevice => "chardev",
            EntryType::Directory => "dir",
            EntryType::Fifo => "fifo",
            EntryType::Symlink => "symlink",
            EntryType::File => "regfile",
            EntryType::Socket => "unixsock",
            EntryType::Unknown => "unknown",
        }
    }

    /// Check if this is a directory
    pub fn is_dir(&self) -> bool {
        *self == EntryType::Directory
    }
}

/// Attributes of a filesystem entry, as returned by lstat/fstatat
///
/// Timestamps carry nanoseconds alongside the epoch seconds so that copies
/// can restore atime/mtime at full utimensat resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryStat {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime: i64,
    pub atime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub ctime: i64,
    pub ctime_nsec: i64,
}

impl EntryStat {
    /// Get the entry type from the mode bits
    pub fn entry_type(&self) -> EntryType {
        EntryType::from_mode(self.mode)
    }

    /// Check if the mode bits describe a directory
    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFDIR
    }
}

impl From<libc::stat> for EntryStat {
    fn from(st: libc::stat) -> Self {
        Self {
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
            mode: st.st_mode as u32,
            nlink: st.st_nlink as u64,
            uid: st.st_uid as u32,
            gid: st.st_gid as u32,
            rdev: st.st_rdev as u64,
            size: st.st_size as u64,
            blksize: st.st_blksize as u64,
            blocks: st.st_blocks as u64,
            atime: st.st_atime as i64,
            atime_nsec: st.st_atime_nsec as i64,
            mtime: st.st_mtime as i64,
            mtime_nsec: st.st_mtime_nsec as i64,
            ctime: st.st_ctime as i64,
            ctime_nsec: st.st_ctime_nsec as i64,
        }
    }
}

/// A discovered entry on its way through the filter and action pipelines
///
/// `hint` comes from the directory stream and may be `Unknown`; `stat` is
/// only populated when the configuration forces stat calls or the hint was
/// `Unknown`, and is `None` when the stat syscall failed.
#[derive(Debug, Clone, Copy)]
pub struct EntryView<'a> {
    /// Full constructed path (parent + "/" + name)
    pub path: &'a str,

    /// Type hint from the directory stream
    pub hint: EntryType,

    /// Stat attributes, when obtained
    pub stat: Option<&'a EntryStat>,
}

impl<'a> EntryView<'a> {
    /// Resolve the entry type: a known hint wins, else stat mode bits,
    /// else `Unknown`.
    pub fn resolved_type(&self) -> EntryType {
        if self.hint != EntryType::Unknown {
            return self.hint;
        }
        match self.stat {
            Some(st) => st.entry_type(),
            None => EntryType::Unknown,
        }
    }

    /// Check if the entry is known to be a directory
    pub fn is_directory(&self) -> bool {
        self.resolved_type().is_dir()
    }

    /// Check if the entry is known NOT to be a directory
    ///
    /// Entries of unknown type with no stat info are neither: filters that
    /// apply to non-directories only reject them.
    pub fn is_non_directory(&self) -> bool {
        match self.resolved_type() {
            EntryType::Unknown => false,
            t => !t.is_dir(),
        }
    }

    /// Basename of the entry path
    pub fn file_name(&self) -> &'a str {
        match self.path.rfind('/') {
            Some(pos) => &self.path[pos + 1..],
            None => self.path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_from_mode() {
        assert_eq!(EntryType::from_mode(0o100644), EntryType::File);
        assert_eq!(EntryType::from_mode(0o040755), EntryType::Directory);
        assert_eq!(EntryType::from_mode(0o120777), EntryType::Symlink);
        assert_eq!(EntryType::from_mode(0o140755), EntryType::Socket);
    }

    #[test]
    fn test_entry_type_from_search_char() {
        assert_eq!(EntryType::from_search_char('f'), Some(EntryType::File));
        assert_eq!(EntryType::from_search_char('d'), Some(EntryType::Directory));
        assert_eq!(EntryType::from_search_char('p'), Some(EntryType::Fifo));
        assert_eq!(EntryType::from_search_char('x'), None);
    }

    #[test]
    fn test_json_labels() {
        assert_eq!(EntryType::File.json_label(), "regfile");
        assert_eq!(EntryType::Symlink.json_label(), "symlink");
        assert_eq!(EntryType::Socket.json_label(), "unixsock");
        assert_eq!(EntryType::Unknown.json_label(), "unknown");
    }

    #[test]
    fn test_resolved_type_prefers_hint() {
        let st = EntryStat {
            mode: 0o040755,
            ..Default::default()
        };
        let view = EntryView {
            path: "/data/f",
            hint: EntryType::File,
            stat: Some(&st),
        };
        assert_eq!(view.resolved_type(), EntryType::File);

        let view = EntryView {
            path: "/data/f",
            hint: EntryType::Unknown,
            stat: Some(&st),
        };
        assert_eq!(view.resolved_type(), EntryType::Directory);

        let view = EntryView {
            path: "/data/f",
            hint: EntryType::Unknown,
            stat: None,
        };
        assert_eq!(view.resolved_type(), EntryType::Unknown);
    }

    #[test]
    fn test_non_directory_requires_known_type() {
        let view = EntryView {
            path: "/data/f",
            hint: EntryType::Unknown,
            stat: None,
        };
        assert!(!view.is_directory());
        assert!(!view.is_non_directory());
    }

    #[test]
    fn test_file_name() {
        let view = EntryView {
            path: "/data/sub/f.txt",
            hint: EntryType::File,
            stat: None,
        };
        assert_eq!(view.file_name(), "f.txt");
    }
}
