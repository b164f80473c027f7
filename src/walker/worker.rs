//! Worker thread logic
//!
//! Each worker loops over `SharedStack::pop_wait` and scans one directory
//! at a time. Scanning a directory means: read its entries, resolve each
//! entry's type (directory-stream hint, stat on demand), route the entry
//! through the filter and action pipelines, and for subdirectories decide
//! between publishing to the stack (breadth) and recursing inline (depth).

use crate::action::ActionPipeline;
use crate::entry::{EntryType, EntryView};
use crate::filter::FilterPipeline;
use crate::sys::{self, DirStream};
use crate::walker::{PopOutcome, ScanContext};
use std::ffi::CStr;
use tracing::{debug, warn};

/// A scan thread: pipelines plus the shared context handles
pub struct Walker {
    ctx: ScanContext,
    filters: FilterPipeline,
    actions: ActionPipeline,
}

impl Walker {
    pub fn new(ctx: ScanContext) -> Self {
        let filters = FilterPipeline::new(ctx.config.clone());
        let actions = ActionPipeline::new(ctx.config.clone(), ctx.stats.clone());
        Self {
            ctx,
            filters,
            actions,
        }
    }

    /// Worker main loop: pop directories until the stack reports the scan
    /// is done
    pub fn run(&self, worker_id: usize) {
        debug!("Worker {worker_id} started");

        loop {
            match self.ctx.stack.pop_wait() {
                PopOutcome::Item(item) => self.scan(&item.dir_path, item.depth),
                PopOutcome::Done => break,
            }
        }

        debug!("Worker {worker_id} finished");
    }

    /// Scan one directory
    ///
    /// `dir_depth` is the depth of the entries inside this directory,
    /// relative to the scan-path root. Does a breadth scan while the
    /// stack is below the godeep threshold (discovered dirs go onto the
    /// stack so other threads can grab them), otherwise switches to
    /// recursive depth search.
    pub fn scan(&self, dir_path: &str, dir_depth: u16) {
        if self.ctx.should_stop() {
            return;
        }

        let config = &self.ctx.config;
        let stats = &self.ctx.stats;

        let mut stream = match DirStream::open(dir_path) {
            Ok(stream) => stream,
            Err(e) => {
                stats.record_error();
                warn!("Failed to open dir: '{dir_path}'; Error: {e}");

                if matches!(e.raw_os_error(), Some(libc::EACCES) | Some(libc::ENOENT)) {
                    return; // common during concurrent traversal of a live tree
                }

                self.ctx.raise_fatal();
                return;
            }
        };

        // loop over the contents of this entire directory, potentially
        // recursively descending into subdirs along the way
        loop {
            let entry = match stream.next_entry() {
                Ok(Some(entry)) => entry,
                Ok(None) => return, // end of stream; stream closes on drop
                Err(e) => {
                    warn!("Failed to read from dir: {dir_path}; Error: {e}");
                    stats.record_error();
                    return;
                }
            };

            if entry.is_dot() {
                continue;
            }

            let hint = entry.hint();

            // if the dentry type is unknown we have to stat to know
            // whether this is a dir to descend into
            let stat = if config.stat_all || hint == EntryType::Unknown {
                stats.record_stat_call();

                match sys::fstatat_nofollow(stream.fd(), entry.name_c()) {
                    Ok(st) => Some(st),
                    Err(e) => {
                        warn!(
                            "Failed to get attributes for path: {dir_path}/{}; Error: {e}",
                            entry.file_name()
                        );
                        stats.record_error();
                        None
                    }
                }
            } else {
                None
            };

            if hint == EntryType::Unknown {
                stats.record_unknown();
            }

            let entry_path = format!("{dir_path}/{}", entry.file_name());

            let is_dir = hint == EntryType::Directory
                || (hint == EntryType::Unknown && stat.as_ref().is_some_and(|st| st.is_dir()));

            let view = EntryView {
                path: &entry_path,
                hint,
                stat: stat.as_ref(),
            };

            if is_dir {
                stats.record_dir();

                self.check_acls(&entry_path, true);
                self.process_entry(&view);

                let descend_depth = dir_depth < config.max_dir_depth;
                let descend_mount = match config.filter_mount_id {
                    None => true,
                    Some(mount_id) => stat.as_ref().is_some_and(|st| st.dev == mount_id),
                };

                if descend_depth && descend_mount {
                    if self.ctx.stack.size() >= config.godeep_threshold {
                        self.scan(&entry_path, dir_depth + 1);
                    } else {
                        // breadth search: add the dir to the stack for
                        // later processing
                        self.ctx.stack.push(entry_path, dir_depth + 1);
                    }
                }
            } else {
                // not a directory, or unknown with stat error
                stats.record_file();

                self.check_acls(&entry_path, false);
                self.process_entry(&view);
            }
        }
    }

    /// Run the filter and action pipelines for one discovered entry
    pub fn process_entry(&self, view: &EntryView<'_>) {
        if !self.filters.accepts(view) {
            return;
        }

        if let Err(e) = self.actions.apply(view) {
            tracing::error!("{e}");
            self.ctx.raise_fatal();
        }
    }

    /// Check ACLs of the given file or dir (`--aclcheck`)
    ///
    /// A zero-length xattr probe is enough; only existence is counted.
    /// Absent attributes (ENODATA) and filesystems without xattr support
    /// (ENOTSUP) are normal.
    pub fn check_acls(&self, path: &str, is_directory: bool) {
        if !self.ctx.config.check_acls {
            return;
        }

        const ACL_ACCESS: &CStr = c"system.posix_acl_access";
        const ACL_DEFAULT: &CStr = c"system.posix_acl_default";

        match sys::xattr_exists(path, ACL_ACCESS) {
            Ok(()) => self.ctx.stats.record_access_acl(),
            Err(e) => {
                if !matches!(e.raw_os_error(), Some(libc::ENODATA) | Some(libc::ENOTSUP)) {
                    warn!("Failed to get Access ACL for entry: {path}; Error: {e}");
                }
            }
        }

        // dirs have an additional default ACL check
        if is_directory {
            match sys::xattr_exists(path, ACL_DEFAULT) {
                Ok(()) => self.ctx.stats.record_default_acl(),
                Err(e) => {
                    if !matches!(e.raw_os_error(), Some(libc::ENODATA) | Some(libc::ENOTSUP)) {
                        warn!("Failed to get Default ACL for dir: {path}; Error: {e}");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CliArgs, ScanConfig};
    use clap::Parser;
    use std::sync::Arc;

    fn walker_for(argv: &[&str], root: &str) -> Walker {
        let mut full = vec!["parfind"];
        full.extend_from_slice(argv);
        full.push(root);
        let args = CliArgs::parse_from(full);
        let config = Arc::new(ScanConfig::from_args(args, Vec::new()).unwrap());
        Walker::new(ScanContext::new(config))
    }

    #[test]
    fn test_scan_counts_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        std::fs::write(dir.path().join("f1"), b"x").unwrap();
        std::fs::write(dir.path().join("f2"), b"y").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/f3"), b"z").unwrap();

        let walker = walker_for(&["--noprint", "-t", "1"], &root);
        walker.scan(&root, 1);
        // single-thread config has godeep 0, so the subdir was scanned
        // inline
        let snap = walker.ctx.stats.snapshot();
        assert_eq!(snap.dirs_found, 1);
        assert_eq!(snap.files_found, 3);
        assert_eq!(snap.errors, 0);
    }

    #[test]
    fn test_scan_respects_max_depth() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/deep"), b"x").unwrap();

        let walker = walker_for(&["--noprint", "-t", "1", "--maxdepth", "1"], &root);
        walker.scan(&root, 1);

        let snap = walker.ctx.stats.snapshot();
        // "a" was discovered but not entered: depth 1 is the limit
        assert_eq!(snap.dirs_found, 1);
        assert_eq!(snap.files_found, 0);
    }

    #[test]
    fn test_scan_missing_dir_is_tolerated() {
        let walker = walker_for(&["--noprint", "-t", "1"], "/nonexistent-parfind");
        walker.scan("/nonexistent-parfind", 1);

        let snap = walker.ctx.stats.snapshot();
        assert_eq!(snap.errors, 1);
        assert!(!walker.ctx.is_fatal());
    }

    #[test]
    fn test_breadth_mode_pushes_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        std::fs::create_dir(dir.path().join("sub1")).unwrap();
        std::fs::create_dir(dir.path().join("sub2")).unwrap();

        // high godeep threshold keeps the walker in breadth mode
        let walker = walker_for(&["--noprint", "-t", "4", "--godeep", "1000"], &root);
        walker.scan(&root, 1);

        assert_eq!(walker.ctx.stack.size(), 2);
    }

    #[test]
    fn test_quit_after_first_match_stops_scan() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        std::fs::write(dir.path().join("f"), b"x").unwrap();

        let walker = walker_for(&["--noprint", "-t", "1", "--quit"], &root);
        walker.ctx.stats.record_match();

        walker.scan(&root, 1);
        let snap = walker.ctx.stats.snapshot();
        // scan returned before opening the directory
        assert_eq!(snap.files_found, 0);
    }
}
