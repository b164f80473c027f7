//! Entry action pipeline
//!
//! Side-effecting stages applied to every entry that passed the filters,
//! in fixed order: print, exec, copy, unlink. Print failures are silent;
//! exec/copy/unlink failures are logged and counted, and abort the run
//! unless the corresponding ignore flag allows continuing.

use crate::config::{trim_scan_path, ScanConfig, EXEC_PATH_PLACEHOLDER};
use crate::entry::{EntryStat, EntryType, EntryView};
use crate::error::ActionError;
use crate::stats::Statistics;
use crate::sys;
use std::io::{self, Read, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::Command;
use std::sync::Arc;
use tracing::{info, warn};

/// Copy buffer for regular file contents
const COPY_BUF_SIZE: usize = 4 * 1024 * 1024;

/// Buffer for symlink targets; a target filling the whole buffer is
/// treated as overflow
const READLINK_BUF_SIZE: usize = 16 * 1024;

/// Side-effecting stages applied to accepted entries
pub struct ActionPipeline {
    config: Arc<ScanConfig>,
    stats: Arc<Statistics>,
}

impl ActionPipeline {
    pub fn new(config: Arc<ScanConfig>, stats: Arc<Statistics>) -> Self {
        Self { config, stats }
    }

    /// Apply all configured actions to an accepted entry
    ///
    /// On success the entry counts as a filter match. An error return
    /// means the run has to stop (non-ignored copy/unlink failure, or an
    /// exec child killed by a signal).
    pub fn apply(&self, entry: &EntryView<'_>) -> Result<(), ActionError> {
        self.print_entry(entry);
        self.exec_command(entry.path)?;
        self.copy_entry(entry)?;
        self.unlink_entry(entry)?;

        self.stats.record_match();
        Ok(())
    }

    /// Print the entry path, plain or as a single-line JSON object
    fn print_entry(&self, entry: &EntryView<'_>) {
        if self.config.print_disabled {
            return;
        }

        let record = if self.config.json_output {
            self.format_json_record(entry)
        } else {
            let terminator = if self.config.print0 { '\0' } else { '\n' };
            format!("{}{}", entry.path, terminator)
        };

        // one write per record keeps records whole across threads
        let mut out = io::stdout().lock();
        let _ = out.write_all(record.as_bytes());
    }

    /// Build the JSON record for an entry
    ///
    /// The short form carries path and type; with stat-all the thirteen
    /// stat fields are added as quoted decimal integers, or null when the
    /// stat call failed for this entry.
    fn format_json_record(&self, entry: &EntryView<'_>) -> String {
        let path = escape_json(entry.path);
        let type_label = entry.resolved_type().json_label();

        if !self.config.stat_all {
            return format!("{{\"path\":\"{path}\",\"type\":\"{type_label}\"}}\n");
        }

        match entry.stat {
            Some(st) => format!(
                "{{\"path\":\"{path}\",\"type\":\"{type_label}\",\
                 \"st_dev\":\"{}\",\"st_ino\":\"{}\",\"st_mode\":\"{}\",\
                 \"st_nlink\":\"{}\",\"st_uid\":\"{}\",\"st_gid\":\"{}\",\
                 \"st_rdev\":\"{}\",\"st_size\":\"{}\",\"st_blksize\":\"{}\",\
                 \"st_blocks\":\"{}\",\"st_atime\":\"{}\",\"st_mtime\":\"{}\",\
                 \"st_ctime\":\"{}\"}}\n",
                st.dev,
                st.ino,
                st.mode,
                st.nlink,
                st.uid,
                st.gid,
                st.rdev,
                st.size,
                st.blksize,
                st.blocks,
                st.atime,
                st.mtime,
                st.ctime,
            ),
            // stat failed for this entry, so the stat fields are empty
            None => format!(
                "{{\"path\":\"{path}\",\"type\":\"{type_label}\",\
                 \"st_dev\":null,\"st_ino\":null,\"st_mode\":null,\
                 \"st_nlink\":null,\"st_uid\":null,\"st_gid\":null,\
                 \"st_rdev\":null,\"st_size\":null,\"st_blksize\":null,\
                 \"st_blocks\":null,\"st_atime\":null,\"st_mtime\":null,\
                 \"st_ctime\":null}}\n"
            ),
        }
    }

    /// Execute the user-given system command for the entry
    fn exec_command(&self, entry_path: &str) -> Result<(), ActionError> {
        if self.config.exec_cmdline.is_empty() {
            return Ok(());
        }

        let cmdline = build_exec_cmdline(&self.config.exec_cmdline, entry_path);

        // flush is necessary for cases where stdout is not line-buffered,
        // e.g. because it's not a tty
        let _ = io::stdout().flush();

        match Command::new("sh").arg("-c").arg(&cmdline).status() {
            Ok(status) => {
                if let Some(signal) = status.signal() {
                    warn!(
                        "Aborting because exec command terminated on signal. \
                         Signal: {signal}; Path: {entry_path}"
                    );

                    // the child may have siblings in the process group that
                    // the in-process fatal flag cannot reach
                    sys::terminate_process_group();

                    return Err(ActionError::ExecKilled {
                        path: entry_path.to_string(),
                        signal,
                    });
                }
            }
            Err(e) => {
                warn!("Failed to run exec command for path: {entry_path}; Error: {e}");
                self.stats.record_error();
            }
        }

        Ok(())
    }

    /// Copy the entry if it's a regular file, dir or symlink; skip others.
    /// This won't preserve hardlinks.
    fn copy_entry(&self, entry: &EntryView<'_>) -> Result<(), ActionError> {
        let Some(dest_root) = &self.config.copy_dest_dir else {
            return Ok(());
        };

        let dest_path = copy_dest_path(dest_root, &self.config.scan_paths[0], entry.path);

        info!("Copying: {} -> {}", entry.path, dest_path);

        // stat-all is forced whenever a copy destination is configured,
        // but the stat call can still have failed for this entry
        let Some(stat) = entry.stat else {
            warn!(
                "Failed to copy entry due to missing attributes. Path: {}",
                entry.path
            );
            return self.copy_failed(
                entry.path,
                io::Error::new(io::ErrorKind::Other, "no stat info"),
            );
        };

        match stat.entry_type() {
            EntryType::Directory => self.copy_directory(entry.path, &dest_path, stat),
            EntryType::Symlink => self.copy_symlink(entry.path, &dest_path, stat),
            EntryType::File => self.copy_regular_file(entry.path, &dest_path, stat),
            _ => {
                warn!(
                    "Skipping copy of entry due to non-regular file type. Path: {}",
                    entry.path
                );
                self.stats.record_file_not_copied();
                Ok(())
            }
        }
    }

    /// Create the destination directory; an existing one is fine
    fn copy_directory(
        &self,
        path: &str,
        dest_path: &str,
        stat: &EntryStat,
    ) -> Result<(), ActionError> {
        // user always rwx
        let mode = (stat.mode & 0o777) | 0o700;
        if let Err(e) = sys::mkdir(dest_path, mode) {
            if e.raw_os_error() != Some(libc::EEXIST) {
                warn!("Failed to create dir: {dest_path}; Error: {e}");
                return self.copy_failed(path, e);
            }
        }

        if self.config.copy_time_update {
            let times = sys::FileTimes::from_stat(stat);
            if let Err(e) = sys::set_file_times(dest_path, times, true) {
                warn!("Failed to update timestamps of copy destination dir: {dest_path}; Error: {e}");
                self.stats.record_error();
            }
        }

        Ok(())
    }

    /// Re-create a symlink at the destination
    fn copy_symlink(
        &self,
        path: &str,
        dest_path: &str,
        stat: &EntryStat,
    ) -> Result<(), ActionError> {
        let mut buf = vec![0u8; READLINK_BUF_SIZE];

        let target_len = match sys::readlink_into(path, &mut buf) {
            Ok(n) if n == buf.len() => {
                warn!(
                    "Failed to copy symlink due to long target path: {path}; Max: {}",
                    READLINK_BUF_SIZE
                );
                return self.copy_failed(
                    path,
                    io::Error::new(io::ErrorKind::InvalidData, "symlink target too long"),
                );
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to read symlink for copying: {path}; Error: {e}");
                return self.copy_failed(path, e);
            }
        };

        let target = &buf[..target_len];

        let mut link_res = sys::symlink(target, dest_path);
        if let Err(e) = &link_res {
            if e.raw_os_error() == Some(libc::EEXIST) {
                // symlink can't overwrite an existing file, so unlink and
                // try again
                let _ = sys::unlink(dest_path);
                link_res = sys::symlink(target, dest_path);
            }
        }

        if let Err(e) = link_res {
            warn!("Failed to create symlink for copying: {dest_path}; Error: {e}");
            return self.copy_failed(path, e);
        }

        if self.config.copy_time_update {
            let times = sys::FileTimes::from_stat(stat);
            if let Err(e) = sys::set_file_times(dest_path, times, false) {
                warn!("Failed to update timestamps of copy destination symlink: {dest_path}; Error: {e}");
                self.stats.record_error();
            }
        }

        Ok(())
    }

    /// Copy regular file contents through a fixed-size buffer
    fn copy_regular_file(
        &self,
        path: &str,
        dest_path: &str,
        stat: &EntryStat,
    ) -> Result<(), ActionError> {
        // no atime update on the source, similar to "cp -a" behavior
        let mut source = match sys::open_read_noatime(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to open copy source file for reading: {path}; Error: {e}");
                return self.copy_failed(path, e);
            }
        };

        // user/owner can always read+write
        let mode = (stat.mode & 0o777) | 0o600;
        let mut dest = match sys::open_create_trunc(dest_path, mode) {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to open copy destination file for writing: {dest_path}; Error: {e}");
                return self.copy_failed(path, e);
            }
        };

        let mut buf = vec![0u8; COPY_BUF_SIZE];

        loop {
            let read_len = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!("Failed to read from copy source file: {path}; Error: {e}");
                    return self.copy_failed(path, e);
                }
            };

            match dest.write(&buf[..read_len]) {
                Ok(write_len) if write_len == read_len => {
                    self.stats.record_bytes_copied(write_len as u64);
                }
                Ok(write_len) => {
                    warn!(
                        "Failed to write to copy destination file: {dest_path}; \
                         Expected write size: {read_len}; Actual write size: {write_len}"
                    );
                    return self.copy_failed(
                        path,
                        io::Error::new(io::ErrorKind::WriteZero, "short write"),
                    );
                }
                Err(e) => {
                    warn!("Failed to write to copy destination file: {dest_path}; Error: {e}");
                    return self.copy_failed(path, e);
                }
            }
        }

        if self.config.copy_time_update {
            let times = sys::FileTimes::from_stat(stat);
            if let Err(e) = sys::set_fd_times(&dest, times) {
                warn!("Failed to update timestamps of copy destination file: {dest_path}; Error: {e}");
                self.stats.record_error();
            }
        }

        Ok(())
    }

    /// Record a copy error and decide between continuing and aborting
    fn copy_failed(&self, path: &str, source: io::Error) -> Result<(), ActionError> {
        self.stats.record_error();

        if self.config.ignore_copy_errors {
            Ok(())
        } else {
            Err(ActionError::Copy {
                path: path.to_string(),
                source,
            })
        }
    }

    /// Unlink the entry if it's not a directory
    fn unlink_entry(&self, entry: &EntryView<'_>) -> Result<(), ActionError> {
        if !self.config.unlink_files {
            return Ok(());
        }

        // stat-all is forced when unlinking, so the type is reliable
        if entry.is_directory() {
            return Ok(());
        }

        info!("Unlinking: {}", entry.path);

        if let Err(e) = sys::unlink(entry.path) {
            warn!("Failed to unlink file: {}; Error: {e}", entry.path);
            self.stats.record_error();

            if !self.config.ignore_unlink_errors {
                return Err(ActionError::Unlink {
                    path: entry.path.to_string(),
                    source: e,
                });
            }
        }

        Ok(())
    }
}

/// Compute the copy destination for an entry
///
/// The destination is the copy root plus the entry path's suffix after
/// the scan root. The scan root is slash-trimmed the same way the
/// supervisor seeds it, so a trailing slash on the command line never
/// shifts the suffix.
fn copy_dest_path(dest_root: &str, scan_root: &str, entry_path: &str) -> String {
    let root = trim_scan_path(scan_root);
    let suffix = entry_path.strip_prefix(root).unwrap_or(entry_path);
    let suffix = suffix.trim_start_matches('/');

    let dest = dest_root.trim_end_matches('/');
    if suffix.is_empty() {
        // the scan root itself
        dest_root.to_string()
    } else {
        format!("{dest}/{suffix}")
    }
}

/// Substitute the path placeholder and single-quote every element
fn build_exec_cmdline(cmdline: &[String], entry_path: &str) -> String {
    let quoted: Vec<String> = cmdline
        .iter()
        .map(|arg| format!("'{}'", arg.replace(EXEC_PATH_PLACEHOLDER, entry_path)))
        .collect();
    quoted.join(" ")
}

/// Add escape characters to make a string usable in JSON
pub fn escape_json(input: &str) -> String {
    let mut out = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CliArgs;
    use crate::entry::EntryStat;
    use clap::Parser;

    fn pipeline_from(argv: &[&str]) -> ActionPipeline {
        let mut full = vec!["parfind"];
        full.extend_from_slice(argv);
        full.push(".");
        let args = CliArgs::parse_from(full);
        let config = Arc::new(ScanConfig::from_args(args, Vec::new()).unwrap());
        ActionPipeline::new(config, Arc::new(Statistics::default()))
    }

    #[test]
    fn test_escape_json() {
        assert_eq!(escape_json("plain"), "plain");
        assert_eq!(escape_json("a\"b"), "a\\\"b");
        assert_eq!(escape_json("a\\b"), "a\\\\b");
        assert_eq!(escape_json("a\nb\tc"), "a\\nb\\tc");
        assert_eq!(escape_json("a\u{0001}b"), "a\\u0001b");
        assert_eq!(escape_json("\u{0008}\u{000c}\r"), "\\b\\f\\r");
    }

    #[test]
    fn test_json_record_short_form() {
        let pipeline = pipeline_from(&["--json"]);
        let view = EntryView {
            path: "/data/a.txt",
            hint: EntryType::File,
            stat: None,
        };

        let record = pipeline.format_json_record(&view);
        let value: serde_json::Value = serde_json::from_str(record.trim_end()).unwrap();
        assert_eq!(value["path"], "/data/a.txt");
        assert_eq!(value["type"], "regfile");
        assert!(value.get("st_size").is_none());
    }

    #[test]
    fn test_json_record_stat_form() {
        let pipeline = pipeline_from(&["--json", "--stat"]);
        let stat = EntryStat {
            dev: 1,
            ino: 2,
            mode: 0o100644,
            nlink: 1,
            uid: 1000,
            gid: 100,
            size: 4096,
            ..Default::default()
        };
        let view = EntryView {
            path: "/data/weird\"name",
            hint: EntryType::File,
            stat: Some(&stat),
        };

        let record = pipeline.format_json_record(&view);
        assert!(record.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(record.trim_end()).unwrap();
        assert_eq!(value["path"], "/data/weird\"name");
        assert_eq!(value["st_size"], "4096");
        assert_eq!(value["st_uid"], "1000");
        assert_eq!(value["st_mode"], format!("{}", 0o100644));
    }

    #[test]
    fn test_json_record_null_stat_fields() {
        let pipeline = pipeline_from(&["--json", "--stat"]);
        let view = EntryView {
            path: "/data/gone",
            hint: EntryType::Symlink,
            stat: None,
        };

        let record = pipeline.format_json_record(&view);
        let value: serde_json::Value = serde_json::from_str(record.trim_end()).unwrap();
        assert_eq!(value["type"], "symlink");
        assert!(value["st_size"].is_null());
        assert!(value["st_dev"].is_null());
        assert!(value["st_ctime"].is_null());
    }

    #[test]
    fn test_build_exec_cmdline_substitution() {
        let cmdline = vec!["ls".to_string(), "-l".to_string(), "{}".to_string()];
        assert_eq!(
            build_exec_cmdline(&cmdline, "/data/f"),
            "'ls' '-l' '/data/f'"
        );

        // every occurrence in every element
        let cmdline = vec!["cp".to_string(), "{}".to_string(), "{}.bak".to_string()];
        assert_eq!(
            build_exec_cmdline(&cmdline, "/d/x"),
            "'cp' '/d/x' '/d/x.bak'"
        );
    }

    #[test]
    fn test_copy_dest_path_suffix() {
        assert_eq!(copy_dest_path("/dest", "/src", "/src/a/b"), "/dest/a/b");
        assert_eq!(copy_dest_path("/dest/", "/src", "/src/a"), "/dest/a");

        // trailing slash on the scan path must not shift the suffix
        assert_eq!(copy_dest_path("/dest", "/src/", "/src/a"), "/dest/a");

        // the scan root itself maps onto the copy root
        assert_eq!(copy_dest_path("/dest", "/src", "/src"), "/dest");

        // relative scan path
        assert_eq!(copy_dest_path("/dest", ".", "./a.txt"), "/dest/a.txt");

        // root filesystem as scan path
        assert_eq!(copy_dest_path("/dest", "/", "/a"), "/dest/a");
    }
}
