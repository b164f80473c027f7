//! Configuration types for parfind
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - The `--exec CMD ARGS ;` pre-parser that runs before clap (the exec
//!   argument list may contain strings that look like options)
//! - Runtime configuration with validation, including the derived
//!   invariants (forced stat calls, godeep defaulting, mount-id capture)
//! - The size-suffix and day-relative time argument parsers

use crate::entry::EntryType;
use crate::error::{ConfigError, ConfigResult};
use crate::sys;
use clap::Parser;
use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};
use std::time::{SystemTime, UNIX_EPOCH};

/// Placeholder in exec arguments that gets replaced by the entry path
pub const EXEC_PATH_PLACEHOLDER: &str = "{}";

/// Terminator that ends the exec argument list
pub const EXEC_ARG_TERMINATOR: &str = ";";

/// Seconds per day, for the relative time filters
const SECS_PER_DAY: u64 = 60 * 60 * 24;

/// Parallel search for files and directories
#[derive(Parser, Debug, Clone)]
#[command(
    name = "parfind",
    version,
    about = "Parallel search for files & dirs in a directory hierarchy",
    long_about = "Walks directory hierarchies with multiple threads, using breadth \
                  search to generate parallelism and depth search to limit memory \
                  usage, and applies filters and actions (print, exec, copy, unlink) \
                  to every discovered entry.",
    after_help = "EXAMPLES:\n    \
        parfind /data/mydir\n    \
        parfind --type f --size +1G /data/mydir\n    \
        parfind --atime +3 /data/mydir\n    \
        parfind --type f --print0 /data/mydir | xargs -P 16 -r -0 -n 10 ls -lh\n    \
        parfind --exec ls -lhd '{}' \\; --type d /data/mydir"
)]
pub struct CliArgs {
    /// Paths to scan (default: current directory)
    #[arg(value_name = "PATH")]
    pub scan_paths: Vec<String>,

    /// Number of scan threads
    #[arg(short = 't', long, default_value_t = default_threads(), value_name = "NUM")]
    pub threads: u32,

    /// Threshold to switch from breadth to depth search
    /// (default: number of scan threads)
    #[arg(long, value_name = "NUM")]
    pub godeep: Option<u64>,

    /// Max directory depth to scan (path arguments have depth 0)
    #[arg(long, value_name = "NUM")]
    pub maxdepth: Option<u16>,

    /// Search type: 'f' regular files, 'd' dirs, 'b'/'c' devices,
    /// 'p' fifos, 'l' symlinks, 's' sockets
    #[arg(long = "type", value_name = "TYPE")]
    pub search_type: Option<String>,

    /// Filter on name of file or dir; '*' and '?' wildcards. May be given
    /// multiple times: names matching any of the patterns pass
    #[arg(long = "name", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub name_filters: Vec<String>,

    /// Filter on full path of discovered entries; '*' and '?' wildcards
    #[arg(long = "path", value_name = "PATTERN")]
    pub path_filter: Option<String>,

    /// Size filter. +/- prefix to match greater or smaller values.
    /// Default unit is 512-byte blocks; suffixes: 'c' bytes, 'w' words,
    /// 'k'/'M'/'G' for KiB/MiB/GiB
    #[arg(long, value_name = "NUM", allow_hyphen_values = true)]
    pub size: Option<String>,

    /// atime filter in days in the past; +/- prefix for older/more recent
    #[arg(long, value_name = "NUM", allow_hyphen_values = true)]
    pub atime: Option<String>,

    /// ctime filter in days in the past; +/- prefix for older/more recent
    #[arg(long, value_name = "NUM", allow_hyphen_values = true)]
    pub ctime: Option<String>,

    /// mtime filter in days in the past; +/- prefix for older/more recent
    #[arg(long, value_name = "NUM", allow_hyphen_values = true)]
    pub mtime: Option<String>,

    /// Filter on mtime more recent than the given path's
    #[arg(long, value_name = "PATH")]
    pub newer: Option<String>,

    /// Filter on numeric user ID
    #[arg(long, value_name = "NUM")]
    pub uid: Option<u32>,

    /// Filter on numeric group ID
    #[arg(long, value_name = "NUM")]
    pub gid: Option<u32>,

    /// Filter on user name or numeric user ID
    #[arg(long, value_name = "STR")]
    pub user: Option<String>,

    /// Filter on group name or numeric group ID
    #[arg(long, value_name = "STR")]
    pub group: Option<String>,

    /// Don't descend directories on other filesystems
    #[arg(long, visible_alias = "mount")]
    pub xdev: bool,

    /// Copy discovered files and dirs to this directory. Only regular
    /// files, dirs and symlinks are copied; hardlinks are not preserved
    #[arg(long = "copyto", value_name = "PATH")]
    pub copy_dest: Option<String>,

    /// Ignore copy errors
    #[arg(long = "nocopyerr")]
    pub ignore_copy_errors: bool,

    /// Do not update atime/mtime of copied files
    #[arg(long = "notimeupd")]
    pub no_time_update: bool,

    /// Delete discovered files, not dirs
    #[arg(long)]
    pub unlink: bool,

    /// Ignore unlink errors
    #[arg(long = "nodelerr")]
    pub ignore_unlink_errors: bool,

    /// Print entries in JSON format, one root object per entry
    #[arg(long)]
    pub json: bool,

    /// Terminate printed entries with null instead of newline
    #[arg(long)]
    pub print0: bool,

    /// Do not print names of discovered files and dirs
    #[arg(long = "noprint")]
    pub no_print: bool,

    /// Disable summary output to stderr
    #[arg(long = "nosummary")]
    pub no_summary: bool,

    /// Query attributes of all discovered files & dirs
    #[arg(long)]
    pub stat: bool,

    /// Query ACLs of all discovered entries
    /// (just for testing, does not change the result set)
    #[arg(long = "aclcheck")]
    pub check_acls: bool,

    /// Terminate after first match. With multiple threads more than one
    /// match may still get printed
    #[arg(long)]
    pub quit: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,
}

fn default_threads() -> u32 {
    // Directory scanning is I/O bound, so oversubscribe the cores
    (num_cpus::get() * 2) as u32
}

/// Comparison mode of a single size/time constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Exact,
    Less,
    Greater,
}

/// Exact/less/greater thresholds for one stat field
///
/// More than one constraint can be active at a time; a value passes only
/// if every active constraint holds. "Less" and "greater" are strict.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bounds {
    pub exact: Option<u64>,
    pub less: Option<u64>,
    pub greater: Option<u64>,
}

impl Bounds {
    /// Check whether any constraint is set
    pub fn is_active(&self) -> bool {
        self.exact.is_some() || self.less.is_some() || self.greater.is_some()
    }

    /// Install a constraint
    pub fn set(&mut self, cmp: Cmp, value: u64) {
        match cmp {
            Cmp::Exact => self.exact = Some(value),
            Cmp::Less => self.less = Some(value),
            Cmp::Greater => self.greater = Some(value),
        }
    }

    /// Check a value against all active constraints
    pub fn matches(&self, value: u64) -> bool {
        if let Some(exact) = self.exact {
            if value != exact {
                return false;
            }
        }
        if let Some(less) = self.less {
            if value >= less {
                return false;
            }
        }
        if let Some(greater) = self.greater {
            if value <= greater {
                return false;
            }
        }
        true
    }
}

/// Validated runtime configuration, immutable after startup
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Number of worker threads
    pub num_threads: u32,

    /// Stack size at or above which workers switch to depth search
    pub godeep_threshold: u64,

    /// Max directory depth to scan (scan paths have depth 0)
    pub max_dir_depth: u16,

    /// User-provided paths to scan
    pub scan_paths: Vec<String>,

    /// Entry type filter
    pub search_type: Option<EntryType>,

    /// Or-set of basename patterns
    pub name_filters: Option<GlobSet>,

    /// Full-path pattern (files only)
    pub path_filter: Option<GlobMatcher>,

    /// Size thresholds in bytes (files only)
    pub size_filter: Bounds,

    /// atime thresholds in epoch seconds (files only)
    pub atime_filter: Bounds,

    /// ctime thresholds in epoch seconds (files only)
    pub ctime_filter: Bounds,

    /// mtime thresholds in epoch seconds (files only)
    pub mtime_filter: Bounds,

    /// Numeric user ID filter
    pub filter_uid: Option<u32>,

    /// Numeric group ID filter
    pub filter_gid: Option<u32>,

    /// Stay on the filesystem with this device ID
    pub filter_mount_id: Option<u64>,

    /// Target dir for file/dir copies
    pub copy_dest_dir: Option<String>,

    /// Update atime/mtime when copying
    pub copy_time_update: bool,

    /// Continue after copy errors
    pub ignore_copy_errors: bool,

    /// Unlink all discovered files (not dirs)
    pub unlink_files: bool,

    /// Continue after unlink errors
    pub ignore_unlink_errors: bool,

    /// Command and args to execute per entry, `{}` as path placeholder
    pub exec_cmdline: Vec<String>,

    /// Disable printing of discovered entries
    pub print_disabled: bool,

    /// Print entries as JSON objects
    pub json_output: bool,

    /// Terminate printed entries with '\0' instead of '\n'
    pub print0: bool,

    /// Call stat on every discovered entry
    pub stat_all: bool,

    /// Query ACLs on every discovered entry
    pub check_acls: bool,

    /// Stop scanning after the first match
    pub quit_after_first_match: bool,

    /// Print the scan summary at the end
    pub print_summary: bool,

    /// Verbose output
    pub verbose: bool,
}

impl ScanConfig {
    /// Create and validate configuration from CLI arguments and the
    /// pre-parsed exec command line
    pub fn from_args(args: CliArgs, exec_cmdline: Vec<String>) -> ConfigResult<Self> {
        if args.threads == 0 {
            return Err(ConfigError::InvalidThreadCount { count: 0 });
        }

        // search type
        let search_type = match &args.search_type {
            None => None,
            Some(s) => {
                let mut chars = s.chars();
                let first = chars.next();
                let ok = match (first, chars.next()) {
                    (Some(c), None) => EntryType::from_search_char(c),
                    _ => None,
                };
                match ok {
                    Some(t) => Some(t),
                    None => {
                        return Err(ConfigError::InvalidSearchType { given: s.clone() });
                    }
                }
            }
        };

        // name / path patterns
        let name_filters = if args.name_filters.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &args.name_filters {
                let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                builder.add(glob);
            }
            Some(
                builder.build().map_err(|e| ConfigError::InvalidPattern {
                    pattern: args.name_filters.join(", "),
                    reason: e.to_string(),
                })?,
            )
        };

        let path_filter = match &args.path_filter {
            None => None,
            Some(pattern) => Some(
                Glob::new(pattern)
                    .map_err(|e| ConfigError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?
                    .compile_matcher(),
            ),
        };

        // size and time thresholds
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut size_filter = Bounds::default();
        if let Some(spec) = &args.size {
            let (cmp, value) = parse_size_spec(spec)
                .map_err(|reason| invalid_filter_value("size", spec, reason))?;
            size_filter.set(cmp, value);
        }

        let mut atime_filter = Bounds::default();
        if let Some(spec) = &args.atime {
            let (cmp, value) = parse_time_spec(spec, now)
                .map_err(|reason| invalid_filter_value("atime", spec, reason))?;
            atime_filter.set(cmp, value);
        }

        let mut ctime_filter = Bounds::default();
        if let Some(spec) = &args.ctime {
            let (cmp, value) = parse_time_spec(spec, now)
                .map_err(|reason| invalid_filter_value("ctime", spec, reason))?;
            ctime_filter.set(cmp, value);
        }

        let mut mtime_filter = Bounds::default();
        if let Some(spec) = &args.mtime {
            let (cmp, value) = parse_time_spec(spec, now)
                .map_err(|reason| invalid_filter_value("mtime", spec, reason))?;
            mtime_filter.set(cmp, value);
        }

        // --newer PATH installs an mtime-greater constraint from the
        // reference file's mtime
        if let Some(newer_path) = &args.newer {
            let st = sys::stat(newer_path).map_err(|e| ConfigError::NewerFileInaccessible {
                path: newer_path.clone(),
                source: e,
            })?;
            mtime_filter.set(Cmp::Greater, st.mtime.max(0) as u64);
        }

        // uid/gid, numeric or resolved from names
        let mut filter_uid = args.uid;
        if let Some(user) = &args.user {
            filter_uid = Some(resolve_user(user)?);
        }

        let mut filter_gid = args.gid;
        if let Some(group) = &args.group {
            filter_gid = Some(resolve_group(group)?);
        }

        // copy destination allows at most one scan path
        if args.copy_dest.is_some() && args.scan_paths.len() > 1 {
            return Err(ConfigError::CopyRequiresSinglePath);
        }

        let scan_paths = if args.scan_paths.is_empty() {
            vec![".".to_string()]
        } else {
            args.scan_paths.clone()
        };

        // --xdev/--mount: capture the device ID of the first scan path
        let filter_mount_id = if args.xdev {
            let first = scan_paths[0].as_str();
            let st = sys::stat(first).map_err(|e| ConfigError::MountIdUnavailable {
                path: first.to_string(),
                source: e,
            })?;
            Some(st.dev)
        } else {
            None
        };

        // stat info is required by the stat-based filters and by the copy
        // and unlink actions (they dispatch on the statted type)
        let stat_all = args.stat
            || size_filter.is_active()
            || atime_filter.is_active()
            || ctime_filter.is_active()
            || mtime_filter.is_active()
            || filter_uid.is_some()
            || filter_gid.is_some()
            || filter_mount_id.is_some()
            || args.copy_dest.is_some()
            || args.unlink;

        // godeep: 0/unset means "number of threads"; a single thread always
        // does depth search because there is no parallelism anyways
        let godeep_threshold = match args.godeep {
            None | Some(0) => u64::from(args.threads),
            Some(n) => n,
        };
        let godeep_threshold = if args.threads == 1 {
            0
        } else {
            godeep_threshold
        };

        Ok(Self {
            num_threads: args.threads,
            godeep_threshold,
            max_dir_depth: args.maxdepth.unwrap_or(u16::MAX),
            scan_paths,
            search_type,
            name_filters,
            path_filter,
            size_filter,
            atime_filter,
            ctime_filter,
            mtime_filter,
            filter_uid,
            filter_gid,
            filter_mount_id,
            copy_dest_dir: args.copy_dest,
            copy_time_update: !args.no_time_update,
            ignore_copy_errors: args.ignore_copy_errors,
            unlink_files: args.unlink,
            ignore_unlink_errors: args.ignore_unlink_errors,
            exec_cmdline,
            print_disabled: args.no_print,
            json_output: args.json,
            print0: args.print0,
            stat_all,
            check_acls: args.check_acls,
            quit_after_first_match: args.quit,
            print_summary: !args.no_summary,
            verbose: args.verbose,
        })
    }
}

/// Strip a single trailing '/' from a scan path, but never from "/" itself
///
/// Mimics gnu findutils: the walker always joins with one slash, so one
/// user-given trailing slash has to go.
pub fn trim_scan_path(path: &str) -> &str {
    if path.len() > 1 && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

fn invalid_filter_value(option: &'static str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidFilterValue {
        option,
        value: value.to_string(),
        reason,
    }
}

/// Extract the `--exec CMD ARGS ;` span from argv before clap runs
///
/// Returns the remaining argv and the collected exec command line. The
/// first collected element is the executable; the terminator only counts
/// once at least the executable has been seen.
pub fn extract_exec_args(argv: Vec<String>) -> ConfigResult<(Vec<String>, Vec<String>)> {
    let mut remaining = Vec::with_capacity(argv.len());
    let mut cmdline = Vec::new();
    let mut iter = argv.into_iter();

    // argv[0] passes through untouched
    if let Some(prog) = iter.next() {
        remaining.push(prog);
    }

    let mut in_exec = false;
    let mut terminated = false;

    for arg in iter.by_ref() {
        if !in_exec {
            if arg == "--exec" || arg == "-exec" {
                if terminated {
                    return Err(ConfigError::DuplicateExec);
                }
                in_exec = true;
            } else {
                remaining.push(arg);
            }
            continue;
        }

        if !cmdline.is_empty() && arg == EXEC_ARG_TERMINATOR {
            in_exec = false;
            terminated = true;
            continue;
        }

        cmdline.push(arg);
    }

    if in_exec {
        return Err(ConfigError::MissingExecTerminator);
    }

    Ok((remaining, cmdline))
}

/// Parse a `--size` value: optional +/- prefix, then a number with an
/// optional unit suffix (see find(1) for the suffix meanings)
fn parse_size_spec(spec: &str) -> Result<(Cmp, u64), String> {
    let (cmp, rest) = match spec.as_bytes().first() {
        Some(b'-') => (Cmp::Less, &spec[1..]),
        Some(b'+') => (Cmp::Greater, &spec[1..]),
        Some(_) => (Cmp::Exact, spec),
        None => return Err("empty value".to_string()),
    };

    if rest.is_empty() {
        return Err("missing number".to_string());
    }

    let (digits, multiplier) = match rest.as_bytes()[rest.len() - 1] {
        b'0'..=b'9' => (rest, 512), // no suffix => 512-byte blocks
        b'b' => (&rest[..rest.len() - 1], 512),
        b'c' => (&rest[..rest.len() - 1], 1),
        b'w' => (&rest[..rest.len() - 1], 2),
        b'k' => (&rest[..rest.len() - 1], 1024),
        b'M' => (&rest[..rest.len() - 1], 1024 * 1024),
        b'G' => (&rest[..rest.len() - 1], 1024 * 1024 * 1024),
        other => return Err(format!("invalid suffix '{}'", other as char)),
    };

    let number: u64 = digits
        .parse()
        .map_err(|_| format!("invalid number '{digits}'"))?;

    let bytes = number
        .checked_mul(multiplier)
        .ok_or_else(|| "value too large".to_string())?;

    Ok((cmp, bytes))
}

/// Parse an `--atime/--ctime/--mtime` value given in days in the past
///
/// The +/- prefixes are inverted relative to the size filter: "+N" means
/// older than N days (timestamp less than now - N days) and "-N" means
/// more recent (timestamp greater).
fn parse_time_spec(spec: &str, now_secs: u64) -> Result<(Cmp, u64), String> {
    let (cmp, rest) = match spec.as_bytes().first() {
        Some(b'-') => (Cmp::Greater, &spec[1..]),
        Some(b'+') => (Cmp::Less, &spec[1..]),
        Some(_) => (Cmp::Exact, spec),
        None => return Err("empty value".to_string()),
    };

    let days: u64 = rest
        .parse()
        .map_err(|_| format!("invalid number '{rest}'"))?;

    let offset = days
        .checked_mul(SECS_PER_DAY)
        .ok_or_else(|| "value too large".to_string())?;

    Ok((cmp, now_secs.saturating_sub(offset)))
}

/// Resolve a `--user` value: numeric UID, or a name looked up in passwd
fn resolve_user(value: &str) -> ConfigResult<u32> {
    if value.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return value
            .parse()
            .map_err(|_| invalid_filter_value("user", value, "invalid numeric UID".to_string()));
    }
    sys::lookup_uid(value).ok_or_else(|| ConfigError::UnknownUser {
        name: value.to_string(),
    })
}

/// Resolve a `--group` value: numeric GID, or a name looked up in the
/// group database
fn resolve_group(value: &str) -> ConfigResult<u32> {
    if value.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return value
            .parse()
            .map_err(|_| invalid_filter_value("group", value, "invalid numeric GID".to_string()));
    }
    sys::lookup_gid(value).ok_or_else(|| ConfigError::UnknownGroup {
        name: value.to_string(),
    })
}
