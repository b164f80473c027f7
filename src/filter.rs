//! Entry filter pipeline
//!
//! A conjunction of predicates evaluated in a fixed order with
//! short-circuit on the first reject:
//!
//! 1. type filter (`--type`)
//! 2. name filter (`--name`, or-set over the basename)
//! 3. path filter (`--path`, full path, non-directories only)
//! 4. size/time filters (`--size/--atime/--ctime/--mtime`, non-directories
//!    only, stat info required)
//! 5. uid/gid filters (`--uid/--gid/--user/--group`, stat info required)
//!
//! Filters never produce errors: they decide on whatever data was
//! successfully obtained, and entries whose required data is missing are
//! rejected.

use crate::config::{Bounds, ScanConfig};
use crate::entry::{EntryStat, EntryType, EntryView};
use std::sync::Arc;
use tracing::warn;

/// Ordered predicates that accept or reject a discovered entry
pub struct FilterPipeline {
    config: Arc<ScanConfig>,
}

impl FilterPipeline {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        Self { config }
    }

    /// Run the entry through all predicates
    pub fn accepts(&self, entry: &EntryView<'_>) -> bool {
        self.accepts_type(entry)
            && self.accepts_name(entry)
            && self.accepts_path(entry)
            && self.accepts_size_and_time(entry)
            && self.accepts_owner(entry)
    }

    /// Type filter: reject unless the resolved type matches `--type`
    fn accepts_type(&self, entry: &EntryView<'_>) -> bool {
        let Some(wanted) = self.config.search_type else {
            return true;
        };

        let resolved = entry.resolved_type();
        if resolved == EntryType::Unknown {
            warn!("Cannot identify type of entry. Path: {}", entry.path);
            return false;
        }

        resolved == wanted
    }

    /// Name filter: the basename has to match any of the `--name` patterns
    fn accepts_name(&self, entry: &EntryView<'_>) -> bool {
        let Some(name_set) = &self.config.name_filters else {
            return true;
        };

        name_set.is_match(entry.file_name())
    }

    /// Path filter: full-path glob, applicable to non-directories only
    fn accepts_path(&self, entry: &EntryView<'_>) -> bool {
        let Some(path_glob) = &self.config.path_filter else {
            return true;
        };

        if !entry.is_non_directory() {
            return false; // anything that's not a file can't match
        }

        path_glob.is_match(entry.path)
    }

    /// Size/time filters: non-directories only, stat info required
    ///
    /// The four stat fields share one check, parameterized by a bounds
    /// table instead of four copies of the comparison code.
    fn accepts_size_and_time(&self, entry: &EntryView<'_>) -> bool {
        let checks = stat_bound_checks(&self.config);
        if !checks.iter().any(|(bounds, _)| bounds.is_active()) {
            return true;
        }

        if !entry.is_non_directory() {
            return false; // anything that's not a file can't match
        }

        let Some(stat) = entry.stat else {
            return false; // can't filter without stat info
        };

        checks
            .iter()
            .all(|(bounds, extract)| bounds.matches(extract(stat)))
    }

    /// UID/GID filters: stat info required, exact equality
    fn accepts_owner(&self, entry: &EntryView<'_>) -> bool {
        if let Some(uid) = self.config.filter_uid {
            match entry.stat {
                Some(stat) if stat.uid == uid => {}
                _ => return false,
            }
        }

        if let Some(gid) = self.config.filter_gid {
            match entry.stat {
                Some(stat) if stat.gid == gid => {}
                _ => return false,
            }
        }

        true
    }
}

type StatExtractor = fn(&EntryStat) -> u64;

/// The four size/time constraints with their stat-field extractors
fn stat_bound_checks(config: &ScanConfig) -> [(&Bounds, StatExtractor); 4] {
    [
        (&config.size_filter, |st| st.size),
        (&config.atime_filter, |st| st.atime.max(0) as u64),
        (&config.ctime_filter, |st| st.ctime.max(0) as u64),
        (&config.mtime_filter, |st| st.mtime.max(0) as u64),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CliArgs, Cmp};
    use clap::Parser;

    fn config_from(argv: &[&str]) -> Arc<ScanConfig> {
        let mut full = vec!["parfind"];
        full.extend_from_slice(argv);
        full.push(".");
        let args = CliArgs::parse_from(full);
        Arc::new(ScanConfig::from_args(args, Vec::new()).unwrap())
    }

    fn file_view<'a>(path: &'a str, stat: Option<&'a EntryStat>) -> EntryView<'a> {
        EntryView {
            path,
            hint: EntryType::File,
            stat,
        }
    }

    #[test]
    fn test_no_filters_accept_everything() {
        let pipeline = FilterPipeline::new(config_from(&[]));
        assert!(pipeline.accepts(&file_view("/data/a", None)));
    }

    #[test]
    fn test_type_filter() {
        let pipeline = FilterPipeline::new(config_from(&["--type", "d"]));

        let dir = EntryView {
            path: "/data/sub",
            hint: EntryType::Directory,
            stat: None,
        };
        assert!(pipeline.accepts(&dir));
        assert!(!pipeline.accepts(&file_view("/data/a", None)));

        // unknown even after stat: diagnostic + reject
        let unknown = EntryView {
            path: "/data/x",
            hint: EntryType::Unknown,
            stat: None,
        };
        assert!(!pipeline.accepts(&unknown));
    }

    #[test]
    fn test_type_filter_resolves_from_stat() {
        let pipeline = FilterPipeline::new(config_from(&["--type", "f"]));

        let stat = EntryStat {
            mode: 0o100644,
            ..Default::default()
        };
        let view = EntryView {
            path: "/data/f",
            hint: EntryType::Unknown,
            stat: Some(&stat),
        };
        assert!(pipeline.accepts(&view));
    }

    #[test]
    fn test_name_filter_any_of() {
        let pipeline =
            FilterPipeline::new(config_from(&["--name", "*.txt", "--name", "*.log"]));

        assert!(pipeline.accepts(&file_view("/data/a.txt", None)));
        assert!(pipeline.accepts(&file_view("/data/sub/b.log", None)));
        assert!(!pipeline.accepts(&file_view("/data/c.bin", None)));
    }

    #[test]
    fn test_name_filter_question_mark() {
        let pipeline = FilterPipeline::new(config_from(&["--name", "f?.dat"]));
        assert!(pipeline.accepts(&file_view("/data/f1.dat", None)));
        assert!(!pipeline.accepts(&file_view("/data/f12.dat", None)));
    }

    #[test]
    fn test_path_filter_rejects_directories() {
        let pipeline = FilterPipeline::new(config_from(&["--path", "*/sub/*"]));

        assert!(pipeline.accepts(&file_view("/data/sub/f", None)));

        let dir = EntryView {
            path: "/data/sub/child",
            hint: EntryType::Directory,
            stat: None,
        };
        assert!(!pipeline.accepts(&dir));

        // unknown type with no stat: not provably a file, reject
        let unknown = EntryView {
            path: "/data/sub/x",
            hint: EntryType::Unknown,
            stat: None,
        };
        assert!(!pipeline.accepts(&unknown));
    }

    #[test]
    fn test_size_filter_strict_bounds() {
        let pipeline = FilterPipeline::new(config_from(&["--size", "+15c"]));

        let small = EntryStat {
            mode: 0o100644,
            size: 10,
            ..Default::default()
        };
        let exact = EntryStat {
            mode: 0o100644,
            size: 15,
            ..Default::default()
        };
        let big = EntryStat {
            mode: 0o100644,
            size: 20,
            ..Default::default()
        };

        assert!(!pipeline.accepts(&file_view("/a", Some(&small))));
        assert!(!pipeline.accepts(&file_view("/b", Some(&exact)))); // strictly greater
        assert!(pipeline.accepts(&file_view("/c", Some(&big))));

        // stat info required
        assert!(!pipeline.accepts(&file_view("/d", None)));
    }

    #[test]
    fn test_size_filter_rejects_directories() {
        let pipeline = FilterPipeline::new(config_from(&["--size", "+1c"]));

        let stat = EntryStat {
            mode: 0o040755,
            size: 4096,
            ..Default::default()
        };
        let dir = EntryView {
            path: "/data/sub",
            hint: EntryType::Directory,
            stat: Some(&stat),
        };
        assert!(!pipeline.accepts(&dir));
    }

    #[test]
    fn test_combined_time_bounds() {
        let mut config = (*config_from(&[])).clone();
        config.mtime_filter.set(Cmp::Greater, 100);
        config.mtime_filter.set(Cmp::Less, 200);
        let pipeline = FilterPipeline::new(Arc::new(config));

        let mk = |mtime: i64| EntryStat {
            mode: 0o100644,
            mtime,
            ..Default::default()
        };

        let inside = mk(150);
        let below = mk(100);
        let above = mk(200);
        assert!(pipeline.accepts(&file_view("/a", Some(&inside))));
        assert!(!pipeline.accepts(&file_view("/b", Some(&below))));
        assert!(!pipeline.accepts(&file_view("/c", Some(&above))));
    }

    #[test]
    fn test_owner_filter() {
        let pipeline = FilterPipeline::new(config_from(&["--uid", "1000"]));

        let mine = EntryStat {
            mode: 0o100644,
            uid: 1000,
            ..Default::default()
        };
        let theirs = EntryStat {
            mode: 0o100644,
            uid: 1001,
            ..Default::default()
        };

        assert!(pipeline.accepts(&file_view("/a", Some(&mine))));
        assert!(!pipeline.accepts(&file_view("/b", Some(&theirs))));
        assert!(!pipeline.accepts(&file_view("/c", None)));
    }
}
