//! Shared scan statistics
//!
//! All counters are monotonically increasing and individually atomic;
//! relaxed ordering is sufficient because they are only aggregated after
//! the workers have been joined (and sampled for progress/quit checks
//! where staleness is acceptable).

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by all worker threads
#[derive(Debug, Default)]
pub struct Statistics {
    /// Directories discovered
    pub dirs_found: AtomicU64,

    /// Non-directories discovered (files, symlinks, devices, ...)
    pub files_found: AtomicU64,

    /// Entries whose directory-stream type hint was unknown
    pub unknown_type: AtomicU64,

    /// Entries that passed all filters and completed the action pipeline
    pub filter_matches: AtomicU64,

    /// stat syscalls issued
    pub stat_calls: AtomicU64,

    /// Access ACLs found (--aclcheck)
    pub access_acls: AtomicU64,

    /// Default ACLs found on directories (--aclcheck)
    pub default_acls: AtomicU64,

    /// Errors encountered (permission, I/O, stat, copy, unlink)
    pub errors: AtomicU64,

    /// Bytes written by the copy action
    pub bytes_copied: AtomicU64,

    /// Entries skipped by the copy action due to non-copyable type
    pub files_not_copied: AtomicU64,
}

impl Statistics {
    pub fn record_dir(&self) {
        self.dirs_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file(&self) {
        self.files_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown(&self) {
        self.unknown_type.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_match(&self) {
        self.filter_matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stat_call(&self) {
        self.stat_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_access_acl(&self) {
        self.access_acls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_default_acl(&self) {
        self.default_acls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_copied(&self, bytes: u64) {
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_file_not_copied(&self) {
        self.files_not_copied.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of filter matches so far (for --quit checks)
    pub fn matches(&self) -> u64 {
        self.filter_matches.load(Ordering::Relaxed)
    }

    /// Take a plain-value snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dirs_found: self.dirs_found.load(Ordering::Relaxed),
            files_found: self.files_found.load(Ordering::Relaxed),
            unknown_type: self.unknown_type.load(Ordering::Relaxed),
            filter_matches: self.filter_matches.load(Ordering::Relaxed),
            stat_calls: self.stat_calls.load(Ordering::Relaxed),
            access_acls: self.access_acls.load(Ordering::Relaxed),
            default_acls: self.default_acls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            files_not_copied: self.files_not_copied.load(Ordering::Relaxed),
        }
    }
}

/// Plain-value view of the counters, used by the end-of-run summary
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub dirs_found: u64,
    pub files_found: u64,
    pub unknown_type: u64,
    pub filter_matches: u64,
    pub stat_calls: u64,
    pub access_acls: u64,
    pub default_acls: u64,
    pub errors: u64,
    pub bytes_copied: u64,
    pub files_not_copied: u64,
}

impl StatsSnapshot {
    /// Total entries discovered (dirs + non-dirs)
    pub fn entries_total(&self) -> u64 {
        self.dirs_found + self.files_found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = Statistics::default();
        stats.record_dir();
        stats.record_file();
        stats.record_file();
        stats.record_bytes_copied(100);
        stats.record_bytes_copied(24);

        let snap = stats.snapshot();
        assert_eq!(snap.dirs_found, 1);
        assert_eq!(snap.files_found, 2);
        assert_eq!(snap.entries_total(), 3);
        assert_eq!(snap.bytes_copied, 124);
    }

    #[test]
    fn test_matches_sampling() {
        let stats = Statistics::default();
        assert_eq!(stats.matches(), 0);
        stats.record_match();
        assert_eq!(stats.matches(), 1);
    }
}
