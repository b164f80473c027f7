//! Scan coordinator - orchestrates the parallel walk
//!
//! The coordinator is responsible for:
//! - Seeding the shared stack with the user-given scan paths
//! - Running the pipelines on the scan paths themselves
//! - Spawning and joining the worker threads
//! - Producing the final report and exit status

use crate::config::{trim_scan_path, ScanConfig};
use crate::entry::{EntryType, EntryView};
use crate::stats::StatsSnapshot;
use crate::sys;
use crate::walker::{ScanContext, Walker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of a completed scan
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Final counter values
    pub stats: StatsSnapshot,

    /// Wall-clock duration of the scan
    pub duration: Duration,

    /// False when any scan path failed or a fatal condition was raised
    pub success: bool,
}

/// Coordinates the parallel filesystem scan
pub struct ScanCoordinator {
    ctx: ScanContext,

    /// Scan-path failures that don't abort the run still fail it
    path_failure: AtomicBool,
}

impl ScanCoordinator {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        Self {
            ctx: ScanContext::new(config),
            path_failure: AtomicBool::new(false),
        }
    }

    /// Context handle for signal handlers (shutdown requests)
    pub fn context(&self) -> ScanContext {
        self.ctx.clone()
    }

    /// Run the scan: seed, spawn, join, report
    pub fn run(&self) -> ScanReport {
        let start = Instant::now();
        let config = &self.ctx.config;

        info!(
            threads = config.num_threads,
            godeep = config.godeep_threshold,
            paths = ?config.scan_paths,
            "Starting scan"
        );

        self.seed_scan_paths();

        // start threads; they self-terminate on quiescence
        let mut handles = Vec::with_capacity(config.num_threads as usize);
        for worker_id in 0..config.num_threads as usize {
            let ctx = self.ctx.clone();
            let handle = thread::Builder::new()
                .name(format!("scan-{worker_id}"))
                .spawn(move || Walker::new(ctx).run(worker_id))
                .expect("Failed to spawn worker thread");
            handles.push(handle);
        }

        for handle in handles {
            let _ = handle.join();
        }

        debug!("All workers joined");

        ScanReport {
            stats: self.ctx.stats.snapshot(),
            duration: start.elapsed(),
            success: !self.ctx.is_fatal() && !self.path_failure.load(Ordering::Relaxed),
        }
    }

    /// Check the type of the user-given paths, run the pipelines on them
    /// and put directories onto the stack
    fn seed_scan_paths(&self) {
        let config = &self.ctx.config;
        let walker = Walker::new(self.ctx.clone());

        for scan_path in &config.scan_paths {
            let stat = match sys::lstat(scan_path) {
                Ok(st) => st,
                Err(e) => {
                    warn!("Failed to get attributes for path: {scan_path}; Error: {e}");
                    self.path_failure.store(true, Ordering::Relaxed);

                    if matches!(e.raw_os_error(), Some(libc::EACCES) | Some(libc::ENOENT)) {
                        continue;
                    }

                    // anything else is unrecoverable
                    self.ctx.raise_fatal();
                    return;
                }
            };

            if stat.is_dir() {
                self.ctx.stats.record_dir();
            } else {
                self.ctx.stats.record_file();
            }

            // scan paths carry no directory-stream hint; the type comes
            // from the lstat result
            let view = EntryView {
                path: scan_path,
                hint: EntryType::Unknown,
                stat: Some(&stat),
            };

            walker.process_entry(&view);

            // scan paths have depth 0; their entries have depth 1
            if stat.is_dir() && config.max_dir_depth > 0 {
                let trimmed = trim_scan_path(scan_path);
                self.ctx.stack.push(trimmed.to_string(), 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CliArgs;
    use clap::Parser;

    fn coordinator_for(argv: &[&str], paths: &[&str]) -> ScanCoordinator {
        let mut full = vec!["parfind"];
        full.extend_from_slice(argv);
        full.extend_from_slice(paths);
        let args = CliArgs::parse_from(full);
        let config = Arc::new(ScanConfig::from_args(args, Vec::new()).unwrap());
        ScanCoordinator::new(config)
    }

    #[test]
    fn test_empty_tree_quiesces() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();

        let coordinator = coordinator_for(&["--noprint", "-t", "4"], &[root]);
        let report = coordinator.run();

        assert!(report.success);
        // only the scan path itself was discovered
        assert_eq!(report.stats.dirs_found, 1);
        assert_eq!(report.stats.files_found, 0);
    }

    #[test]
    fn test_missing_scan_path_fails_run_but_completes() {
        let coordinator =
            coordinator_for(&["--noprint", "-t", "2"], &["/nonexistent-parfind-path"]);
        let report = coordinator.run();

        assert!(!report.success);
        assert_eq!(report.stats.files_found, 0);
    }

    #[test]
    fn test_scan_path_trailing_slash_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), b"x").unwrap();
        let root_slash = format!("{}/", dir.path().to_str().unwrap());

        let coordinator = coordinator_for(&["--noprint", "-t", "1"], &[&root_slash]);
        let report = coordinator.run();

        assert!(report.success);
        assert_eq!(report.stats.files_found, 1);
    }

    #[test]
    fn test_file_as_scan_path() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("f");
        std::fs::write(&file_path, b"x").unwrap();

        let coordinator =
            coordinator_for(&["--noprint", "-t", "1"], &[file_path.to_str().unwrap()]);
        let report = coordinator.run();

        assert!(report.success);
        // the file itself went through the pipelines
        assert_eq!(report.stats.filter_matches, 1);
        assert_eq!(report.stats.files_found, 1);
        // but was never scanned as a directory
        assert_eq!(report.stats.dirs_found, 0);
    }

    #[test]
    fn test_maxdepth_zero_skips_descent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), b"x").unwrap();
        let root = dir.path().to_str().unwrap();

        let coordinator =
            coordinator_for(&["--noprint", "-t", "1", "--maxdepth", "0"], &[root]);
        let report = coordinator.run();

        assert!(report.success);
        // the scan path matched, nothing below it was read
        assert_eq!(report.stats.filter_matches, 1);
        assert_eq!(report.stats.files_found, 0);
    }
}
