//! Parallel directory walker
//!
//! This module implements the hybrid breadth/depth walk: workers pop
//! pending directories from a shared LIFO stack, scan them, and either
//! publish discovered subdirectories back to the stack (breadth mode,
//! generating parallelism) or recurse into them inline (depth mode,
//! bounding memory). The switch point is the `--godeep` threshold on the
//! sampled stack size.
//!
//! # Architecture
//!
//! ```text
//!                  ┌───────────────────────────┐
//!                  │      ScanCoordinator      │
//!                  │  - seeds scan paths       │
//!                  │  - spawns/joins workers   │
//!                  └────────────┬──────────────┘
//!                               │
//!         ┌─────────────────────┼─────────────────────┐
//!         │                     │                     │
//!   ┌─────▼─────┐         ┌─────▼─────┐         ┌─────▼─────┐
//!   │  Worker 1 │         │  Worker 2 │   ...   │  Worker N │
//!   │  scan()   │         │  scan()   │         │  scan()   │
//!   └─────┬─────┘         └─────┬─────┘         └─────┬─────┘
//!         │        push / pop_wait (quiescence)       │
//!         └─────────────────────┼─────────────────────┘
//!                               ▼
//!                  ┌───────────────────────────┐
//!                  │        SharedStack        │
//!                  │  LIFO + mutex + condvar   │
//!                  └───────────────────────────┘
//! ```

pub mod coordinator;
pub mod stack;
pub mod worker;

pub use coordinator::{ScanCoordinator, ScanReport};
pub use stack::{PopOutcome, SharedStack, WorkItem};
pub use worker::Walker;

use crate::config::ScanConfig;
use crate::stats::Statistics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared handles passed to every worker
///
/// There is no process-wide mutable state: configuration is shared
/// read-only, statistics are atomic counters, and the stack carries its
/// own lock.
#[derive(Clone)]
pub struct ScanContext {
    pub config: Arc<ScanConfig>,
    pub stats: Arc<Statistics>,
    pub stack: Arc<SharedStack>,

    /// Set when an unrecoverable error was hit; workers stop between
    /// directories and blocked workers are woken through the stack
    fatal: Arc<AtomicBool>,

    /// Set by the interrupt handler for a graceful early stop
    shutdown: Arc<AtomicBool>,
}

impl ScanContext {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        let num_threads = config.num_threads;
        Self {
            config,
            stats: Arc::new(Statistics::default()),
            stack: Arc::new(SharedStack::new(num_threads)),
            fatal: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag a fatal condition and wake all blocked workers
    pub fn raise_fatal(&self) {
        self.fatal.store(true, Ordering::SeqCst);
        self.stack.shutdown();
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }

    /// Request a graceful stop (interrupt handler)
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.stack.shutdown();
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Check whether scanning should stop before entering a directory
    pub fn should_stop(&self) -> bool {
        self.is_fatal()
            || self.shutdown_requested()
            || (self.config.quit_after_first_match && self.stats.matches() > 0)
    }
}
