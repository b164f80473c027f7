//! parfind - Parallel search for files & dirs in a directory hierarchy
//!
//! A `find`-like tool that walks directory trees with multiple worker
//! threads and applies a pipeline of filters and actions (print, exec,
//! copy, unlink) to every entry it discovers.
//!
//! # Features
//!
//! - **Hybrid breadth/depth search**: Breadth search generates
//!   parallelism by publishing discovered directories to a shared stack;
//!   depth search bounds memory by recursing inline once enough parallel
//!   work exists. (With a single thread it always does depth search,
//!   because there is no parallelism anyways.)
//!
//! - **Quiescence-based termination**: The scan is over exactly when
//!   every worker is blocked on an empty stack; no polling, no counters
//!   of outstanding work.
//!
//! - **Stat on demand**: The directory stream's type hints avoid stat
//!   syscalls entirely unless a filter or action needs attributes.
//!
//! - **find-compatible filters**: type, name and path globs, size and
//!   a/c/mtime thresholds with +/- prefixes, uid/gid, same-filesystem.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       ScanCoordinator                           │
//! │         seeds scan paths, spawns workers, joins, reports        │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │
//! ┌────────────────────────────▼────────────────────────────────────┐
//! │                       Worker Threads                            │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐     │
//! │  │Worker 1 │  │Worker 2 │  │Worker 3 │  ...    │Worker N │     │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘     │
//! │       │            │            │                    │          │
//! │       └────────────┴─────┬──────┴────────────────────┘          │
//! │                          ▼                                      │
//! │           ┌──────────────────────────────┐                      │
//! │           │         SharedStack          │                      │
//! │           │  LIFO of pending directories │                      │
//! │           │  quiescence => termination   │                      │
//! │           └──────────────────────────────┘                      │
//! │                                                                 │
//! │  per entry:  EntryTyper -> FilterPipeline -> ActionPipeline     │
//! │              (hint/stat)   (type,name,path,  (print, exec,      │
//! │                             size,time,owner)  copy, unlink)     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Find all files and dirs under /data/mydir
//! parfind /data/mydir
//!
//! # Regular files over 1 GiB, 16 threads
//! parfind --type f --size +1G -t 16 /data/mydir
//!
//! # JSON records with stat attributes, filter with jq
//! parfind --json --stat /data/mydir | jq -r 'select(.type=="regfile").path'
//! ```

pub mod action;
pub mod config;
pub mod entry;
pub mod error;
pub mod filter;
pub mod stats;
pub mod summary;
pub mod sys;
pub mod walker;

pub use config::{CliArgs, ScanConfig};
pub use error::{ConfigError, ParfindError, Result};
pub use stats::{Statistics, StatsSnapshot};
pub use walker::{ScanCoordinator, ScanReport};
