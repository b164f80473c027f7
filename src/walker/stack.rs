//! Shared work stack with quiescence-based termination
//!
//! This is the stack for directories that were found by the breadth
//! search threads. LIFO order keeps the working set close to the most
//! recently discovered subtrees.
//!
//! # Termination protocol
//!
//! The scan is over exactly when every worker is simultaneously blocked
//! in `pop_wait` on an empty stack: no active worker means no further
//! pushes can happen. The first waiter to observe
//! `num_waiters == num_threads` under the lock broadcasts the condvar and
//! reports `Done`, and deliberately does NOT decrement `num_waiters`, so
//! every other waiter waking from the broadcast observes the same
//! terminal condition and also reports `Done`. A push racing with the
//! terminal detection is impossible: it would require a worker that is
//! not currently inside `pop_wait`, contradicting the waiter count.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

/// A pending directory: its path and its depth relative to the scan-path
/// root (scan paths themselves have depth 0)
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub dir_path: String,
    pub depth: u16,
}

/// Outcome of a blocking pop
#[derive(Debug)]
pub enum PopOutcome {
    /// A directory to scan
    Item(WorkItem),

    /// Quiescence reached or shutdown requested; the worker stops
    Done,
}

#[derive(Debug, Default)]
struct StackInner {
    items: Vec<WorkItem>,
    num_waiters: u32,
    shutdown: bool,
}

/// Bounded-by-filesystem work stack shared by all scan threads
pub struct SharedStack {
    inner: Mutex<StackInner>,
    cond: Condvar,

    /// Mirror of the stack length for lock-free sampling; only a
    /// heuristic for the breadth/depth switch
    size: AtomicU64,

    /// Total number of worker threads, for quiescence detection
    num_threads: u32,
}

impl SharedStack {
    pub fn new(num_threads: u32) -> Self {
        Self {
            inner: Mutex::new(StackInner::default()),
            cond: Condvar::new(),
            size: AtomicU64::new(0),
            num_threads,
        }
    }

    /// Push a pending directory and wake one waiter
    pub fn push(&self, dir_path: String, depth: u16) {
        let mut inner = self.inner.lock();

        inner.items.push(WorkItem { dir_path, depth });
        self.size.fetch_add(1, Ordering::Relaxed);

        self.cond.notify_one();
    }

    /// Pop the top item, blocking on an empty stack until either new work
    /// arrives or the scan terminates
    pub fn pop_wait(&self) -> PopOutcome {
        let mut inner = self.inner.lock();

        inner.num_waiters += 1;

        while inner.items.is_empty() {
            if inner.shutdown || inner.num_waiters == self.num_threads {
                // all threads waiting => end of dir tree scan.
                // note: no num_waiters decrement here, so that all threads
                // see the termination condition
                self.cond.notify_all();
                return PopOutcome::Done;
            }

            self.cond.wait(&mut inner);
        }

        inner.num_waiters -= 1;

        let item = inner.items.pop().expect("stack checked non-empty");
        self.size.fetch_sub(1, Ordering::Relaxed);

        PopOutcome::Item(item)
    }

    /// Request termination: all current and future `pop_wait` callers
    /// return `Done` once the remaining items drain
    ///
    /// Used by the fatal-error path and the interrupt handler.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.shutdown = true;
        self.cond.notify_all();
    }

    /// Lock-free getter of the current stack size (approximate)
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_push_pop_lifo() {
        let stack = SharedStack::new(1);
        stack.push("/a".into(), 1);
        stack.push("/b".into(), 2);
        assert_eq!(stack.size(), 2);

        match stack.pop_wait() {
            PopOutcome::Item(item) => {
                assert_eq!(item.dir_path, "/b");
                assert_eq!(item.depth, 2);
            }
            PopOutcome::Done => panic!("expected item"),
        }
        assert_eq!(stack.size(), 1);
    }

    #[test]
    fn test_single_thread_quiescence() {
        let stack = SharedStack::new(1);
        stack.push("/a".into(), 1);

        assert!(matches!(stack.pop_wait(), PopOutcome::Item(_)));
        // empty stack and the only thread waiting => done
        assert!(matches!(stack.pop_wait(), PopOutcome::Done));
    }

    #[test]
    fn test_all_threads_observe_termination() {
        let num_threads = 4;
        let stack = Arc::new(SharedStack::new(num_threads));

        let handles: Vec<_> = (0..num_threads)
            .map(|_| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || {
                    let mut popped = 0u32;
                    loop {
                        match stack.pop_wait() {
                            PopOutcome::Item(_) => popped += 1,
                            PopOutcome::Done => return popped,
                        }
                    }
                })
            })
            .collect();

        // give the workers a moment to block, then feed a few items
        thread::sleep(Duration::from_millis(50));
        for i in 0..10 {
            stack.push(format!("/dir{i}"), 1);
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_empty_stack_terminates_immediately_when_all_wait() {
        let stack = Arc::new(SharedStack::new(2));

        let s1 = Arc::clone(&stack);
        let h1 = thread::spawn(move || matches!(s1.pop_wait(), PopOutcome::Done));
        let s2 = Arc::clone(&stack);
        let h2 = thread::spawn(move || matches!(s2.pop_wait(), PopOutcome::Done));

        assert!(h1.join().unwrap());
        assert!(h2.join().unwrap());
    }

    #[test]
    fn test_shutdown_wakes_waiters() {
        let stack = Arc::new(SharedStack::new(8));

        let s = Arc::clone(&stack);
        let handle = thread::spawn(move || matches!(s.pop_wait(), PopOutcome::Done));

        thread::sleep(Duration::from_millis(20));
        stack.shutdown();

        assert!(handle.join().unwrap());
    }
}
