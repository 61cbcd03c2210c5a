//! Fixed-size worker pool for asynchronous delivery
//!
//! Every worker owns one FIFO queue (a *lane*). [`ThreadPool::submit`] spreads
//! tasks across lanes round-robin; a [`Lane`] handle pins all of its tasks to
//! one worker, which is how a logger keeps its records in call order while
//! sharing the pool with other loggers.

use super::dispatch::panic_message;
use super::error::{LoggerError, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Worker count used by [`ThreadPool::default`]
pub const DEFAULT_POOL_SIZE: usize = 4;

struct Shared {
    /// Set by `shutdown(false)`; workers then drop what is left in their queues
    discard: AtomicBool,
    discarded: AtomicU64,
    completed: AtomicU64,
}

pub struct ThreadPool {
    lanes: RwLock<Option<Vec<Sender<Task>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shared: Arc<Shared>,
    next_lane: AtomicUsize,
    size: usize,
    queue_capacity: Option<usize>,
}

impl ThreadPool {
    /// Start `size` workers with unbounded queues.
    ///
    /// # Errors
    ///
    /// Fails if `size` is zero or a worker thread cannot be spawned.
    pub fn new(size: usize) -> Result<Self> {
        Self::builder().workers(size).build()
    }

    #[must_use]
    pub fn builder() -> ThreadPoolBuilder {
        ThreadPoolBuilder::new()
    }

    fn start(size: usize, queue_capacity: Option<usize>, thread_name: &str) -> Result<Self> {
        if size == 0 {
            return Err(LoggerError::config("ThreadPool", "worker count must be at least 1"));
        }
        if queue_capacity == Some(0) {
            return Err(LoggerError::config("ThreadPool", "queue capacity must be at least 1"));
        }

        let shared = Arc::new(Shared {
            discard: AtomicBool::new(false),
            discarded: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        });

        let mut senders = Vec::with_capacity(size);
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let (sender, receiver) = match queue_capacity {
                Some(capacity) => bounded(capacity),
                None => unbounded(),
            };
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", thread_name, index))
                .spawn(move || Self::run_worker(receiver, worker_shared));

            match spawned {
                Ok(handle) => {
                    senders.push(sender);
                    workers.push(handle);
                }
                Err(e) => {
                    // Close the lanes already started before bailing out
                    drop(senders);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(LoggerError::io_operation(
                        "spawning pool worker",
                        format!("cannot start worker {}", index),
                        e,
                    ));
                }
            }
        }

        Ok(Self {
            lanes: RwLock::new(Some(senders)),
            workers: Mutex::new(workers),
            shared,
            next_lane: AtomicUsize::new(0),
            size,
            queue_capacity,
        })
    }

    fn run_worker(receiver: Receiver<Task>, shared: Arc<Shared>) {
        // Exits once the lane is closed and empty
        while let Ok(task) = receiver.recv() {
            if shared.discard.load(Ordering::Acquire) {
                shared.discarded.fetch_add(1, Ordering::Relaxed);
                drop(task);
                continue;
            }

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                eprintln!(
                    "[FLOG CRITICAL] Pool task panicked on {}: {}",
                    thread::current().name().unwrap_or("worker"),
                    panic_message(payload.as_ref())
                );
            }
            shared.completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Queue `task` on the next lane in round-robin order.
    ///
    /// Blocks while that lane is full if the pool has a queue capacity.
    ///
    /// # Errors
    ///
    /// [`LoggerError::PoolClosed`] once [`shutdown`](Self::shutdown) has begun.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let lane = self.next_lane.fetch_add(1, Ordering::Relaxed) % self.size;
        self.submit_to(lane, Box::new(task))
    }

    fn submit_to(&self, lane: usize, task: Task) -> Result<()> {
        let lanes = self.lanes.read();
        let sender = lanes
            .as_ref()
            .and_then(|senders| senders.get(lane))
            .ok_or(LoggerError::PoolClosed)?;
        sender.send(task).map_err(|_| LoggerError::PoolClosed)
    }

    /// Hand out a lane pinned to one worker, assigned round-robin.
    pub fn lane(self: &Arc<Self>) -> Lane {
        let index = self.next_lane.fetch_add(1, Ordering::Relaxed) % self.size;
        Lane {
            pool: Arc::clone(self),
            index,
        }
    }

    /// Stop accepting tasks and join every worker.
    ///
    /// With `wait_for_drain`, queued tasks still run; without it they are
    /// dropped unexecuted and counted in [`discarded_tasks`](Self::discarded_tasks).
    /// Calls after the first return immediately.
    pub fn shutdown(&self, wait_for_drain: bool) {
        if !wait_for_drain {
            self.shared.discard.store(true, Ordering::Release);
        }

        // Dropping the senders disconnects each lane after its backlog
        let closed = self.lanes.write().take();
        if closed.is_none() {
            return;
        }
        drop(closed);

        let workers = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        for handle in workers {
            // A task may drop the last handle to its own pool
            if handle.thread().id() == current {
                continue;
            }
            if let Err(e) = handle.join() {
                eprintln!("[FLOG ERROR] Pool worker panicked during shutdown: {:?}", e);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lanes.read().is_none()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn queue_capacity(&self) -> Option<usize> {
        self.queue_capacity
    }

    pub fn completed_tasks(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }

    pub fn discarded_tasks(&self) -> u64 {
        self.shared.discarded.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("size", &self.size)
            .field("queue_capacity", &self.queue_capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}

/// All tasks submitted through one lane run on the same worker, in order.
#[derive(Debug, Clone)]
pub struct Lane {
    pool: Arc<ThreadPool>,
    index: usize,
}

impl Lane {
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.submit_to(self.index, Box::new(task))
    }

    pub fn pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Builder for [`ThreadPool`]
///
/// ```
/// use flog::ThreadPool;
///
/// let pool = ThreadPool::builder()
///     .workers(2)
///     .queue_capacity(1024)
///     .thread_name("log-io")
///     .build()
///     .unwrap();
/// assert_eq!(pool.size(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ThreadPoolBuilder {
    workers: usize,
    queue_capacity: Option<usize>,
    thread_name: String,
}

impl ThreadPoolBuilder {
    pub fn new() -> Self {
        Self {
            workers: DEFAULT_POOL_SIZE,
            queue_capacity: None,
            thread_name: "flog-worker".to_string(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Bound each lane; `submit` blocks while the target lane is full.
    #[must_use = "builder methods return a new value"]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    pub fn build(self) -> Result<ThreadPool> {
        ThreadPool::start(self.workers, self.queue_capacity, &self.thread_name)
    }
}

impl Default for ThreadPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_rejects_zero_workers() {
        assert!(matches!(
            ThreadPool::new(0),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
        assert!(ThreadPool::builder().queue_capacity(0).build().is_err());
    }

    #[test]
    fn test_runs_all_tasks_before_drain_completes() {
        let pool = ThreadPool::new(3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown(true);
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert_eq!(pool.completed_tasks(), 100);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let pool = Arc::new(ThreadPool::new(1).unwrap());
        let lane = pool.lane();
        pool.shutdown(true);
        assert!(pool.is_closed());
        assert!(matches!(pool.submit(|| {}), Err(LoggerError::PoolClosed)));
        assert!(matches!(lane.submit(|| {}), Err(LoggerError::PoolClosed)));
        // Idempotent
        pool.shutdown(true);
    }

    #[test]
    fn test_lane_preserves_order() {
        let pool = Arc::new(ThreadPool::new(4).unwrap());
        let lane = pool.lane();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..500 {
            let seen = Arc::clone(&seen);
            lane.submit(move || seen.lock().push(i)).unwrap();
        }
        pool.shutdown(true);
        let seen = seen.lock();
        assert_eq!(*seen, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn test_shutdown_without_drain_discards() {
        let pool = Arc::new(ThreadPool::new(1).unwrap());
        let lane = pool.lane();
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(0);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let ran = Arc::new(AtomicUsize::new(0));

        lane.submit(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        })
        .unwrap();
        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            lane.submit(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        started_rx.recv().unwrap();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let _ = release_tx.send(());
        });
        pool.shutdown(false);
        releaser.join().unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pool.discarded_tasks(), 10);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = ThreadPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(|| panic!("boom")).unwrap();
        let c = Arc::clone(&counter);
        pool.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        pool.shutdown(true);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bounded_queue_applies_backpressure() {
        let pool = ThreadPool::builder()
            .workers(1)
            .queue_capacity(2)
            .build()
            .unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_micros(100));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown(true);
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }
}
