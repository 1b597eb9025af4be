//! The scheduling capability the settlement machinery relies on.
//!
//! Continuations are never invoked on the stack that settles a cell or the
//! stack that attaches them; they are always posted to an [`Executor`]. Two
//! implementations are provided: [`ThreadExecutor`], a worker thread backed
//! by a multi-producer channel, and [`ManualExecutor`], a cooperative queue
//! with a virtual clock that tests drain by hand.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Deferred-execution capability.
///
/// `schedule` must preserve submission order for tasks posted from a single
/// call site and must not run the task synchronously within the caller.
/// `schedule_after` is the timer primitive behind [`delay`](crate::delay)
/// and [`timeout`](crate::timeout).
pub trait Executor: Send + Sync {
    /// Post `task` for asynchronous execution.
    fn schedule(&self, task: Task);

    /// Post `task` for execution once `delay` has elapsed.
    fn schedule_after(&self, delay: Duration, task: Task);
}

/// Executor backed by a single worker thread draining a channel in FIFO
/// order. Timers sleep on their own thread and re-enqueue into the same
/// channel, so delayed tasks still run on the worker.
///
/// A panicking task is reported and swallowed; it does not take the worker
/// down with it.
pub struct ThreadExecutor {
    queue: Mutex<Sender<Task>>,
}

impl ThreadExecutor {
    pub fn new() -> Self {
        let (tx, rx) = channel::<Task>();
        thread::spawn(move || {
            for task in rx {
                if catch_unwind(AssertUnwindSafe(move || task())).is_err() {
                    tracing::error!("scheduled task panicked");
                }
            }
        });
        Self {
            queue: Mutex::new(tx),
        }
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ThreadExecutor {
    fn schedule(&self, task: Task) {
        // The receiver only disappears at process teardown.
        let _ = self.queue.lock().send(task);
    }

    fn schedule_after(&self, delay: Duration, task: Task) {
        let sender = self.queue.lock().clone();
        thread::spawn(move || {
            thread::sleep(delay);
            let _ = sender.send(task);
        });
    }
}

static DEFAULT_EXECUTOR: Lazy<Arc<ThreadExecutor>> = Lazy::new(|| Arc::new(ThreadExecutor::new()));

/// The process-wide executor promises run on unless one is supplied
/// explicitly.
pub fn default_executor() -> Arc<dyn Executor> {
    DEFAULT_EXECUTOR.clone()
}

struct Timer {
    due: Duration,
    seq: u64,
    task: Task,
}

/// Single-threaded cooperative executor for deterministic tests.
///
/// Nothing runs until [`run`](Self::run) (or [`advance`](Self::advance), for
/// timers) is called, so a test controls exactly when continuations fire and
/// in what order they were queued.
///
/// # Examples
///
/// ```
/// use promise_cell::{ManualExecutor, Promise};
/// use std::sync::Arc;
///
/// let exec = Arc::new(ManualExecutor::new());
/// let (promise, resolver, _rejector) = Promise::pending_on(exec.clone());
/// let doubled = promise.then(|v| Ok(v * 2));
///
/// resolver.resolve(4);
/// assert!(doubled.is_pending());
/// exec.run();
/// assert_eq!(doubled.outcome().unwrap().value(), Some(&8));
/// ```
pub struct ManualExecutor {
    ready: Mutex<VecDeque<Task>>,
    timers: Mutex<Vec<Timer>>,
    now: Mutex<Duration>,
    seq: AtomicU64,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(VecDeque::new()),
            timers: Mutex::new(Vec::new()),
            now: Mutex::new(Duration::ZERO),
            seq: AtomicU64::new(0),
        }
    }

    /// Run the next ready task, if any. The task runs outside the queue
    /// lock, so it may schedule further work.
    pub fn run_one(&self) -> bool {
        let task = self.ready.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Drain the ready queue, including tasks scheduled while draining.
    /// Returns how many tasks ran.
    pub fn run(&self) -> usize {
        let mut executed = 0;
        while self.run_one() {
            executed += 1;
        }
        executed
    }

    /// Advance the virtual clock by `by`, promoting every timer that comes
    /// due (in due-then-submission order) and draining the queue. Returns
    /// how many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let now = {
            let mut now = self.now.lock();
            *now += by;
            *now
        };
        let mut executed = self.run();
        loop {
            let due = {
                let mut timers = self.timers.lock();
                let mut due = Vec::new();
                let mut index = 0;
                while index < timers.len() {
                    if timers[index].due <= now {
                        due.push(timers.remove(index));
                    } else {
                        index += 1;
                    }
                }
                due.sort_by_key(|timer| (timer.due, timer.seq));
                due
            };
            if due.is_empty() {
                break;
            }
            {
                let mut ready = self.ready.lock();
                for timer in due {
                    ready.push_back(timer.task);
                }
            }
            executed += self.run();
        }
        executed
    }

    /// Whether no work is queued and no timer is outstanding.
    pub fn is_idle(&self) -> bool {
        self.ready.lock().is_empty() && self.timers.lock().is_empty()
    }
}

impl Default for ManualExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ManualExecutor {
    fn schedule(&self, task: Task) {
        self.ready.lock().push_back(task);
    }

    fn schedule_after(&self, delay: Duration, task: Task) {
        let due = *self.now.lock() + delay;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.timers.lock().push(Timer { due, seq, task });
    }
}
