//! The settlement cell: one lock, one transition, one drained registry.
//!
//! A cell is either pending, holding the FIFO list of continuations waiting
//! on it, or settled, holding the shared outcome. The two never coexist:
//! settling swaps the registry out for the outcome under the lock and then
//! schedules the drained continuations through the executor. No user
//! callable ever runs while the lock is held.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::executor::Executor;
use crate::rejection::Rejection;

/// How a promise settled.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The producer delivered a value.
    Fulfilled(T),
    /// The producer (or an upstream handler) delivered an error.
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Outcome::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }

    /// The fulfillment value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Fulfilled(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    /// The rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Fulfilled(_) => None,
            Outcome::Rejected(rejection) => Some(rejection),
        }
    }

    /// Borrowing view of the outcome as a `Result`.
    pub fn as_result(&self) -> Result<&T, &Rejection> {
        match self {
            Outcome::Fulfilled(value) => Ok(value),
            Outcome::Rejected(rejection) => Err(rejection),
        }
    }
}

/// A continuation waiting on a cell. Receives the shared outcome, runs
/// exactly once, always via the executor.
pub(crate) type Continuation<T> = Box<dyn FnOnce(Arc<Outcome<T>>) + Send>;

enum State<T> {
    Pending(Vec<Continuation<T>>),
    Settled(Arc<Outcome<T>>),
}

pub(crate) struct Inner<T> {
    state: Mutex<State<T>>,
    signal: Condvar,
}

impl<T> Inner<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending(Vec::new())),
            signal: Condvar::new(),
        }
    }

    pub(crate) fn settled(outcome: Outcome<T>) -> Self {
        Self {
            state: Mutex::new(State::Settled(Arc::new(outcome))),
            signal: Condvar::new(),
        }
    }

    pub(crate) fn poll(&self) -> Option<Arc<Outcome<T>>> {
        match &*self.state.lock() {
            State::Pending(_) => None,
            State::Settled(outcome) => Some(outcome.clone()),
        }
    }

    pub(crate) fn status(&self) -> &'static str {
        match &*self.state.lock() {
            State::Pending(_) => "pending",
            State::Settled(outcome) if outcome.is_fulfilled() => "fulfilled",
            State::Settled(_) => "rejected",
        }
    }

    pub(crate) fn wait(&self) -> Arc<Outcome<T>> {
        let mut state = self.state.lock();
        loop {
            if let State::Settled(outcome) = &*state {
                return outcome.clone();
            }
            self.signal.wait(&mut state);
        }
    }

    pub(crate) fn wait_for(&self, timeout: Duration) -> Option<Arc<Outcome<T>>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let State::Settled(outcome) = &*state {
                return Some(outcome.clone());
            }
            if self.signal.wait_until(&mut state, deadline).timed_out() {
                return match &*state {
                    State::Settled(outcome) => Some(outcome.clone()),
                    State::Pending(_) => None,
                };
            }
        }
    }
}

impl<T: Send + Sync + 'static> Inner<T> {
    /// Transition to settled. Only the first call wins; the drained
    /// registry is scheduled in attachment order. Returns whether this call
    /// performed the transition.
    pub(crate) fn settle(&self, exec: &Arc<dyn Executor>, outcome: Arc<Outcome<T>>) -> bool {
        let drained = {
            let mut state = self.state.lock();
            match mem::replace(&mut *state, State::Settled(outcome.clone())) {
                State::Pending(registry) => registry,
                State::Settled(first) => {
                    // Lost the race; the first settlement stands.
                    *state = State::Settled(first);
                    tracing::trace!("settlement discarded; cell already settled");
                    return false;
                }
            }
        };
        self.signal.notify_all();
        for continuation in drained {
            let outcome = outcome.clone();
            exec.schedule(Box::new(move || continuation(outcome)));
        }
        true
    }

    /// Register a continuation: queued while pending, scheduled immediately
    /// (never invoked synchronously) once settled.
    pub(crate) fn subscribe(&self, exec: &Arc<dyn Executor>, continuation: Continuation<T>) {
        let settled = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Pending(registry) => {
                    registry.push(continuation);
                    return;
                }
                State::Settled(outcome) => outcome.clone(),
            }
        };
        exec.schedule(Box::new(move || continuation(settled)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ManualExecutor;
    use parking_lot::Mutex;

    fn manual() -> Arc<dyn Executor> {
        Arc::new(ManualExecutor::new())
    }

    #[test]
    fn only_the_first_settlement_wins() {
        let exec = manual();
        let cell = Inner::new();
        assert!(cell.settle(&exec, Arc::new(Outcome::Fulfilled(1))));
        assert!(!cell.settle(&exec, Arc::new(Outcome::Fulfilled(2))));
        assert!(!cell.settle(&exec, Arc::new(Outcome::Rejected(Rejection::new("late")))));
        assert_eq!(cell.poll().unwrap().value(), Some(&1));
    }

    #[test]
    fn subscribe_after_settlement_is_deferred() {
        let exec = Arc::new(ManualExecutor::new());
        let dyn_exec: Arc<dyn Executor> = exec.clone();
        let cell = Inner::new();
        cell.settle(&dyn_exec, Arc::new(Outcome::Fulfilled(7)));

        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        cell.subscribe(
            &dyn_exec,
            Box::new(move |outcome| *sink.lock() = outcome.value().copied()),
        );
        assert_eq!(*seen.lock(), None);
        exec.run();
        assert_eq!(*seen.lock(), Some(7));
    }

    #[test]
    fn drained_registry_preserves_attachment_order() {
        let exec = Arc::new(ManualExecutor::new());
        let dyn_exec: Arc<dyn Executor> = exec.clone();
        let cell = Inner::<()>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 1..=3 {
            let order = order.clone();
            cell.subscribe(&dyn_exec, Box::new(move |_| order.lock().push(tag)));
        }
        cell.settle(&dyn_exec, Arc::new(Outcome::Fulfilled(())));
        exec.run();
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }
}
