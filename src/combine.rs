//! Combinators over collections of promises and values.
//!
//! Everything here is built on the public handle API (`pending_on`,
//! `on_settled`, `then`, the producer pair); nothing reaches into cell
//! internals. Per-element transformations come in two forms, mirroring the
//! engine's `then`/`chain` split: a plain variant whose function returns a
//! value, and a `_chain` variant whose function returns a promise that is
//! flattened per element.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cell::Outcome;
use crate::executor::{default_executor, Executor};
use crate::promise::Promise;
use crate::rejection::{AggregateError, EmptyInput, Rejection, TimedOut};

struct Gather<V> {
    slots: Vec<Option<V>>,
    remaining: usize,
}

impl<V> Gather<V> {
    fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| None).collect(),
            remaining: len,
        }
    }

    /// Record the settlement for `index`; returns the completed, ordered
    /// collection once every slot is filled.
    fn fill(&mut self, index: usize, value: V) -> Option<Vec<V>> {
        self.slots[index] = Some(value);
        self.remaining -= 1;
        if self.remaining == 0 {
            Some(self.slots.iter_mut().filter_map(Option::take).collect())
        } else {
            None
        }
    }
}

fn shared_executor<T: Send + Sync + 'static>(promises: &[Promise<T>]) -> Arc<dyn Executor> {
    promises
        .first()
        .map(Promise::executor)
        .unwrap_or_else(default_executor)
}

/// Fulfills with every input's value in input order once all inputs
/// fulfill, regardless of completion order; rejects with the first
/// rejection observed. The remaining inputs are not cancelled; they keep
/// running and their settlements are discarded.
///
/// An empty list fulfills immediately with an empty `Vec`.
///
/// # Examples
///
/// ```
/// use promise_cell::{all, Promise};
///
/// let combined = all(vec![Promise::resolve(1), Promise::resolve(2)]);
/// assert_eq!(combined.wait().value(), Some(&vec![1, 2]));
/// ```
pub fn all<T>(promises: Vec<Promise<T>>) -> Promise<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    if promises.is_empty() {
        return Promise::resolve(Vec::new());
    }
    let exec = shared_executor(&promises);
    let (combined, resolver, rejector) = Promise::pending_on(exec);
    let gathered = Arc::new(Mutex::new(Gather::new(promises.len())));
    for (index, promise) in promises.iter().enumerate() {
        let gathered = gathered.clone();
        let resolver = resolver.clone();
        let rejector = rejector.clone();
        promise.on_settled(move |outcome| match &*outcome {
            Outcome::Fulfilled(value) => {
                let completed = gathered.lock().fill(index, value.clone());
                if let Some(values) = completed {
                    resolver.resolve(values);
                }
            }
            Outcome::Rejected(rejection) => rejector.reject(rejection.clone()),
        });
    }
    combined
}

/// Fulfills with the first input to fulfill; rejects only once every input
/// has rejected, with an [`AggregateError`] holding the rejections in input
/// order. An empty list rejects immediately with [`EmptyInput`].
pub fn any<T>(promises: Vec<Promise<T>>) -> Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    if promises.is_empty() {
        return Promise::reject(Rejection::new(EmptyInput));
    }
    let exec = shared_executor(&promises);
    let (combined, resolver, rejector) = Promise::pending_on(exec);
    let failures = Arc::new(Mutex::new(Gather::new(promises.len())));
    for (index, promise) in promises.iter().enumerate() {
        let failures = failures.clone();
        let resolver = resolver.clone();
        let rejector = rejector.clone();
        promise.on_settled(move |outcome| match &*outcome {
            Outcome::Fulfilled(value) => resolver.resolve(value.clone()),
            Outcome::Rejected(rejection) => {
                let completed = failures.lock().fill(index, rejection.clone());
                if let Some(rejections) = completed {
                    rejector.reject(Rejection::new(AggregateError(rejections)));
                }
            }
        });
    }
    combined
}

/// Settles with whichever input settles first, in either direction. An
/// empty list rejects immediately with [`EmptyInput`].
pub fn race<T>(promises: Vec<Promise<T>>) -> Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    if promises.is_empty() {
        return Promise::reject(Rejection::new(EmptyInput));
    }
    let exec = shared_executor(&promises);
    let (combined, resolver, rejector) = Promise::pending_on(exec);
    for promise in &promises {
        let resolver = resolver.clone();
        let rejector = rejector.clone();
        promise.on_settled(move |outcome| match &*outcome {
            Outcome::Fulfilled(value) => resolver.resolve(value.clone()),
            Outcome::Rejected(rejection) => rejector.reject(rejection.clone()),
        });
    }
    combined
}

/// Apply `visit` to each element for its side effect, resolving with the
/// original list once every application succeeded; the first `Err` rejects.
pub fn each<T, F>(values: Vec<T>, visit: F) -> Promise<Vec<T>>
where
    T: Send + Sync + 'static,
    F: Fn(&T, usize) -> Result<(), Rejection>,
{
    for (index, value) in values.iter().enumerate() {
        if let Err(rejection) = visit(value, index) {
            return Promise::reject(rejection);
        }
    }
    Promise::resolve(values)
}

/// [`each`] with a promise-returning visitor: the applications run
/// concurrently and the result resolves to the original list once every
/// effect promise fulfills; the first rejection rejects.
pub fn each_chain<T, F>(values: Vec<T>, visit: F) -> Promise<Vec<T>>
where
    T: Send + Sync + 'static,
    F: Fn(&T, usize) -> Promise<()>,
{
    let effects: Vec<Promise<()>> = values
        .iter()
        .enumerate()
        .map(|(index, value)| visit(value, index))
        .collect();
    all(effects).then(move |_| Ok(values))
}

/// Transform each element with `transform`, fulfilling with the outputs in
/// input order; the first `Err` rejects. An empty list fulfills with an
/// empty `Vec`.
///
/// # Examples
///
/// ```
/// use promise_cell::{map, Promise};
///
/// let doubled = map(vec![1, 2, 3], |v, _| Ok(v * 2));
/// assert_eq!(doubled.wait().value(), Some(&vec![2, 4, 6]));
/// ```
pub fn map<T, U, F>(values: Vec<T>, transform: F) -> Promise<Vec<U>>
where
    U: Send + Sync + 'static,
    F: Fn(T, usize) -> Result<U, Rejection>,
{
    let mut mapped = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match transform(value, index) {
            Ok(output) => mapped.push(output),
            Err(rejection) => return Promise::reject(rejection),
        }
    }
    Promise::resolve(mapped)
}

/// [`map`] with a promise-returning transform, flattened per element: the
/// result fulfills with the outputs in input order once every element's
/// promise fulfills.
pub fn map_chain<T, U, F>(values: Vec<T>, transform: F) -> Promise<Vec<U>>
where
    U: Clone + Send + Sync + 'static,
    F: Fn(T, usize) -> Promise<U>,
{
    let mapped: Vec<Promise<U>> = values
        .into_iter()
        .enumerate()
        .map(|(index, value)| transform(value, index))
        .collect();
    all(mapped)
}

/// Keep the elements for which `keep` returns true, preserving their
/// relative order.
pub fn filter<T, F>(values: Vec<T>, keep: F) -> Promise<Vec<T>>
where
    T: Send + Sync + 'static,
    F: Fn(&T, usize) -> bool,
{
    let kept = values
        .into_iter()
        .enumerate()
        .filter(|(index, value)| keep(value, *index))
        .map(|(_, value)| value)
        .collect();
    Promise::resolve(kept)
}

/// [`filter`] with a promise-returning predicate: an element is kept once
/// its verdict promise fulfills true; relative order is preserved; the
/// first rejected verdict rejects.
pub fn filter_chain<T, F>(values: Vec<T>, keep: F) -> Promise<Vec<T>>
where
    T: Send + Sync + 'static,
    F: Fn(&T, usize) -> Promise<bool>,
{
    let verdicts: Vec<Promise<bool>> = values
        .iter()
        .enumerate()
        .map(|(index, value)| keep(value, index))
        .collect();
    all(verdicts).then(move |flags| {
        Ok(values
            .into_iter()
            .zip(flags.iter())
            .filter(|(_, keep)| **keep)
            .map(|(value, _)| value)
            .collect())
    })
}

/// A promise fulfilled with `()` once `duration` has elapsed on the default
/// executor's timer.
pub fn delay(duration: Duration) -> Promise<()> {
    delay_on(default_executor(), duration)
}

/// [`delay`] with an explicit executor.
pub fn delay_on(exec: Arc<dyn Executor>, duration: Duration) -> Promise<()> {
    let (timer, resolver, _rejector) = Promise::pending_on(exec.clone());
    exec.schedule_after(duration, Box::new(move || resolver.resolve(())));
    timer
}

/// Race `promise` against a [`TimedOut`] rejection fired after `duration`.
///
/// This is a race, not a cancellation: when the deadline wins, the input
/// keeps running to completion in the background and its settlement is
/// discarded.
pub fn timeout<T>(promise: Promise<T>, duration: Duration) -> Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    let exec = promise.executor();
    let (guarded, resolver, rejector) = Promise::pending_on(exec.clone());
    {
        let rejector = rejector.clone();
        exec.schedule_after(
            duration,
            Box::new(move || rejector.reject(Rejection::new(TimedOut(duration)))),
        );
    }
    promise.on_settled(move |outcome| match &*outcome {
        Outcome::Fulfilled(value) => resolver.resolve(value.clone()),
        Outcome::Rejected(rejection) => rejector.reject(rejection.clone()),
    });
    guarded
}
