//! The public promise handle and its continuation engine.
//!
//! A [`Promise`] is a shared, cloneable reference to one settlement cell.
//! The producer side is the [`Resolver`]/[`Rejector`] pair handed out by the
//! factories; whichever settles first wins and every later attempt is a
//! silent no-op. Consumers compose transformations with [`then`], [`chain`],
//! [`fail`], and [`then_or`], or observe the raw settlement with
//! [`on_settled`], [`wait`], and the `Future` adapter.
//!
//! [`then`]: Promise::then
//! [`chain`]: Promise::chain
//! [`fail`]: Promise::fail
//! [`then_or`]: Promise::then_or
//! [`on_settled`]: Promise::on_settled
//! [`wait`]: Promise::wait

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cell::{Inner, Outcome};
use crate::executor::{default_executor, Executor};
use crate::rejection::{Abandoned, Rejection};

/// Internal settlement handle for one cell. Owned by the producer pair or
/// by a continuation closure; if it is dropped while the cell is still
/// pending (producer gone, upstream destroyed, handler panicked) the cell
/// is rejected with [`Abandoned`] so nothing downstream hangs forever.
pub(crate) struct Settler<T: Send + Sync + 'static> {
    cell: Arc<Inner<T>>,
    exec: Arc<dyn Executor>,
}

impl<T: Send + Sync + 'static> Settler<T> {
    fn fulfill(&self, value: T) {
        self.cell.settle(&self.exec, Arc::new(Outcome::Fulfilled(value)));
    }

    fn reject(&self, rejection: Rejection) {
        self.cell.settle(&self.exec, Arc::new(Outcome::Rejected(rejection)));
    }

    /// Settle with an outcome produced elsewhere, sharing it instead of
    /// copying it. This is what makes pass-through hops and chain
    /// flattening free.
    fn forward(&self, outcome: Arc<Outcome<T>>) {
        self.cell.settle(&self.exec, outcome);
    }
}

impl<T: Send + Sync + 'static> Drop for Settler<T> {
    fn drop(&mut self) {
        if self.cell.poll().is_none() {
            self.cell
                .settle(&self.exec, Arc::new(Outcome::Rejected(Rejection::new(Abandoned))));
        }
    }
}

/// The fulfilling half of a producer pair. Cloneable; every clone settles
/// the same cell and only the first settlement (through any clone of either
/// half) takes effect.
pub struct Resolver<T: Send + Sync + 'static> {
    settler: Arc<Settler<T>>,
}

impl<T: Send + Sync + 'static> Resolver<T> {
    /// Fulfill the promise. No-op if the cell already settled.
    pub fn resolve(&self, value: T) {
        self.settler.fulfill(value);
    }
}

impl<T: Send + Sync + 'static> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            settler: self.settler.clone(),
        }
    }
}

/// The rejecting half of a producer pair.
pub struct Rejector<T: Send + Sync + 'static> {
    settler: Arc<Settler<T>>,
}

impl<T: Send + Sync + 'static> Rejector<T> {
    /// Reject the promise. No-op if the cell already settled.
    pub fn reject(&self, rejection: Rejection) {
        self.settler.reject(rejection);
    }
}

impl<T: Send + Sync + 'static> Clone for Rejector<T> {
    fn clone(&self) -> Self {
        Self {
            settler: self.settler.clone(),
        }
    }
}

/// A shared handle to one eventual outcome.
///
/// Cloning shares the cell; it never copies the value. A promise may be
/// settled from any thread and observed from any thread.
///
/// # Examples
///
/// ```
/// use promise_cell::Promise;
/// use std::thread;
///
/// let promise = Promise::new(|resolver, _rejector| {
///     thread::spawn(move || resolver.resolve(String::from("🍓")));
/// });
/// assert_eq!(promise.wait().value().map(String::as_str), Some("🍓"));
/// ```
pub struct Promise<T> {
    pub(crate) cell: Arc<Inner<T>>,
    pub(crate) exec: Arc<dyn Executor>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            exec: self.exec.clone(),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Promise({})", self.cell.status())
    }
}

impl<T: Send + Sync + 'static> Promise<T> {
    /// Create a promise and hand its producer pair to `producer`, which may
    /// settle immediately, later, or from another thread.
    pub fn new<F>(producer: F) -> Self
    where
        F: FnOnce(Resolver<T>, Rejector<T>),
    {
        Self::new_on(default_executor(), producer)
    }

    /// [`new`](Self::new) with an explicit executor.
    pub fn new_on<F>(exec: Arc<dyn Executor>, producer: F) -> Self
    where
        F: FnOnce(Resolver<T>, Rejector<T>),
    {
        let (promise, resolver, rejector) = Self::pending_on(exec);
        producer(resolver, rejector);
        promise
    }

    /// A pending promise plus its producer pair.
    pub fn pending() -> (Self, Resolver<T>, Rejector<T>) {
        Self::pending_on(default_executor())
    }

    /// [`pending`](Self::pending) with an explicit executor.
    pub fn pending_on(exec: Arc<dyn Executor>) -> (Self, Resolver<T>, Rejector<T>) {
        let cell = Arc::new(Inner::new());
        let settler = Arc::new(Settler {
            cell: cell.clone(),
            exec: exec.clone(),
        });
        let promise = Self { cell, exec };
        let resolver = Resolver {
            settler: settler.clone(),
        };
        let rejector = Rejector { settler };
        (promise, resolver, rejector)
    }

    /// An already-fulfilled promise. The value is moved into the cell.
    pub fn resolve(value: T) -> Self {
        Self::resolve_on(default_executor(), value)
    }

    /// [`resolve`](Self::resolve) with an explicit executor.
    pub fn resolve_on(exec: Arc<dyn Executor>, value: T) -> Self {
        Self {
            cell: Arc::new(Inner::settled(Outcome::Fulfilled(value))),
            exec,
        }
    }

    /// An already-rejected promise.
    pub fn reject(rejection: Rejection) -> Self {
        Self::reject_on(default_executor(), rejection)
    }

    /// [`reject`](Self::reject) with an explicit executor.
    pub fn reject_on(exec: Arc<dyn Executor>, rejection: Rejection) -> Self {
        Self {
            cell: Arc::new(Inner::settled(Outcome::Rejected(rejection))),
            exec,
        }
    }

    /// The executor this promise schedules its continuations on.
    /// Downstream promises created by `then`/`chain`/`fail` inherit it.
    pub fn executor(&self) -> Arc<dyn Executor> {
        self.exec.clone()
    }

    fn downstream<U: Send + Sync + 'static>(&self) -> (Promise<U>, Settler<U>) {
        let cell = Arc::new(Inner::new());
        let settler = Settler {
            cell: cell.clone(),
            exec: self.exec.clone(),
        };
        (
            Promise {
                cell,
                exec: self.exec.clone(),
            },
            settler,
        )
    }

    /// Attach a fulfillment transformation.
    ///
    /// `Ok` fulfills the returned promise with the mapped value; `Err`
    /// rejects it. An upstream rejection is passed through untouched (the
    /// carrier is shared, never copied).
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_cell::Promise;
    ///
    /// let promise = Promise::resolve(2).then(|v| Ok(v * 10)).then(|v| Ok(v + 5));
    /// assert_eq!(promise.wait().value(), Some(&25));
    /// ```
    pub fn then<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Result<U, Rejection> + Send + 'static,
    {
        let (downstream, settler) = self.downstream::<U>();
        self.cell.subscribe(
            &self.exec,
            Box::new(move |outcome| match &*outcome {
                Outcome::Fulfilled(value) => match on_fulfilled(value) {
                    Ok(mapped) => settler.fulfill(mapped),
                    Err(rejection) => settler.reject(rejection),
                },
                Outcome::Rejected(rejection) => settler.reject(rejection.clone()),
            }),
        );
        downstream
    }

    /// Attach a transformation that returns another promise, flattening its
    /// eventual settlement into the returned promise.
    ///
    /// The inner promise's outcome is forwarded as-is, so a chained hop
    /// costs no copy of the value.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_cell::Promise;
    ///
    /// let promise = Promise::resolve(42).chain(|v| Promise::resolve(v + 2));
    /// assert_eq!(promise.wait().value(), Some(&44));
    /// ```
    pub fn chain<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Promise<U> + Send + 'static,
    {
        let (downstream, settler) = self.downstream::<U>();
        self.cell.subscribe(
            &self.exec,
            Box::new(move |outcome| match &*outcome {
                Outcome::Fulfilled(value) => {
                    let inner = on_fulfilled(value);
                    inner.cell.subscribe(
                        &inner.exec,
                        Box::new(move |inner_outcome| settler.forward(inner_outcome)),
                    );
                }
                Outcome::Rejected(rejection) => settler.reject(rejection.clone()),
            }),
        );
        downstream
    }

    /// Attach a rejection handler: recover with `Ok` or re-reject with
    /// `Err`. Re-rejecting with a clone of the received rejection keeps the
    /// original carrier, so a re-raise costs nothing.
    ///
    /// An upstream fulfillment is forwarded unchanged, sharing the settled
    /// outcome rather than copying the value.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_cell::{Promise, Rejection};
    ///
    /// let promise: Promise<i32> = Promise::reject(Rejection::new("boom"));
    /// let recovered = promise.fail(|_| Ok(0));
    /// assert_eq!(recovered.wait().value(), Some(&0));
    /// ```
    pub fn fail<F>(&self, on_rejected: F) -> Promise<T>
    where
        F: FnOnce(&Rejection) -> Result<T, Rejection> + Send + 'static,
    {
        let (downstream, settler) = self.downstream::<T>();
        self.cell.subscribe(
            &self.exec,
            Box::new(move |outcome| match &*outcome {
                Outcome::Fulfilled(_) => settler.forward(Arc::clone(&outcome)),
                Outcome::Rejected(rejection) => match on_rejected(rejection) {
                    Ok(recovered) => settler.fulfill(recovered),
                    Err(rejection) => settler.reject(rejection),
                },
            }),
        );
        downstream
    }

    /// The two-handler form: one transformation per settlement direction.
    pub fn then_or<U, F, G>(&self, on_fulfilled: F, on_rejected: G) -> Promise<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Result<U, Rejection> + Send + 'static,
        G: FnOnce(&Rejection) -> Result<U, Rejection> + Send + 'static,
    {
        let (downstream, settler) = self.downstream::<U>();
        self.cell.subscribe(
            &self.exec,
            Box::new(move |outcome| {
                let settled = match &*outcome {
                    Outcome::Fulfilled(value) => on_fulfilled(value),
                    Outcome::Rejected(rejection) => on_rejected(rejection),
                };
                match settled {
                    Ok(mapped) => settler.fulfill(mapped),
                    Err(rejection) => settler.reject(rejection),
                }
            }),
        );
        downstream
    }

    /// Attach a raw observer. It receives the shared outcome once, via the
    /// executor, in attachment order relative to other continuations on
    /// this cell. The combinators are built on this.
    pub fn on_settled<F>(&self, observer: F)
    where
        F: FnOnce(Arc<Outcome<T>>) + Send + 'static,
    {
        self.cell.subscribe(&self.exec, Box::new(observer));
    }

    /// The outcome, if this promise has settled.
    pub fn outcome(&self) -> Option<Arc<Outcome<T>>> {
        self.cell.poll()
    }

    /// Block the calling thread until this promise settles.
    pub fn wait(&self) -> Arc<Outcome<T>> {
        self.cell.wait()
    }

    /// Block until this promise settles or `timeout` elapses.
    pub fn wait_for(&self, timeout: Duration) -> Option<Arc<Outcome<T>>> {
        self.cell.wait_for(timeout)
    }

    pub fn is_pending(&self) -> bool {
        self.outcome().is_none()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.outcome().map_or(false, |outcome| outcome.is_fulfilled())
    }

    pub fn is_rejected(&self) -> bool {
        self.outcome().map_or(false, |outcome| outcome.is_rejected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ManualExecutor;
    use parking_lot::Mutex;

    #[test]
    fn handlers_never_run_on_the_settling_stack() {
        let exec = Arc::new(ManualExecutor::new());
        let (promise, resolver, _rejector) = Promise::pending_on(exec.clone());
        let observed = Arc::new(Mutex::new(false));
        let sink = observed.clone();
        promise.on_settled(move |_| *sink.lock() = true);

        resolver.resolve(1);
        assert!(!*observed.lock());
        exec.run();
        assert!(*observed.lock());
    }

    #[test]
    fn clones_share_the_same_cell() {
        let exec = Arc::new(ManualExecutor::new());
        let (promise, resolver, _rejector) = Promise::pending_on(exec.clone());
        let alias = promise.clone();
        resolver.resolve("shared");
        exec.run();
        assert_eq!(alias.outcome().unwrap().value(), Some(&"shared"));
        assert_eq!(promise.outcome().unwrap().value(), Some(&"shared"));
    }

    #[test]
    fn debug_reports_settlement_state() {
        let exec = Arc::new(ManualExecutor::new());
        let (promise, resolver, _rejector) = Promise::pending_on(exec.clone());
        assert_eq!(format!("{promise:?}"), "Promise(pending)");
        resolver.resolve(());
        assert_eq!(format!("{promise:?}"), "Promise(fulfilled)");
        let rejected: Promise<()> = Promise::reject_on(exec.clone(), Rejection::new("no"));
        assert_eq!(format!("{rejected:?}"), "Promise(rejected)");
    }
}
