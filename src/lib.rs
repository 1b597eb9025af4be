//! Single-settlement promise cells with chained continuations and
//! combinators.
//!
//! A [`Promise`] is a shared handle to one eventual outcome. A producer
//! settles it exactly once, fulfilled with a value or rejected with a
//! type-erased [`Rejection`], from any thread; later attempts are silent
//! no-ops. Consumers compose transformations with [`Promise::then`],
//! [`Promise::chain`] (flattening), and [`Promise::fail`], and combine
//! collections with [`all`], [`any`], [`race`], [`each`], [`map`],
//! [`filter`], [`delay`], and [`timeout`].
//!
//! Continuations never run on the stack that settles a cell or the stack
//! that attaches them: they are posted to an [`Executor`], which keeps
//! stack depth bounded for long chains and gives every callback the same
//! re-entrancy model. Production code uses the worker-thread default;
//! tests drive a [`ManualExecutor`] by hand for deterministic ordering.
//!
//! # Examples
//!
//! ```
//! use promise_cell::Promise;
//! use std::thread;
//!
//! let (promise, resolver, _rejector) = Promise::pending();
//! let doubled = promise.then(|value| Ok(value * 2));
//!
//! thread::spawn(move || resolver.resolve(21));
//! assert_eq!(doubled.wait().value(), Some(&42));
//! ```

pub mod cell;
pub mod combine;
pub mod executor;
mod future;
pub mod promise;
pub mod rejection;

pub use cell::Outcome;
pub use combine::{
    all, any, delay, delay_on, each, each_chain, filter, filter_chain, map, map_chain, race,
    timeout,
};
pub use executor::{default_executor, Executor, ManualExecutor, Task, ThreadExecutor};
pub use promise::{Promise, Rejector, Resolver};
pub use rejection::{Abandoned, AggregateError, EmptyInput, Rejection, TimedOut};
