//! The rejection side of a settlement: a type-erased, shareable error
//! carrier plus the error types the crate itself produces.
//!
//! A [`Rejection`] captures an arbitrary payload exactly once and is then
//! propagated through chains by cloning the inner `Arc`, so an unhandled
//! rejection crosses any number of `then` hops without copying the payload.

use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Uniform carrier for the payload of a rejected promise.
///
/// Any `Any + Send + Sync` value can be captured. Capture takes the payload
/// by value (a move, or one explicit clone at the call site); every
/// propagation after that is a reference-count bump.
///
/// # Examples
///
/// ```
/// use promise_cell::Rejection;
///
/// let rejection = Rejection::new("out of strawberries");
/// assert!(rejection.is::<&str>());
/// assert_eq!(rejection.downcast_ref::<&str>(), Some(&"out of strawberries"));
///
/// let passed_along = rejection.clone();
/// assert!(passed_along.same(&rejection));
/// ```
#[derive(Clone)]
pub struct Rejection {
    payload: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Rejection {
    /// Capture a payload. This is the single copy/move the carrier ever
    /// performs on it.
    pub fn new<E: Any + Send + Sync>(payload: E) -> Self {
        Self {
            payload: Arc::new(payload),
            type_name: any::type_name::<E>(),
        }
    }

    /// Whether the captured payload is of type `E`.
    pub fn is<E: Any>(&self) -> bool {
        self.payload.is::<E>()
    }

    /// Borrow the payload as `E`, if that is what was captured.
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// Name of the payload's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether two carriers share the same captured payload.
    ///
    /// A rejection handler that re-rejects with a clone of the rejection it
    /// received keeps this identity, which is how "re-raised" errors stay
    /// distinguishable from freshly captured ones.
    pub fn same(&self, other: &Rejection) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rejection").field(&self.type_name).finish()
    }
}

/// The producer side was dropped, a handler panicked, or an upstream cell
/// was destroyed before this promise could settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("promise abandoned before settlement")]
pub struct Abandoned;

/// Every input to [`any`](crate::any) rejected; holds the individual
/// rejections in input order.
#[derive(Debug, Clone, Error)]
#[error("all input promises rejected")]
pub struct AggregateError(pub Vec<Rejection>);

/// [`any`](crate::any) or [`race`](crate::race) was given an empty list, so
/// no settlement can ever arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no input promise can settle")]
pub struct EmptyInput;

/// A [`timeout`](crate::timeout) deadline elapsed before the input settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("promise timed out after {0:?}")]
pub struct TimedOut(pub Duration);
