//! `std::future::Future` adapter for the promise handle, so a promise can
//! be awaited on any async executor. The waker is registered as an ordinary
//! continuation; the adapter introduces no extra copy of the outcome.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::cell::Outcome;
use crate::promise::Promise;

impl<T: Send + Sync + 'static> Future for Promise<T> {
    type Output = Arc<Outcome<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.outcome() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                // If the cell settles between the check above and this
                // registration, the waker is scheduled immediately and the
                // next poll observes the outcome.
                let waker = cx.waker().clone();
                self.on_settled(move |_| waker.wake());
                Poll::Pending
            }
        }
    }
}
