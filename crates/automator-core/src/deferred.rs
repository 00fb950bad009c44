//! Deferred results
//!
//! A [`Deferred`] is the async-result abstraction handlers return when their
//! work completes later. It settles exactly once, either with a value or with
//! a [`HandlerError`], and can be chained with [`Deferred::then`] and
//! [`Deferred::map`]. Any `Send` future can be wrapped with [`Deferred::new`],
//! so the engine does not care which async machinery produced it.

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::HandlerError;

/// Settlement of a deferred result
pub type DeferredResult = Result<Value, HandlerError>;

/// A result that settles later
pub struct Deferred {
    inner: BoxFuture<'static, DeferredResult>,
}

impl Deferred {
    /// Wrap a future
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = DeferredResult> + Send + 'static,
    {
        Self { inner: fut.boxed() }
    }

    /// An already-resolved result
    pub fn ready(value: Value) -> Self {
        Self::new(future::ready(Ok(value)))
    }

    /// An already-failed result
    pub fn rejected(error: HandlerError) -> Self {
        Self::new(future::ready(Err(error)))
    }

    /// Chain another deferred onto a successful settlement
    ///
    /// Failures skip `f` and propagate unchanged.
    pub fn then<F>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> Deferred + Send + 'static,
    {
        Self::new(async move {
            let value = self.inner.await?;
            f(value).await
        })
    }

    /// Transform a successful settlement
    pub fn map<F>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> Value + Send + 'static,
    {
        Self::new(self.inner.map(|result| result.map(f)))
    }

    /// Wait for settlement
    pub async fn settle(self) -> DeferredResult {
        self.inner.await
    }
}

impl Future for Deferred {
    type Output = DeferredResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

impl From<Value> for Deferred {
    fn from(value: Value) -> Self {
        Self::ready(value)
    }
}

/// Settling side of a [`pair`]
#[derive(Debug)]
pub struct Resolver {
    tx: oneshot::Sender<DeferredResult>,
}

impl Resolver {
    /// Resolve with a value
    ///
    /// Returns `false` if the deferred side was already dropped.
    pub fn resolve(self, value: Value) -> bool {
        self.tx.send(Ok(value)).is_ok()
    }

    /// Reject with an error
    pub fn reject(self, error: HandlerError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

/// Create a linked resolver and deferred result
///
/// Dropping the [`Resolver`] without settling rejects the deferred with
/// [`HandlerError::Abandoned`].
pub fn pair() -> (Resolver, Deferred) {
    let (tx, rx) = oneshot::channel();
    let deferred = Deferred::new(async move {
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(HandlerError::Abandoned),
        }
    });
    (Resolver { tx }, deferred)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ready_and_rejected() {
        let value = tokio_test::block_on(Deferred::ready(json!(1)).settle());
        assert_eq!(value, Ok(json!(1)));

        let failed = tokio_test::block_on(Deferred::rejected(HandlerError::failed("boom")));
        assert_eq!(failed, Err(HandlerError::failed("boom")));
    }

    #[test]
    fn test_then_and_map_chain() {
        let chained = Deferred::ready(json!(2))
            .then(|v| Deferred::ready(json!(v.as_i64().unwrap() + 3)))
            .map(|v| json!(v.as_i64().unwrap() * 10));

        assert_eq!(tokio_test::block_on(chained), Ok(json!(50)));
    }

    #[test]
    fn test_then_skips_on_failure() {
        let chained = Deferred::rejected(HandlerError::failed("nope"))
            .then(|_| panic!("must not run after a failure"));

        assert_eq!(
            tokio_test::block_on(chained),
            Err(HandlerError::failed("nope"))
        );
    }

    #[tokio::test]
    async fn test_pair_resolves_across_tasks() {
        let (resolver, deferred) = pair();

        tokio::spawn(async move {
            assert!(resolver.resolve(json!("done")));
        });

        assert_eq!(deferred.await, Ok(json!("done")));
    }

    #[tokio::test]
    async fn test_pair_dropped_resolver_abandons() {
        let (resolver, deferred) = pair();
        drop(resolver);

        assert_eq!(deferred.settle().await, Err(HandlerError::Abandoned));
    }

    #[tokio::test]
    async fn test_pair_reject() {
        let (resolver, deferred) = pair();
        assert!(resolver.reject(HandlerError::failed("timeout")));
        assert_eq!(deferred.await, Err(HandlerError::failed("timeout")));
    }
}
