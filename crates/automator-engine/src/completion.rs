//! Completion handle
//!
//! A [`CompletionHandle`] represents "all iterations finished". Awaiting it
//! yields the last iteration callback's value. A run that is killed,
//! superseded, or faulted never resolves its handle; use
//! [`CompletionHandle::outcome`] to find out how a run ended.

use automator_core::{RunId, Value};
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::AutomatorError;

/// How a run's driver exited
#[derive(Debug)]
pub(crate) enum RunEnd {
    Completed(Value),
    Killed,
}

/// How a run ended, as reported by [`CompletionHandle::outcome`]
#[derive(Debug)]
pub enum RunOutcome {
    /// Every iteration ran; carries the value the handle resolved with
    Completed(Value),
    /// The kill latch stopped the run, or a newer run superseded it
    Killed,
    /// A handler or configuration fault stopped the run
    Faulted(AutomatorError),
}

impl RunOutcome {
    /// Value of a completed run
    pub fn completed(self) -> Option<Value> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Awaitable completion of one `automate` call
pub struct CompletionHandle {
    run_id: RunId,
    value_rx: Option<oneshot::Receiver<Value>>,
    driver: JoinHandle<Result<RunEnd, AutomatorError>>,
}

impl CompletionHandle {
    pub(crate) fn new(
        run_id: RunId,
        value_rx: oneshot::Receiver<Value>,
        driver: JoinHandle<Result<RunEnd, AutomatorError>>,
    ) -> Self {
        Self {
            run_id,
            value_rx: Some(value_rx),
            driver,
        }
    }

    /// Run this handle belongs to
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Whether the run's driver has exited, for any reason
    pub fn is_finished(&self) -> bool {
        self.driver.is_finished()
    }

    /// Wait for the driver to exit and report how the run ended
    ///
    /// Unlike awaiting the handle itself, this always returns once the driver
    /// stops. A killed run only stops at its next step boundary.
    pub async fn outcome(self) -> RunOutcome {
        match self.driver.await {
            Ok(Ok(RunEnd::Completed(value))) => RunOutcome::Completed(value),
            Ok(Ok(RunEnd::Killed)) => RunOutcome::Killed,
            Ok(Err(error)) => RunOutcome::Faulted(error),
            Err(join_error) => RunOutcome::Faulted(AutomatorError::Panicked(join_error.to_string())),
        }
    }
}

impl Future for CompletionHandle {
    type Output = Value;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(rx) = self.value_rx.as_mut() else {
            return Poll::Pending;
        };

        match rx.poll_unpin(cx) {
            Poll::Ready(Ok(value)) => {
                self.value_rx = None;
                Poll::Ready(value)
            }
            // The driver dropped its sender without resolving: stay pending forever
            Poll::Ready(Err(_)) => {
                self.value_rx = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("run_id", &self.run_id)
            .field("finished", &self.driver.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolves_with_sent_value() {
        let (tx, rx) = oneshot::channel();
        let driver = tokio::spawn(async move {
            let _ = tx.send(json!("final"));
            Ok(RunEnd::Completed(json!("final")))
        });

        let handle = CompletionHandle::new(RunId::new(), rx, driver);
        assert_eq!(handle.await, json!("final"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_resolves_when_sender_dropped() {
        let (tx, rx) = oneshot::channel::<Value>();
        let driver = tokio::spawn(async move {
            drop(tx);
            Ok(RunEnd::Killed)
        });

        let handle = CompletionHandle::new(RunId::new(), rx, driver);
        let waited = tokio::time::timeout(Duration::from_secs(3600), handle).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_outcome_reports_fault() {
        let (_tx, rx) = oneshot::channel::<Value>();
        let driver = tokio::spawn(async move { Err(AutomatorError::NoRuntime) });

        let handle = CompletionHandle::new(RunId::new(), rx, driver);
        assert!(matches!(
            handle.outcome().await,
            RunOutcome::Faulted(AutomatorError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn test_outcome_reports_panic() {
        let (_tx, rx) = oneshot::channel::<Value>();
        let driver = tokio::spawn(async move {
            if true {
                panic!("handler blew up");
            }
            Ok(RunEnd::Killed)
        });

        let handle = CompletionHandle::new(RunId::new(), rx, driver);
        assert!(matches!(
            handle.outcome().await,
            RunOutcome::Faulted(AutomatorError::Panicked(_))
        ));
    }
}
