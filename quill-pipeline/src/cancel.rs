//! Cancellation and deadlines for a pipeline run.
//!
//! A [`CancelToken`] is checked between stages and raced against every
//! suspending call with [`CancelToken::run`], so an in-flight generator call
//! is dropped as soon as the caller cancels or the deadline passes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::PipelineFailure;

/// Why a run was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// [`CancelHandle::cancel`] was called.
    Cancelled,
    /// The token's deadline passed.
    DeadlineExceeded,
}

impl From<Interrupted> for PipelineFailure {
    fn from(i: Interrupted) -> Self {
        match i {
            Interrupted::Cancelled => PipelineFailure::Cancelled,
            Interrupted::DeadlineExceeded => PipelineFailure::DeadlineExceeded,
        }
    }
}

/// Caller side: cancels every token cloned from its pair.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Cancel the run.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Pipeline side: observed between stages and around suspending calls.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A handle/token pair with no deadline.
    #[must_use]
    pub fn pair() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx: Arc::new(tx) },
            CancelToken { rx, deadline: None },
        )
    }

    /// A token that is never cancelled and has no deadline.
    #[must_use]
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx, deadline: None }
    }

    /// Builder: interrupt at `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Builder: interrupt `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Whether the caller has cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Fail fast if the run should stop.
    ///
    /// # Errors
    ///
    /// The matching [`Interrupted`] reason.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Interrupted::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` unless the run is cancelled or its deadline passes first.
    ///
    /// # Errors
    ///
    /// The matching [`Interrupted`] reason; `fut` is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        self.check()?;
        let mut rx = self.rx.clone();
        let cancelled = async move {
            loop {
                if rx.changed().await.is_err() {
                    // Sender gone: nobody can cancel any more.
                    std::future::pending::<()>().await;
                }
                if *rx.borrow() {
                    return;
                }
            }
        };
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Err(Interrupted::Cancelled),
            () = deadline => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}
