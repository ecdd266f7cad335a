//! Per-request cancellation, deadline and trace context.

use std::future::Future;
use std::time::Duration;

use opentelemetry::Context;
use opentelemetry::trace::{TraceContextExt, TraceId};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a request context ended before the work it guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelReason {
    #[error("request cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Cancels every context derived from the one it was created with.
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Context carried by one request through every stage.
///
/// Cloning is cheap; clones and children observe the same cancellation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
    trace: Context,
}

impl RequestContext {
    /// A context with no deadline that is never cancelled.
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancel: None,
            trace: Context::new(),
        }
    }

    /// A context that ends when the returned [`Canceller`] fires.
    pub fn cancellable() -> (Self, Canceller) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            cancel: Some(rx),
            ..Self::background()
        };
        (ctx, Canceller { tx })
    }

    /// Sets the deadline, keeping an earlier existing one.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets the OpenTelemetry context spans started for this request are
    /// parented on.
    pub fn with_trace(mut self, trace: Context) -> Self {
        self.trace = trace;
        self
    }

    /// A sub-context for one bounded piece of work.
    ///
    /// Its deadline is the earlier of the parent's and `now + budget`; it
    /// is cancelled with the parent and shares its trace.
    pub fn child(&self, budget: Duration) -> Self {
        self.clone().with_timeout(budget)
    }

    pub fn trace(&self) -> &Context {
        &self.trace
    }

    /// Trace id of the request, all zeros when it carries no span.
    pub fn trace_id(&self) -> TraceId {
        self.trace.span().span_context().trace_id()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns the reason if the context has already ended.
    pub fn check(&self) -> Result<(), CancelReason> {
        if self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Err(CancelReason::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(CancelReason::DeadlineExceeded);
        }
        Ok(())
    }

    /// Completes when the context is cancelled or its deadline passes.
    ///
    /// Never completes for a background context.
    pub async fn done(&self) -> CancelReason {
        let deadline = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(deadline).await;
                    CancelReason::DeadlineExceeded
                }
                None => std::future::pending().await,
            }
        };

        let cancelled = async {
            if let Some(rx) = &self.cancel {
                let mut rx = rx.clone();
                let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
                if fired {
                    return CancelReason::Cancelled;
                }
            }
            // The canceller was dropped without firing.
            std::future::pending().await
        };

        tokio::select! {
            reason = deadline => reason,
            reason = cancelled => reason,
        }
    }

    /// Runs `fut` unless the context ends first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, CancelReason>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            reason = self.done() => Err(reason),
            output = fut => Ok(output),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}
