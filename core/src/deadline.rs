//! Per-call deadline enforcement.
//!
//! # Design
//! `Deadline::derive` makes a child of the caller's context whose deadline is
//! the earlier of the parent's and `now + timeout`. `run` races a future
//! against that deadline and against cancellation. On expiry the child token
//! is cancelled, so a transport watching `CallContext::done()` can stop, and
//! the future itself is dropped. The child token sits behind a `DropGuard`,
//! so dropping the `Deadline` releases it on every exit path.
//!
//! Cancellation of the transport's own work is still cooperative. Dropping
//! the future returns control to the caller on time, but a transport that
//! parks an OS thread keeps that thread busy until its own timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::DropGuard;

use crate::context::CallContext;
use crate::error::TransportError;

// Stand-in expiry for timeouts past what `Instant` can represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Why `Deadline::run` gave up on its future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    TimedOut(Duration),
    Cancelled,
}

impl From<Interrupt> for TransportError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::TimedOut(after) => TransportError::TimedOut(after),
            Interrupt::Cancelled => TransportError::Cancelled,
        }
    }
}

/// Time-bounded child context for a single call.
#[derive(Debug)]
pub struct Deadline {
    ctx: CallContext,
    expires_at: Instant,
    budget: Duration,
    _guard: DropGuard,
}

impl Deadline {
    pub fn derive(parent: &CallContext, timeout: Duration) -> Self {
        let now = Instant::now();
        let requested = now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE);
        let expires_at = parent
            .deadline()
            .map_or(requested, |inherited| inherited.min(requested));
        let ctx = parent.with_deadline(expires_at);
        let guard = ctx.token().clone().drop_guard();
        Self {
            ctx,
            expires_at,
            budget: expires_at.saturating_duration_since(now),
            _guard: guard,
        }
    }

    /// The derived context to hand to the transport.
    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Run `fut` until it finishes, the deadline passes, or the context is
    /// cancelled, whichever comes first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.ctx.token().cancelled() => Err(Interrupt::Cancelled),
            _ = sleep_until(self.expires_at) => {
                self.ctx.cancel();
                Err(Interrupt::TimedOut(self.budget))
            }
            out = fut => Ok(out),
        }
    }
}
