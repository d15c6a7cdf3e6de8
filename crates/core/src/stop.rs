// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative cancellation.
//!
//! [`StopToken`] is the cross-task cancellation signal; [`StopContext`]
//! installs one as an ambient, task-local binding so deeply nested
//! collaborators (a workload, a collector) can observe it without a
//! `stop_token` parameter threaded through every call.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How often the sentinel file is polled when one is configured.
const STOP_FILE_POLL_INTERVAL: Duration = Duration::from_millis(500);

struct Inner {
    requested: AtomicBool,
    stop_file_path: Option<PathBuf>,
    cancellation: CancellationToken,
}

/// A cross-task cancellation signal, optionally backed by a sentinel file.
///
/// Cheap to clone (an `Arc` handle). `request_stop` is idempotent; there is
/// no way to clear a token back to unrequested — call [`StopToken::reset`]
/// to obtain a fresh one instead.
#[derive(Clone)]
pub struct StopToken {
    inner: Arc<Inner>,
}

impl StopToken {
    /// A token with no sentinel file; only `request_stop` can trigger it.
    pub fn new() -> Self {
        Self::with_stop_file(None)
    }

    /// A token whose `should_stop` also polls `stop_file_path` for existence.
    pub fn with_stop_file(stop_file_path: Option<PathBuf>) -> Self {
        let token = Self {
            inner: Arc::new(Inner {
                requested: AtomicBool::new(false),
                stop_file_path,
                cancellation: CancellationToken::new(),
            }),
        };
        if token.inner.stop_file_path.is_some() {
            token.spawn_sentinel_poller();
        }
        token
    }

    fn spawn_sentinel_poller(&self) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                let Some(inner) = weak.upgrade() else { return };
                if inner.cancellation.is_cancelled() {
                    return;
                }
                if let Some(path) = &inner.stop_file_path {
                    if path.exists() {
                        inner.requested.store(true, Ordering::SeqCst);
                        inner.cancellation.cancel();
                        return;
                    }
                }
                drop(inner);
                tokio::time::sleep(STOP_FILE_POLL_INTERVAL).await;
            }
        });
    }

    /// Idempotently latch `requested = true`.
    pub fn request_stop(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.cancellation.cancel();
    }

    /// Non-blocking check: explicit request, or sentinel file present.
    pub fn should_stop(&self) -> bool {
        if self.inner.requested.load(Ordering::SeqCst) {
            return true;
        }
        if let Some(path) = &self.inner.stop_file_path {
            if path.exists() {
                self.inner.requested.store(true, Ordering::SeqCst);
                self.inner.cancellation.cancel();
                return true;
            }
        }
        false
    }

    /// Suspend until `should_stop()` would return true.
    pub async fn wait(&self) {
        self.inner.cancellation.cancelled().await;
    }

    /// Race `fut` against cancellation. Returns `Err(StopRequested)` if the
    /// token fires first; this is the primitive every cancellation point
    /// (sleeps, subprocess waits, stream poll gaps) is built on.
    pub async fn race<F, T>(&self, fut: F) -> Result<T, StopRequested>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.inner.cancellation.cancelled() => Err(StopRequested),
            out = fut => Ok(out),
        }
    }

    /// Cancellation-aware sleep: returns `Err(StopRequested)` if stopped first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), StopRequested> {
        self.race(tokio::time::sleep(duration)).await
    }

    /// A fresh, un-requested token. Existing tokens are never mutated back
    /// to unrequested — callers that need to "clear" a stop must replace
    /// their handle with the result of this.
    pub fn reset(&self) -> Self {
        Self::with_stop_file(self.inner.stop_file_path.clone())
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative-cancellation error: a suspension point observed `should_stop()`.
///
/// Not logged as an error — callers match on this variant specifically to
/// short-circuit without `tracing::error!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stop requested")]
pub struct StopRequested;

tokio::task_local! {
    static ACTIVE_STOP_TOKEN: StopToken;
}

/// Installs the ambient, run-scoped [`StopToken`] binding.
pub struct StopContext;

impl StopContext {
    /// Run `fut` with `token` bound as the ambient stop token for every
    /// collaborator on this task (and tasks spawned from within it that
    /// re-enter the same `task_local` scope). Nested runs are not
    /// supported: calling this while already inside a scope panics.
    pub async fn enter<F: Future>(token: StopToken, fut: F) -> F::Output {
        assert!(
            ACTIVE_STOP_TOKEN.try_with(|_| ()).is_err(),
            "StopContext::enter called while a run is already active on this task; \
             nested runs are not supported"
        );
        ACTIVE_STOP_TOKEN.scope(token, fut).await
    }

    /// Fetch the ambient stop token. Panics if called outside `enter`.
    pub fn current() -> StopToken {
        ACTIVE_STOP_TOKEN.with(|t| t.clone())
    }

    /// Fetch the ambient stop token, or `None` if no run is active.
    pub fn try_current() -> Option<StopToken> {
        ACTIVE_STOP_TOKEN.try_with(|t| t.clone()).ok()
    }
}

#[cfg(test)]
#[path = "stop_tests.rs"]
mod tests;
