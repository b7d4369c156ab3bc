// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! Manages graceful shutdown across application components: a clone-able
//! cancellation token propagates the signal, and the coordinator enforces
//! the drain grace period. Shutdown can be initiated from the signal
//! handler or from the admin `/shutdown` endpoint; initiation is
//! idempotent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Default grace period for graceful shutdown.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Cancellation token for signaling shutdown.
///
/// Lightweight clone-able token that can be handed to async tasks; tasks
/// `select!` on [`CancellationToken::cancelled`] against their work.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Cancel this token, waking all waiters.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Check if cancelled (non-blocking).
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for cancellation.
    pub async fn cancelled(&self) {
        loop {
            // Register the waiter before re-checking the flag so a cancel
            // between check and await cannot be missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Coordinates shutdown initiation and the drain grace period.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    grace_period: Duration,
    initiated: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace_period,
            initiated: AtomicBool::new(false),
        }
    }

    /// Token for worker tasks and servers.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Begin shutdown. Safe to call multiple times; only the first call
    /// has an effect.
    pub fn initiate_shutdown(&self) {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!(grace_secs = self.grace_period.as_secs(), "shutdown initiated");
            self.token.cancel();
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Waits until shutdown has been initiated.
    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_wakes_waiters() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let token = coordinator.token();

        let waiter = tokio::spawn(async move {
            token.cancelled().await;
            true
        });

        coordinator.initiate_shutdown();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn cancel_before_wait_returns_immediately() {
        let coordinator = ShutdownCoordinator::default();
        coordinator.initiate_shutdown();
        // Must not hang even though cancellation happened first.
        coordinator.token().cancelled().await;
        assert!(coordinator.is_shutting_down());
    }

    #[tokio::test]
    async fn initiation_is_idempotent() {
        let coordinator = ShutdownCoordinator::default();
        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();
        assert!(coordinator.is_shutting_down());
    }
}
