// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! Propagates a shutdown request from the signal handler to the
//! orchestrator. The orchestrator consults the token between stages and
//! races it against the running stage subprocess; the recorded signal
//! decides the process exit code (130 vs 143).
//!
//! ## Usage
//!
//! ```rust
//! use subtitle_pipeline_bootstrap::shutdown::ShutdownCoordinator;
//! use subtitle_pipeline_bootstrap::signals::ShutdownSignal;
//!
//! # async fn example() {
//! let coordinator = ShutdownCoordinator::new();
//! let token = coordinator.token();
//!
//! tokio::spawn(async move {
//!     token.cancelled().await;
//!     // stop accepting work
//! });
//!
//! coordinator.request_shutdown(ShutdownSignal::Interrupt);
//! # }
//! ```

use crate::signals::ShutdownSignal;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cancellation token for signaling shutdown
///
/// Lightweight clone-able token that can be passed to async tasks.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    signal: Arc<AtomicI32>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            signal: Arc::new(AtomicI32::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    fn cancel(&self, signal: ShutdownSignal) {
        self.signal.store(signal.as_raw(), Ordering::SeqCst);
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Check if cancelled (non-blocking)
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The signal that triggered cancellation, if any.
    pub fn signal(&self) -> Option<ShutdownSignal> {
        match self.signal.load(Ordering::SeqCst) {
            2 => Some(ShutdownSignal::Interrupt),
            15 => Some(ShutdownSignal::Terminate),
            _ => None,
        }
    }

    /// Wait for cancellation (async)
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Shutdown coordinator owned by the process entry point.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token handed to the orchestrator and any supervised tasks.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Records the signal and wakes every waiter. Idempotent; the first
    /// signal wins so a SIGTERM arriving after Ctrl+C cannot rewrite the
    /// exit code.
    pub fn request_shutdown(&self, signal: ShutdownSignal) {
        if !self.token.is_cancelled() {
            self.token.cancel(signal);
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
