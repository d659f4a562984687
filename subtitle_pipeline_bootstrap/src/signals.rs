//! # System Signal Handling
//!
//! Cross-platform signal handling for graceful shutdown.
//!
//! ## Supported Signals
//!
//! - **SIGTERM** (15) - Graceful shutdown request
//! - **SIGINT** (2) - User interrupt (Ctrl+C)
//!
//! The orchestrator needs to know *which* signal arrived: SIGINT maps to
//! exit 130 and SIGTERM to 143, and the same signal is forwarded once to
//! the running stage subprocess before the grace period starts.

use std::future::Future;
use std::pin::Pin;

/// The shutdown-relevant signals, in a platform-neutral shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    /// The raw Unix signal number to forward to child processes.
    pub fn as_raw(&self) -> i32 {
        match self {
            ShutdownSignal::Interrupt => 2,
            ShutdownSignal::Terminate => 15,
        }
    }
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// System signal handling trait
///
/// Abstracts platform-specific signal handling so tests can drive shutdown
/// without delivering real signals.
pub trait SystemSignals: Send + Sync {
    /// Wait for a shutdown signal and report which one arrived.
    fn wait_for_signal(&self) -> Pin<Box<dyn Future<Output = ShutdownSignal> + Send + '_>>;
}

/// Unix signal handler implementation
///
/// Handles SIGTERM and SIGINT using tokio::signal.
#[cfg(unix)]
pub struct UnixSignalHandler;

#[cfg(unix)]
impl UnixSignalHandler {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl Default for UnixSignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl SystemSignals for UnixSignalHandler {
    fn wait_for_signal(&self) -> Pin<Box<dyn Future<Output = ShutdownSignal> + Send + '_>> {
        Box::pin(async move {
            use tokio::signal::unix::{signal, SignalKind};

            // Registration failures here mean the runtime is unusable;
            // surfacing a ShutdownSignal would mask that.
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("failed to register SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("failed to register SIGINT handler: {}", e);
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    ShutdownSignal::Terminate
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                    ShutdownSignal::Interrupt
                }
            }
        })
    }
}

/// No-op signal handler for testing
///
/// Never receives signals, allowing tests to control shutdown explicitly.
pub struct NoOpSignalHandler;

impl NoOpSignalHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoOpSignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSignals for NoOpSignalHandler {
    fn wait_for_signal(&self) -> Pin<Box<dyn Future<Output = ShutdownSignal> + Send + '_>> {
        Box::pin(async move {
            std::future::pending::<()>().await;
            unreachable!()
        })
    }
}

/// Create the platform signal handler.
pub fn create_signal_handler() -> Box<dyn SystemSignals> {
    #[cfg(unix)]
    {
        Box::new(UnixSignalHandler::new())
    }

    #[cfg(not(unix))]
    {
        Box::new(NoOpSignalHandler::new())
    }
}
