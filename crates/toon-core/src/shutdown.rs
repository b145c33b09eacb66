//! Graceful Shutdown
//!
//! Push sessions hold connections open indefinitely, so they watch a child
//! token of the controller and end their streams once it is cancelled.
//!
//! ## Usage
//!
//! ```ignore
//! let shutdown = ShutdownController::new();
//!
//! // Each push session gets a child token
//! let session = PushSession::open(&bus, &config, shutdown.token());
//!
//! // Ends every open stream
//! shutdown.shutdown();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shutdown controller for coordinating graceful shutdown
#[derive(Debug)]
pub struct ShutdownController {
    /// Parent of every session token
    cancel_token: CancellationToken,
    /// Whether shutdown has been initiated
    shutdown_initiated: AtomicBool,
}

impl ShutdownController {
    /// Create a new shutdown controller
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cancel_token: CancellationToken::new(),
            shutdown_initiated: AtomicBool::new(false),
        })
    }

    /// Get a cancellation token for a component
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Check if shutdown has been initiated
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is initiated
    pub async fn cancelled(&self) {
        self.cancel_token.cancelled().await;
    }

    /// Initiate shutdown, cancelling every token handed out. Idempotent.
    pub fn shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Shutdown already initiated");
            return;
        }

        info!("Initiating graceful shutdown, closing push streams");
        self.cancel_token.cancel();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

/// Create a shutdown signal future that integrates with ShutdownController
pub async fn shutdown_signal_with_controller(controller: Arc<ShutdownController>) {
    tokio::select! {
        _ = wait_for_shutdown_signal() => controller.shutdown(),
        _ = controller.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_cancels_tokens() {
        let controller = ShutdownController::new();
        let token = controller.token();

        assert!(!controller.is_shutting_down());
        assert!(!token.is_cancelled());

        controller.shutdown();

        assert!(controller.is_shutting_down());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_token_after_shutdown_is_cancelled() {
        let controller = ShutdownController::new();
        controller.shutdown();
        assert!(controller.token().is_cancelled());
    }

    #[test]
    fn test_double_shutdown() {
        let controller = ShutdownController::new();
        controller.shutdown();
        controller.shutdown();
        assert!(controller.is_shutting_down());
    }

    #[tokio::test]
    async fn test_signal_future_returns_on_programmatic_shutdown() {
        let controller = ShutdownController::new();
        let waiter = tokio::spawn(shutdown_signal_with_controller(controller.clone()));

        controller.shutdown();

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("signal future should resolve")
            .unwrap();
    }
}
