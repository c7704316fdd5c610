//! Cooperative shutdown shared by the HTTP server and the purge worker.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Cloneable shutdown flag. Triggering it once is observed by every clone.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn trigger(&self, reason: &'static str) {
        let first = self.tx.send_if_modified(|triggered| {
            if *triggered {
                false
            } else {
                *triggered = true;
                true
            }
        });
        if first {
            info!(reason, "shutdown initiated");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once `trigger` has been called on any clone.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so `wait_for` only errors after drop.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve on SIGINT or SIGTERM.
pub async fn os_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "signal received"),
        _ = terminate => info!(signal = "SIGTERM", "signal received"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn trigger_wakes_every_clone() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();

        let handle = tokio::spawn(async move { waiter.wait().await });
        shutdown.trigger("test");

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter resolves")
            .expect("task joins");
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_triggered() {
        let shutdown = Shutdown::new();
        shutdown.trigger("test");
        shutdown.trigger("again");

        tokio::time::timeout(Duration::from_millis(100), shutdown.wait())
            .await
            .expect("already triggered");
    }
}
