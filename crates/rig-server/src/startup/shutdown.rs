//! Signal handling and service group lifecycle
//!
//! A `ServiceGroup` runs named members side by side. The first member to
//! return, or a shutdown signal, stops the whole group.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Shutdown signal sender and receiver
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal with a broadcast channel
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a receiver for shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Trigger shutdown. Later calls are no-ops.
    pub fn shutdown(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.sender.send(());
        }
    }

    /// Check if shutdown has been triggered
    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown is triggered, including when it already was.
    pub async fn wait(&self) {
        let mut receiver = self.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = receiver.recv().await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Trigger `shutdown` on Ctrl+C or SIGTERM.
pub fn watch_signals(shutdown: ShutdownSignal) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
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
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = shutdown.wait() => return,
        }

        shutdown.shutdown();
    });
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
///
/// Returns the shutdown signal that can be used to notify other components
pub async fn wait_for_shutdown_signal() -> ShutdownSignal {
    let shutdown = ShutdownSignal::new();
    watch_signals(shutdown.clone());
    shutdown
}

type Member = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Named futures that live and die together.
///
/// Members observe `signal()` to stop cooperatively. After the first member
/// returns, the others get `shutdown_timeout` to finish before they are aborted.
pub struct ServiceGroup {
    shutdown: ShutdownSignal,
    shutdown_timeout: Duration,
    members: Vec<(String, Member)>,
}

impl ServiceGroup {
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self {
            shutdown,
            shutdown_timeout: Duration::from_secs(10),
            members: Vec::new(),
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Signal shared by every member
    pub fn signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn add<F>(&mut self, name: impl Into<String>, member: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.members.push((name.into(), Box::pin(member)));
    }

    /// Add a member that finishes when the group shuts down.
    pub fn add_shutdown_watcher(&mut self) {
        let shutdown = self.signal();
        self.add("shutdown-watcher", async move {
            shutdown.wait().await;
            Ok(())
        });
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Run all members until the first one returns, then interrupt the rest.
    ///
    /// Returns the first member's result.
    pub async fn run(self) -> anyhow::Result<()> {
        if self.members.is_empty() {
            return Ok(());
        }

        let mut set = JoinSet::new();
        for (name, member) in self.members {
            info!(member = %name, "service started");
            set.spawn(async move { (name, member.await) });
        }

        let first = match set.join_next().await {
            Some(Ok((name, result))) => {
                match &result {
                    Ok(()) => info!(member = %name, "service stopped"),
                    Err(e) => error!(member = %name, error = %e, "service failed"),
                }
                result
            }
            Some(Err(e)) => Err(anyhow::anyhow!("service task panicked: {}", e)),
            None => Ok(()),
        };

        self.shutdown.shutdown();

        let drain = async {
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => info!(member = %name, "service interrupted"),
                    Ok((name, Err(e))) => {
                        warn!(member = %name, error = %e, "service failed during shutdown")
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => warn!("service task panicked during shutdown: {}", e),
                }
            }
        };

        if tokio::time::timeout(self.shutdown_timeout, drain).await.is_err() {
            warn!(
                "Services did not stop within {:?}, aborting",
                self.shutdown_timeout
            );
            set.abort_all();
        }

        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal() {
        let signal = ShutdownSignal::new();
        let mut rx = signal.subscribe();

        assert!(!signal.is_shutdown());

        let signal_clone = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            signal_clone.shutdown();
        });

        let result = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_ok());
        assert!(signal.is_shutdown());
    }

    #[tokio::test]
    async fn test_wait_after_shutdown_returns() {
        let signal = ShutdownSignal::new();
        signal.shutdown();
        signal.shutdown();

        let result = tokio::time::timeout(Duration::from_millis(100), signal.wait()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_group_returns_first_result_and_interrupts_others() {
        let mut group = ServiceGroup::new(ShutdownSignal::new());

        let shutdown = group.signal();
        group.add("worker", async move {
            shutdown.wait().await;
            Ok(())
        });
        group.add("failing", async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(anyhow::anyhow!("terminated"))
        });

        let signal = group.signal();
        let err = tokio::time::timeout(Duration::from_secs(1), group.run())
            .await
            .unwrap()
            .unwrap_err();

        assert_eq!(err.to_string(), "terminated");
        assert!(signal.is_shutdown());
    }

    #[tokio::test]
    async fn test_group_stops_on_external_shutdown() {
        let signal = ShutdownSignal::new();
        let mut group = ServiceGroup::new(signal.clone());
        group.add_shutdown_watcher();
        group.add("idle", async {
            std::future::pending::<()>().await;
            Ok(())
        });

        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.shutdown();
        });

        // The idle member ignores the signal and is aborted after the timeout
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            group.with_shutdown_timeout(Duration::from_millis(50)).run(),
        )
        .await
        .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_empty_group() {
        let group = ServiceGroup::new(ShutdownSignal::new());
        assert!(group.is_empty());
        assert!(group.run().await.is_ok());
    }
}
