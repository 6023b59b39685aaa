//! Process lifecycle: fatal-fault handling and graceful shutdown.
//!
//! A panic is logged and ends the process at once. A supervised background
//! task that fails asks the listener to drain first, and the caller then
//! exits with a failure status. SIGINT and SIGTERM drain and exit cleanly.

use std::future::Future;
use std::panic;
use tokio::signal;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT or SIGTERM
    Signal,
    /// A supervised task failed
    Fatal,
}

/// Log the panic, then terminate with status 1
pub fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "Unrecoverable fault, shutting down");
        eprintln!("{}", info);
        std::process::exit(1);
    }));
}

/// Shared shutdown trigger. The first reason recorded wins.
#[derive(Clone)]
pub struct Shutdown {
    tx: watch::Sender<Option<ShutdownReason>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn trigger(&self, reason: ShutdownReason) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }

    /// Resolves once shutdown has been triggered
    #[allow(clippy::let_and_return)]
    pub async fn wait(&self) -> ShutdownReason {
        let mut rx = self.tx.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(reason) => reason.unwrap_or(ShutdownReason::Signal),
            // The sender lives in `self`, so the channel cannot close here
            Err(_) => ShutdownReason::Signal,
        };
        // The borrow guard must drop before `rx`
        reason
    }

    /// Run a background task whose failure is fatal to the process
    pub fn spawn_supervised<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let shutdown = self.clone();
        tokio::spawn(async move {
            match task.await {
                Ok(()) => tracing::debug!(task = name, "Background task finished"),
                Err(e) => {
                    tracing::error!(task = name, error = ?e, "Background task failed, shutting down");
                    shutdown.trigger(ShutdownReason::Fatal);
                }
            }
        });
    }

    /// Trigger shutdown on SIGINT or SIGTERM
    pub fn listen_for_signals(&self) {
        let shutdown = self.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            shutdown.trigger(ShutdownReason::Signal);
        });
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
