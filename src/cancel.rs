//! Cancellation plumbing wired from SIGINT/SIGTERM, replacing the original's
//! `context.WithCancel` goroutine with a `tokio::sync::watch`-backed flag
//! that every blocking call can select against.

use tokio::sync::watch;

#[derive(Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

pub struct CancellationHandle {
    tx: watch::Sender<bool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Cancellation {
    pub fn new() -> (CancellationHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancellationHandle { tx }, Self { rx })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested. Intended for use in
    /// `tokio::select!` alongside a unit of blocking work.
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        let _ = self.rx.changed().await;
    }
}

/// Spawns the SIGINT/SIGTERM listener and returns the receiver side used by
/// the orchestrator. Mirrors `original_source/main.go`'s signal goroutine.
pub fn install_signal_handler() -> Cancellation {
    let (handle, cancellation) = Cancellation::new();
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(sig) => sig,
            Err(_) => return,
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, stopping");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, stopping");
            }
        }
        handle.cancel();
    });
    cancellation
}
