//! Scoped-cleanup guards for staging directories and pods: an explicit
//! `.dispose().await` on the normal exit path plus a best-effort `Drop`
//! fallback (fire-and-forget) so cleanup still runs if a phase aborts
//! before reaching its dispose call. Replaces the original's bare `defer`.

use crate::cluster::ClusterClient;
use crate::staging::{StagingHandle, TransferStaging};
use std::sync::Arc;

pub struct PodGuard {
    client: Arc<dyn ClusterClient>,
    name: String,
    disposed: bool,
}

impl PodGuard {
    pub fn new(client: Arc<dyn ClusterClient>, name: String) -> Self {
        Self {
            client,
            name,
            disposed: false,
        }
    }

    pub async fn dispose(mut self) {
        self.disposed = true;
        if let Err(err) = self.client.delete_pod(&self.name).await {
            tracing::warn!(pod = %self.name, error = %err, "cleanup: failed to delete pod");
        }
    }
}

impl Drop for PodGuard {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        let client = self.client.clone();
        let name = self.name.clone();
        tokio::spawn(async move {
            if let Err(err) = client.delete_pod(&name).await {
                tracing::warn!(pod = %name, error = %err, "cleanup: failed to delete pod (drop path)");
            }
        });
    }
}

pub struct StagingGuard {
    staging: Arc<TransferStaging>,
    handle: Option<StagingHandle>,
}

impl StagingGuard {
    pub fn new(staging: Arc<TransferStaging>, handle: StagingHandle) -> Self {
        Self {
            staging,
            handle: Some(handle),
        }
    }

    pub fn handle(&self) -> &StagingHandle {
        self.handle.as_ref().expect("handle disposed")
    }

    pub fn dispose(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = self.staging.dispose(&handle) {
                tracing::warn!(path = %handle.root().display(), error = %err, "cleanup: failed to remove staging directory");
            }
        }
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = self.staging.dispose(&handle) {
                tracing::warn!(path = %handle.root().display(), error = %err, "cleanup: failed to remove staging directory (drop path)");
            }
        }
    }
}
