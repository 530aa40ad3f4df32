//! A write-suppressing wrapper used for `sync --dry-run`.

use crate::{RemoteTerm, RemoteTermService, ServiceResult, TermPayload};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Reads from the wrapped service but only logs writes.
///
/// Creates hand out `dry-run://<n>` locations so children of new terms still resolve
/// their parent.
pub struct DryRunService {
    inner: Arc<dyn RemoteTermService>,
    next_location: AtomicUsize,
}

impl DryRunService {
    pub fn new(inner: Arc<dyn RemoteTermService>) -> Self {
        Self {
            inner,
            next_location: AtomicUsize::new(1),
        }
    }
}

#[async_trait]
impl RemoteTermService for DryRunService {
    async fn list_all(&self) -> ServiceResult<Vec<RemoteTerm>> {
        self.inner.list_all().await
    }

    async fn create(&self, payload: &TermPayload) -> ServiceResult<String> {
        let n = self.next_location.fetch_add(1, Ordering::SeqCst);
        let location = format!("dry-run://{n}");
        info!(
            "[dry run] would create {} under {}",
            payload.name,
            payload.parent_id.as_deref().unwrap_or("<root>")
        );
        Ok(location)
    }

    async fn update(&self, location: &str, payload: &TermPayload) -> ServiceResult<String> {
        info!("[dry run] would update {} at {}", payload.name, location);
        Ok(location.to_string())
    }

    async fn delete(&self, location: &str) -> ServiceResult<bool> {
        info!("[dry run] would delete {}", location);
        Ok(true)
    }
}
