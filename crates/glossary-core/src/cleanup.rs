//! Removal of previously published terms recorded in a location map.

use crate::{LocationEntry, LocationMap, RemoteTermService};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct CleanupFailure {
    pub id: String,
    pub location: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<LocationEntry>,
    pub failed: Vec<CleanupFailure>,
}

/// Deletes every mapped term, newest first so children go before their parents.
///
/// Deleted entries are removed from `map`; whatever remains can be persisted and retried.
pub async fn delete_published(
    map: &mut LocationMap,
    service: &dyn RemoteTermService,
) -> CleanupReport {
    let mut report = CleanupReport::default();
    let entries: Vec<LocationEntry> = map.entries().iter().rev().cloned().collect();

    for entry in entries {
        match service.delete(&entry.location).await {
            Ok(true) => {
                info!("Deleted {}", entry.location);
                map.remove(&entry.id);
                report.deleted.push(entry);
            }
            Ok(false) => {
                warn!("Catalog did not delete {}", entry.location);
                report.failed.push(CleanupFailure {
                    id: entry.id,
                    location: entry.location,
                    error: "term was not deleted".to_string(),
                });
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", entry.location, e);
                report.failed.push(CleanupFailure {
                    id: entry.id,
                    location: entry.location,
                    error: e.to_string(),
                });
            }
        }
    }

    report
}
