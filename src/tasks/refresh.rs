//! Registry Refresh Task
//!
//! Background task that keeps the content type registry in step with the
//! store's catalog.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::registry::ContentTypeRegistry;
use crate::store::MemoryStore;

/// Spawns a task that refreshes `registry` from `store` every
/// `interval_secs` seconds (at least one).
///
/// The store lock is taken before the registry lock, the same order the
/// request handlers use.
///
/// # Example
/// ```ignore
/// let handle = spawn_registry_refresh_task(state.store.clone(), state.registry.clone(), 60);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_registry_refresh_task(
    store: Arc<RwLock<MemoryStore>>,
    registry: Arc<RwLock<ContentTypeRegistry>>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval_secs = interval_secs.max(1);
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting registry refresh task with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let result = {
                let store_guard = store.read().await;
                let mut registry_guard = registry.write().await;
                registry_guard.refresh(&*store_guard)
            };

            match result {
                Ok(count) => debug!("Registry refresh: {} content types", count),
                Err(e) => warn!("Registry refresh failed: {}", e),
            }
        }
    })
}
