//! Provider rebind.
//!
//! Renames a provider id everywhere it is referenced, in one transaction.
//! Running the inverse rebind restores the previous state exactly.

use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use quotesync_market_data::ProviderRegistry;

use super::store::ProviderSettingsStore;
use crate::errors::{Error, Result};

/// Rows touched by a rebind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebindSummary {
    pub old_id: String,
    pub new_id: String,
    pub assets_updated: usize,
    pub quotes_updated: usize,
}

/// Storage side of a rebind.
#[async_trait]
pub trait ProviderRebindStore: Send + Sync {
    /// In one transaction: rename the provider row, then every asset and
    /// quote whose `data_source` is `old_id`.
    ///
    /// Fails with [`Error::MigrationConflict`] and changes nothing when the
    /// old row is missing, the new id is taken, or any reference to `old_id`
    /// remains after the updates.
    async fn rebind_provider(&self, old_id: &str, new_id: &str) -> Result<RebindSummary>;
}

pub struct RebindManager {
    store: Arc<dyn ProviderRebindStore>,
    settings_store: Arc<dyn ProviderSettingsStore>,
    registry: Arc<ProviderRegistry>,
    /// Held exclusively while rebinding so no sync writes under the old id.
    sync_gate: Arc<RwLock<()>>,
}

impl RebindManager {
    pub fn new(
        store: Arc<dyn ProviderRebindStore>,
        settings_store: Arc<dyn ProviderSettingsStore>,
        registry: Arc<ProviderRegistry>,
        sync_gate: Arc<RwLock<()>>,
    ) -> Self {
        Self {
            store,
            settings_store,
            registry,
            sync_gate,
        }
    }

    pub async fn rebind(&self, old_id: &str, new_id: &str) -> Result<RebindSummary> {
        let (old_id, new_id) = (old_id.trim(), new_id.trim());
        if old_id.is_empty() || new_id.is_empty() {
            return Err(Error::MigrationConflict(
                "provider ids must not be empty".to_string(),
            ));
        }
        if old_id == new_id {
            return Err(Error::MigrationConflict(format!(
                "cannot rebind {} onto itself",
                old_id
            )));
        }

        let _exclusive = self.sync_gate.write().await;
        let summary = match self.store.rebind_provider(old_id, new_id).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Rebind {} -> {} rolled back: {}", old_id, new_id, e);
                return Err(e);
            }
        };
        info!(
            "Rebound provider {} -> {} ({} assets, {} quotes)",
            old_id, new_id, summary.assets_updated, summary.quotes_updated
        );

        let settings = self.settings_store.get_all_providers()?;
        self.registry.reload(&settings)?;
        Ok(summary)
    }
}
