use log::{debug, info};
use std::sync::Arc;
use tokio::sync::RwLock;

use quotesync_market_data::{AssetProfile, AssetType, InstrumentRef, ProviderRegistry};

use super::assets_model::{Asset, NewAsset, NewManualAsset};
use super::assets_traits::{AssetRepositoryTrait, AssetServiceTrait};
use crate::errors::{Error, Result};

/// Service for managing assets
pub struct AssetService {
    asset_repository: Arc<dyn AssetRepositoryTrait>,
    registry: Arc<ProviderRegistry>,
    /// The quote service's gate; held for reading from the provider check
    /// to the write so a rebind cannot land in between.
    sync_gate: Arc<RwLock<()>>,
}

impl AssetService {
    pub fn new(
        asset_repository: Arc<dyn AssetRepositoryTrait>,
        registry: Arc<ProviderRegistry>,
        sync_gate: Arc<RwLock<()>>,
    ) -> Self {
        Self {
            asset_repository,
            registry,
            sync_gate,
        }
    }

    /// Every data source must name an enabled provider that serves the type.
    fn check_assignment(&self, provider_id: &str, asset_type: AssetType) -> Result<()> {
        self.registry
            .check_assignment(provider_id, asset_type)
            .map_err(|e| Error::InvalidProviderAssignment(e.to_string()))
    }
}

#[async_trait::async_trait]
impl AssetServiceTrait for AssetService {
    fn get_assets(&self) -> Result<Vec<Asset>> {
        self.asset_repository.list()
    }

    fn get_asset_by_id(&self, asset_id: &str) -> Result<Asset> {
        self.asset_repository.get_by_id(asset_id)
    }

    async fn create_asset_from_search(&self, profile: AssetProfile) -> Result<Asset> {
        let new_asset = NewAsset::from_profile(&profile);
        new_asset.validate()?;

        let _gate = self.sync_gate.read().await;
        if let Some(existing) = self
            .asset_repository
            .find_by_symbol(&new_asset.symbol, new_asset.asset_type)?
        {
            debug!(
                "Asset {} already tracked as {}",
                new_asset.symbol, existing.id
            );
            return Ok(existing);
        }

        self.check_assignment(&new_asset.data_source, new_asset.asset_type)?;
        let asset = self.asset_repository.create(new_asset).await?;
        info!(
            "Created asset {} ({}) owned by {}",
            asset.symbol, asset.id, asset.data_source
        );
        Ok(asset)
    }

    async fn create_manual_asset(&self, input: NewManualAsset) -> Result<Asset> {
        let symbol = input.symbol.trim().to_uppercase();
        let currency = input.currency.trim().to_uppercase();

        let _gate = self.sync_gate.read().await;
        let owner = self
            .registry
            .resolve(&InstrumentRef::new(&symbol, AssetType::Manual, &currency))
            .ok_or_else(|| {
                Error::InvalidProviderAssignment(
                    "no enabled provider serves MANUAL assets".to_string(),
                )
            })?;

        if self
            .asset_repository
            .find_by_symbol(&symbol, AssetType::Manual)?
            .is_some()
        {
            return Err(Error::Asset(format!(
                "Manual asset {} already exists",
                symbol
            )));
        }

        let new_asset = NewAsset {
            id: None,
            symbol,
            name: input.name,
            asset_type: AssetType::Manual,
            currency,
            exchange: None,
            data_source: owner.id,
            metadata: input.metadata,
        };
        new_asset.validate()?;
        self.asset_repository.create(new_asset).await
    }

    async fn reassign_provider(&self, asset_id: &str, provider_id: &str) -> Result<Asset> {
        let _gate = self.sync_gate.read().await;
        let asset = self.asset_repository.get_by_id(asset_id)?;
        self.check_assignment(provider_id, asset.asset_type)?;
        if asset.data_source == provider_id {
            return Ok(asset);
        }

        let updated = self
            .asset_repository
            .update_data_source(asset_id, provider_id)
            .await?;
        info!(
            "Asset {} reassigned from {} to {}",
            asset_id, asset.data_source, provider_id
        );
        Ok(updated)
    }
}
