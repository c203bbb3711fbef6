use quotesync_market_data::{AssetProfile, AssetType};

use super::assets_model::{Asset, NewAsset, NewManualAsset};
use crate::errors::Result;

/// Trait defining the contract for Asset service operations.
#[async_trait::async_trait]
pub trait AssetServiceTrait: Send + Sync {
    fn get_assets(&self) -> Result<Vec<Asset>>;
    fn get_asset_by_id(&self, asset_id: &str) -> Result<Asset>;
    /// Creates (or returns the existing) asset for a search hit. The provider
    /// that answered the search becomes the data source.
    async fn create_asset_from_search(&self, profile: AssetProfile) -> Result<Asset>;
    /// Creates a user-maintained asset owned by the manual provider.
    async fn create_manual_asset(&self, new_asset: NewManualAsset) -> Result<Asset>;
    /// Moves an asset to another provider. The provider must be enabled and
    /// serve the asset's type.
    async fn reassign_provider(&self, asset_id: &str, provider_id: &str) -> Result<Asset>;
}

/// Trait defining the contract for Asset repository operations.
#[async_trait::async_trait]
pub trait AssetRepositoryTrait: Send + Sync {
    async fn create(&self, new_asset: NewAsset) -> Result<Asset>;
    async fn update_data_source(&self, asset_id: &str, data_source: &str) -> Result<Asset>;
    fn get_by_id(&self, asset_id: &str) -> Result<Asset>;
    fn find_by_symbol(&self, symbol: &str, asset_type: AssetType) -> Result<Option<Asset>>;
    fn list(&self) -> Result<Vec<Asset>>;
    fn list_by_asset_ids(&self, asset_ids: &[String]) -> Result<Vec<Asset>>;
}
