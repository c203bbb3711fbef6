//! Assets module - tracked instruments and their owning data source.

mod assets_model;
mod assets_service;
mod assets_traits;

pub use assets_model::{Asset, NewAsset, NewManualAsset};
pub use assets_service::AssetService;
pub use assets_traits::{AssetRepositoryTrait, AssetServiceTrait};
