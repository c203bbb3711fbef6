use super::types::AssetType;

/// The instrument a caller wants data for.
///
/// Borrowed view over an asset row; carries just what provider selection and
/// the adapters need.
#[derive(Clone, Copy, Debug)]
pub struct InstrumentRef<'a> {
    /// Canonical symbol as stored on the asset (e.g. "FPT.VN", "AAPL", "VESAF").
    pub symbol: &'a str,
    pub asset_type: AssetType,
    /// Currency hint for providers that do not report one.
    pub currency: &'a str,
    /// Provider explicitly assigned to the asset, if any.
    pub data_source: Option<&'a str>,
}

impl<'a> InstrumentRef<'a> {
    pub fn new(symbol: &'a str, asset_type: AssetType, currency: &'a str) -> Self {
        Self {
            symbol,
            asset_type,
            currency,
            data_source: None,
        }
    }

    pub fn with_data_source(mut self, data_source: Option<&'a str>) -> Self {
        self.data_source = data_source;
        self
    }
}
