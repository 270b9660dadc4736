//! In-memory market data provider

use super::{DataProvider, Frequency, Query};
use crate::asset::Asset;
use crate::error::{IndicatorError, Result};
use crate::types::Bar;
use hashbrown::HashMap;

/// Provider backed by bars held in memory, keyed by market code and frequency
#[derive(Debug, Default, Clone)]
pub struct InMemoryDataProvider {
    assets: HashMap<String, Asset>,
    bars: HashMap<(String, Frequency), Vec<Bar>>,
}

impl InMemoryDataProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset without bars
    pub fn add_asset(&mut self, asset: Asset) {
        self.assets.entry(asset.market_code()).or_insert(asset);
    }

    /// Add one bar; an existing bar with the same timestamp is replaced
    pub fn add_bar(&mut self, asset: &Asset, frequency: Frequency, bar: Bar) {
        self.add_bars(asset, frequency, vec![bar]);
    }

    /// Add bars in any order; the stored series stays sorted and unique by timestamp
    pub fn add_bars(&mut self, asset: &Asset, frequency: Frequency, bars: Vec<Bar>) {
        self.add_asset(asset.clone());
        let series = self
            .bars
            .entry((asset.market_code(), frequency))
            .or_default();
        // later bars win on duplicate timestamps
        let mut incoming = bars;
        incoming.extend(series.drain(..));
        incoming.sort_by_key(|b| b.timestamp);
        incoming.dedup_by_key(|b| b.timestamp);
        *series = incoming;
    }

    /// Registered assets
    pub fn assets(&self) -> Vec<Asset> {
        self.assets.values().cloned().collect()
    }

    /// Look up an asset by market code
    pub fn asset(&self, market_code: &str) -> Option<&Asset> {
        self.assets.get(&market_code.to_uppercase())
    }

    /// Total number of bars stored for an asset at a frequency
    pub fn bar_count(&self, asset: &Asset, frequency: Frequency) -> usize {
        self.bars
            .get(&(asset.market_code(), frequency))
            .map(|b| b.len())
            .unwrap_or(0)
    }
}

impl DataProvider for InMemoryDataProvider {
    fn get_bars(&self, asset: &Asset, query: &Query) -> Result<Vec<Bar>> {
        let key = (asset.market_code(), query.frequency);
        let bars = self.bars.get(&key).ok_or_else(|| {
            IndicatorError::DataError(format!(
                "No {} data for {}",
                query.frequency,
                asset.market_code()
            ))
        })?;
        Ok(query.select(bars).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(day: i64, close: f64) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day);
        Bar::new(ts, close, close, close, close, 1.0)
    }

    #[test]
    fn test_add_and_query() {
        let asset = Asset::stock("SH", "600000");
        let mut provider = InMemoryDataProvider::new();
        provider.add_bars(&asset, Frequency::Daily, vec![bar(2, 3.0), bar(0, 1.0), bar(1, 2.0)]);

        let bars = provider.get_bars(&asset, &Query::all()).unwrap();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
        assert_eq!(provider.bar_count(&asset, Frequency::Daily), 3);
    }

    #[test]
    fn test_duplicate_timestamp_replaced() {
        let asset = Asset::stock("SH", "600000");
        let mut provider = InMemoryDataProvider::new();
        provider.add_bar(&asset, Frequency::Daily, bar(0, 1.0));
        provider.add_bar(&asset, Frequency::Daily, bar(0, 9.0));

        let bars = provider.get_bars(&asset, &Query::all()).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 9.0);
    }

    #[test]
    fn test_unknown_asset_or_frequency() {
        let asset = Asset::stock("SH", "600000");
        let mut provider = InMemoryDataProvider::new();
        provider.add_bar(&asset, Frequency::Daily, bar(0, 1.0));

        let other = Asset::stock("SZ", "000001");
        assert!(provider.get_bars(&other, &Query::all()).is_err());
        let weekly = Query::all().with_frequency(Frequency::Weekly);
        assert!(provider.get_bars(&asset, &weekly).is_err());
        assert!(provider.asset("sh600000").is_some());
    }
}
