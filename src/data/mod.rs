//! Market data: queries, aligned bar series and the provider boundary

pub mod csv_reader;
pub mod frequency;
pub mod in_memory;
pub mod query;

pub use csv_reader::{CsvBarReader, CsvFormat};
pub use frequency::Frequency;
pub use in_memory::InMemoryDataProvider;
pub use query::{Query, QueryRange};

use crate::asset::Asset;
use crate::error::{IndicatorError, Result};
use crate::types::{Bar, Price, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market-data collaborator: returns time-ordered bars for an instrument and query
pub trait DataProvider: Send + Sync {
    /// Get bars for `asset` selected by `query`, ascending by timestamp
    fn get_bars(&self, asset: &Asset, query: &Query) -> Result<Vec<Bar>>;
}

/// Fetch a query from a provider into an aligned series tagged with its source
pub fn fetch_series(provider: &dyn DataProvider, asset: &Asset, query: &Query) -> Result<BarSeries> {
    log::trace!("fetching {} {}", asset.market_code(), query);
    let bars = provider.get_bars(asset, query)?;
    Ok(BarSeries::new(bars)?.with_source(asset.clone(), query.clone()))
}

/// Field of a bar used as a raw input series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    /// Node name of the field source
    pub fn name(&self) -> &'static str {
        match self {
            PriceField::Open => "OPEN",
            PriceField::High => "HIGH",
            PriceField::Low => "LOW",
            PriceField::Close => "CLOSE",
            PriceField::Volume => "VOLUME",
        }
    }

    /// Extract the field from a bar
    pub fn value(&self, bar: &Bar) -> Price {
        match self {
            PriceField::Open => bar.open,
            PriceField::High => bar.high,
            PriceField::Low => bar.low,
            PriceField::Close => bar.close,
            PriceField::Volume => bar.volume,
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Aligned K-line: strictly time-ordered bars, optionally tagged with the
/// instrument and query they were fetched for.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BarSeries {
    asset: Option<Asset>,
    query: Option<Query>,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Build a series, rejecting bars that are not strictly ascending in time
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[0].timestamp >= w[1].timestamp)
        {
            return Err(IndicatorError::DataError(format!(
                "Bars are not strictly ascending at position {}",
                pos + 1
            )));
        }
        Ok(Self {
            asset: None,
            query: None,
            bars,
        })
    }

    /// Tag the series with its source
    pub fn with_source(mut self, asset: Asset, query: Query) -> Self {
        self.asset = Some(asset);
        self.query = Some(query);
        self
    }

    /// Number of bars
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the series has no bars
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// All bars
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Bar at a position
    pub fn get(&self, pos: usize) -> Option<&Bar> {
        self.bars.get(pos)
    }

    /// Source instrument, if fetched through a provider
    pub fn asset(&self) -> Option<&Asset> {
        self.asset.as_ref()
    }

    /// Source query, if fetched through a provider
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Timestamp axis
    pub fn timestamps(&self) -> Vec<Timestamp> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    /// Position of a timestamp, `None` when it is not on the axis
    pub fn position(&self, timestamp: Timestamp) -> Option<usize> {
        self.bars
            .binary_search_by_key(&timestamp, |b| b.timestamp)
            .ok()
    }

    /// One field as a value sequence
    pub fn field(&self, field: PriceField) -> Vec<Price> {
        self.bars.iter().map(|b| field.value(b)).collect()
    }
}
