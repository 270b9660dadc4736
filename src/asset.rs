//! Instrument identity used to bind indicators to market data

use crate::error::{IndicatorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssetType {
    /// Common stock
    #[default]
    Stock,
    /// Market index
    Index,
    /// Exchange traded fund
    Fund,
    /// Futures contract
    Future,
    /// Cryptocurrency
    Crypto,
}

/// Tradable instrument, identified by market and code (e.g. `SH` + `600000`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// Market / exchange identifier, upper case
    pub market: String,
    /// Instrument code within the market
    pub code: String,
    /// Type of instrument
    pub asset_type: AssetType,
    /// Display name
    pub name: Option<String>,
}

impl Asset {
    /// Create a new asset
    pub fn new(market: impl Into<String>, code: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            market: market.into().to_uppercase(),
            code: code.into(),
            asset_type,
            name: None,
        }
    }

    /// Create a stock
    pub fn stock(market: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(market, code, AssetType::Stock)
    }

    /// Attach a display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Market code key, market followed by code (`SH600000`)
    pub fn market_code(&self) -> String {
        format!("{}{}", self.market, self.code)
    }
}

/// Split a market code such as `SH600000` into its market and code parts.
///
/// The market is the leading run of ASCII letters; the remainder is the code.
pub fn parse_market_code(s: &str) -> Result<(String, String)> {
    let split = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (market, code) = s.split_at(split);
    if market.is_empty() || code.is_empty() {
        return Err(IndicatorError::ParseError(format!(
            "Invalid market code: '{}'",
            s
        )));
    }
    Ok((market.to_uppercase(), code.to_string()))
}

impl FromStr for Asset {
    type Err = IndicatorError;

    fn from_str(s: &str) -> Result<Self> {
        let (market, code) = parse_market_code(s.trim())?;
        Ok(Asset::stock(market, code))
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}({})", self.market_code(), name),
            None => write!(f, "{}", self.market_code()),
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetType::Stock => write!(f, "Stock"),
            AssetType::Index => write!(f, "Index"),
            AssetType::Fund => write!(f, "Fund"),
            AssetType::Future => write!(f, "Future"),
            AssetType::Crypto => write!(f, "Crypto"),
        }
    }
}
