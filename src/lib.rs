//! # Rusty-Indicator
//!
//! A composable technical-indicator evaluation engine for financial time series.
//!
//! Indicators are lazily evaluated computation nodes bound to market data.
//! They combine algebraically into new nodes, and whole expressions can be
//! captured as [`Operand`](operand::Operand) trees and re-applied to other
//! inputs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rusty_indicator::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let mut provider = InMemoryDataProvider::new();
//! CsvBarReader::new().load_into("bars.csv".as_ref(), &mut provider, Frequency::Daily)?;
//!
//! let asset: Asset = "SH600000".parse()?;
//! let spread = Indicator::high() - Indicator::low();
//! spread.set_context(&provider, &asset, &Query::last(30))?;
//! println!("{}", spread);
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod data;
pub mod error;
pub mod indicator;
pub mod operand;
pub mod param;
pub mod types;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::asset::{Asset, AssetType};
    pub use crate::data::{
        BarSeries, CsvBarReader, DataProvider, Frequency, InMemoryDataProvider, PriceField, Query,
    };
    pub use crate::error::{IndicatorError, Result};
    pub use crate::indicator::compose::*;
    pub use crate::indicator::{
        BinOp, Formula, FormulaInput, FormulaOutput, FormulaRegistry, Indicator, NodeState,
        PrintOptions,
    };
    pub use crate::operand::Operand;
    pub use crate::param::{ParamValue, Parameters};
    pub use crate::types::*;
}
