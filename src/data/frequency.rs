//! Bar period of a market-data query

use crate::error::{IndicatorError, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Period covered by a single bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// One bar per trading day
    #[default]
    Daily,
    /// One bar per week
    Weekly,
    /// One bar per month
    Monthly,
    /// One bar per minute
    Minute,
    /// One bar per five minutes
    Minute5,
    /// One bar per fifteen minutes
    Minute15,
    /// One bar per thirty minutes
    Minute30,
    /// One bar per hour
    Minute60,
}

impl Frequency {
    /// Nominal duration of one bar
    pub fn duration(&self) -> Duration {
        match self {
            Frequency::Daily => Duration::days(1),
            Frequency::Weekly => Duration::weeks(1),
            Frequency::Monthly => Duration::days(30),
            Frequency::Minute => Duration::minutes(1),
            Frequency::Minute5 => Duration::minutes(5),
            Frequency::Minute15 => Duration::minutes(15),
            Frequency::Minute30 => Duration::minutes(30),
            Frequency::Minute60 => Duration::minutes(60),
        }
    }

    /// Whether bars are intraday
    pub fn is_intraday(&self) -> bool {
        !matches!(
            self,
            Frequency::Daily | Frequency::Weekly | Frequency::Monthly
        )
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Minute => "minute",
            Frequency::Minute5 => "minute5",
            Frequency::Minute15 => "minute15",
            Frequency::Minute30 => "minute30",
            Frequency::Minute60 => "minute60",
        }
    }
}

impl FromStr for Frequency {
    type Err = IndicatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "daily" | "day" | "d" | "1d" => Ok(Frequency::Daily),
            "weekly" | "week" | "w" | "1w" => Ok(Frequency::Weekly),
            "monthly" | "month" | "1mo" => Ok(Frequency::Monthly),
            "minute" | "min" | "1min" => Ok(Frequency::Minute),
            "minute5" | "5min" => Ok(Frequency::Minute5),
            "minute15" | "15min" => Ok(Frequency::Minute15),
            "minute30" | "30min" => Ok(Frequency::Minute30),
            "minute60" | "60min" | "hour" | "1h" => Ok(Frequency::Minute60),
            _ => Err(IndicatorError::ParseError(format!(
                "Unknown frequency: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
