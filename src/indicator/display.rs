//! Tabular pretty-printing of indicator results

use super::handle::{Indicator, IndicatorItem};
use crate::error::Result;
use crate::types::{is_null, Price, Timestamp, NULL_PRICE};
use serde::{Deserialize, Serialize};
use std::fmt;

const RULE: &str = "------------------------------------";

/// Controls how [`Indicator`] tables are rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintOptions {
    /// Longest series printed in full
    pub max_rows: usize,
    /// Rows printed at each end of a longer series
    pub edge_rows: usize,
    /// chrono format string for the datetime column
    pub datetime_format: String,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            max_rows: 20,
            edge_rows: 10,
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl Indicator {
    /// Render one table per result set
    pub fn render(&self, options: &PrintOptions) -> Result<String> {
        let items = self.items()?;
        let count = self.result_count()?;
        let mut out = String::new();

        for channel in 0..count {
            if channel > 0 {
                out.push('\n');
            }
            out.push_str(&table_header(channel));

            let total = items.len();
            let row = |(ts, values): &IndicatorItem| {
                let value = values.get(channel).copied().unwrap_or(NULL_PRICE);
                format!(
                    "{:<22}{}\n",
                    format_timestamp(*ts, &options.datetime_format),
                    format_value(value)
                )
            };
            if total <= options.max_rows {
                items.iter().for_each(|item| out.push_str(&row(item)));
            } else {
                let edge = options.edge_rows.min(total / 2);
                items[..edge].iter().for_each(|item| out.push_str(&row(item)));
                out.push_str("...\n");
                items[total - edge..]
                    .iter()
                    .for_each(|item| out.push_str(&row(item)));
            }
        }
        Ok(out)
    }
}

fn table_header(channel: usize) -> String {
    format!(
        "result set: {}\n{}\n{:<22}value\n{}\n",
        channel, RULE, "datetime", RULE
    )
}

fn format_timestamp(ts: Option<Timestamp>, format: &str) -> String {
    match ts {
        Some(ts) => ts.format(format).to_string(),
        None => "None".to_string(),
    }
}

fn format_value(value: Price) -> String {
    if is_null(value) {
        "nan".to_string()
    } else {
        value.to_string()
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render(&PrintOptions::default()) {
            Ok(text) => f.write_str(&text),
            Err(e) => write!(f, "{}: {}", self.name(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_series_prints_every_row() {
        let ind = Indicator::from_prices(vec![1.0, 2.5]);
        ind.set_discard(1);
        let text = ind.to_string();

        assert!(text.starts_with("result set: 0\n"));
        assert!(text.contains(&format!("{:<22}nan\n", "None")));
        assert!(text.contains(&format!("{:<22}2.5\n", "None")));
        assert!(!text.contains("..."));
    }

    #[test]
    fn test_table_header() {
        let text = Indicator::from_prices(vec![1.0]).to_string();
        let header: Vec<&str> = text.lines().take(4).collect();

        assert_eq!(header[0], "result set: 0");
        assert_eq!(header[1], RULE);
        assert_eq!(header[2], format!("{:<22}value", "datetime"));
        assert_eq!(header[3], RULE);
    }

    #[test]
    fn test_long_series_is_elided() {
        let ind = Indicator::from_prices((0..30).map(f64::from).collect::<Vec<_>>());
        let text = ind.to_string();
        let rows: Vec<&str> = text.lines().skip(4).collect();

        assert_eq!(rows.len(), 21);
        assert_eq!(rows[10], "...");
        assert!(rows[0].ends_with(" 0"));
        assert!(rows[20].ends_with(" 29"));
    }

    #[test]
    fn test_custom_options() {
        let ind = Indicator::from_prices((0..6).map(f64::from).collect::<Vec<_>>());
        let options = PrintOptions {
            max_rows: 4,
            edge_rows: 1,
            ..PrintOptions::default()
        };
        let text = ind.render(&options).unwrap();
        assert_eq!(text.lines().skip(4).count(), 3);
    }
}
