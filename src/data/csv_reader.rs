//! CSV ingestion of OHLCV bars into an in-memory provider

use super::{Frequency, InMemoryDataProvider};
use crate::asset::Asset;
use crate::error::{IndicatorError, Result};
use crate::types::{Bar, Timestamp};
use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// CSV data format configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvFormat {
    /// Date column name
    pub date_column: String,
    /// Market code column name (e.g. `SH600000`)
    pub symbol_column: String,
    /// Open price column name
    pub open_column: String,
    /// High price column name
    pub high_column: String,
    /// Low price column name
    pub low_column: String,
    /// Close price column name
    pub close_column: String,
    /// Volume column name
    pub volume_column: String,
    /// Date or datetime format string (e.g., "%Y-%m-%d")
    pub date_format: String,
    /// Reject bars whose high/low do not bracket open/close
    pub validate_ohlc: bool,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            symbol_column: "symbol".to_string(),
            open_column: "open".to_string(),
            high_column: "high".to_string(),
            low_column: "low".to_string(),
            close_column: "close".to_string(),
            volume_column: "volume".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            validate_ohlc: true,
        }
    }
}

/// CSV bar reader
#[derive(Debug, Clone, Default)]
pub struct CsvBarReader {
    format: CsvFormat,
}

impl CsvBarReader {
    /// Create a reader with the default format
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom format
    pub fn with_format(format: CsvFormat) -> Self {
        Self { format }
    }

    /// Read a CSV file into bars grouped by asset, in file order
    pub fn read(&self, path: &Path) -> Result<HashMap<Asset, Vec<Bar>>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| IndicatorError::DataError(format!("Failed to open CSV: {}", e)))?;

        let headers = rdr
            .headers()
            .map_err(|e| IndicatorError::DataError(format!("Failed to read headers: {}", e)))?
            .clone();

        let date_idx = Self::find_column(&headers, &self.format.date_column)?;
        let symbol_idx = Self::find_column(&headers, &self.format.symbol_column)?;
        let open_idx = Self::find_column(&headers, &self.format.open_column)?;
        let high_idx = Self::find_column(&headers, &self.format.high_column)?;
        let low_idx = Self::find_column(&headers, &self.format.low_column)?;
        let close_idx = Self::find_column(&headers, &self.format.close_column)?;
        let volume_idx = Self::find_column(&headers, &self.format.volume_column)?;

        let mut out: HashMap<Asset, Vec<Bar>> = HashMap::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result
                .map_err(|e| IndicatorError::DataError(format!("Failed to read record: {}", e)))?;

            let line = line + 1;
            let asset: Asset = Self::field(&record, symbol_idx, "symbol", line)?.parse()?;
            let timestamp = self.parse_timestamp(Self::field(&record, date_idx, "date", line)?)?;
            let bar = Bar::new(
                timestamp,
                Self::number(&record, open_idx, "open", line)?,
                Self::number(&record, high_idx, "high", line)?,
                Self::number(&record, low_idx, "low", line)?,
                Self::number(&record, close_idx, "close", line)?,
                Self::number(&record, volume_idx, "volume", line)?,
            );

            if self.format.validate_ohlc && !bar.is_consistent() {
                return Err(IndicatorError::DataError(format!(
                    "Invalid OHLC data for {} on {}: O={} H={} L={} C={}",
                    asset.market_code(),
                    bar.timestamp,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close
                )));
            }

            out.entry(asset).or_default().push(bar);
        }

        Ok(out)
    }

    /// Read a CSV file into a provider, returning the number of bars loaded
    pub fn load_into(
        &self,
        path: &Path,
        provider: &mut InMemoryDataProvider,
        frequency: Frequency,
    ) -> Result<usize> {
        let grouped = self.read(path)?;
        let mut count = 0;
        for (asset, bars) in grouped {
            count += bars.len();
            provider.add_bars(&asset, frequency, bars);
        }
        log::debug!("loaded {} bars from {}", count, path.display());
        Ok(count)
    }

    fn parse_timestamp(&self, raw: &str) -> Result<Timestamp> {
        let raw = raw.trim();
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, &self.format.date_format) {
            return Ok(dt.and_utc());
        }
        NaiveDate::parse_from_str(raw, &self.format.date_format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| IndicatorError::DataError(format!("Invalid date format: {}", raw)))
    }

    fn field<'r>(record: &'r csv::StringRecord, idx: usize, what: &str, line: usize) -> Result<&'r str> {
        record.get(idx).ok_or_else(|| {
            IndicatorError::DataError(format!("Missing {} on record {}", what, line))
        })
    }

    fn number(record: &csv::StringRecord, idx: usize, what: &str, line: usize) -> Result<f64> {
        Self::field(record, idx, what, line)?
            .trim()
            .parse::<f64>()
            .map_err(|_| IndicatorError::DataError(format!("Invalid {} on record {}", what, line)))
    }

    /// Find column index by name
    fn find_column(headers: &csv::StringRecord, name: &str) -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| IndicatorError::DataError(format!("Column '{}' not found", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataProvider, Query};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", body).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_groups_by_asset() {
        let file = create_test_csv(
            "date,symbol,open,high,low,close,volume\n\
             2020-01-02,SH600000,10.0,10.5,9.8,10.2,1000\n\
             2020-01-03,SH600000,10.2,10.8,10.1,10.6,1200\n\
             2020-01-02,SZ000001,5.0,5.2,4.9,5.1,800",
        );
        let grouped = CsvBarReader::new().read(file.path()).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&Asset::stock("SH", "600000")].len(), 2);
    }

    #[test]
    fn test_load_into_provider() {
        let file = create_test_csv(
            "date,symbol,open,high,low,close,volume\n\
             2020-01-03,SH600000,10.2,10.8,10.1,10.6,1200\n\
             2020-01-02,SH600000,10.0,10.5,9.8,10.2,1000",
        );
        let mut provider = InMemoryDataProvider::new();
        let count = CsvBarReader::new()
            .load_into(file.path(), &mut provider, Frequency::Daily)
            .unwrap();
        assert_eq!(count, 2);

        let bars = provider
            .get_bars(&Asset::stock("SH", "600000"), &Query::all())
            .unwrap();
        assert_eq!(bars[0].close, 10.2);
        assert_eq!(bars[1].close, 10.6);
    }

    #[test]
    fn test_invalid_ohlc_rejected() {
        let file = create_test_csv(
            "date,symbol,open,high,low,close,volume\n\
             2020-01-02,SH600000,10.0,9.0,9.8,10.2,1000",
        );
        assert!(CsvBarReader::new().read(file.path()).is_err());

        let lenient = CsvFormat {
            validate_ohlc: false,
            ..CsvFormat::default()
        };
        assert!(CsvBarReader::with_format(lenient).read(file.path()).is_ok());
    }

    #[test]
    fn test_custom_columns_and_datetime() {
        let file = create_test_csv(
            "Time,Code,O,H,L,C,V\n\
             2020-01-02 09:30:00,SH600000,10.0,10.5,9.8,10.2,1000",
        );
        let format = CsvFormat {
            date_column: "time".to_string(),
            symbol_column: "code".to_string(),
            open_column: "o".to_string(),
            high_column: "h".to_string(),
            low_column: "l".to_string(),
            close_column: "c".to_string(),
            volume_column: "v".to_string(),
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
            validate_ohlc: true,
        };
        let grouped = CsvBarReader::with_format(format).read(file.path()).unwrap();
        let bars = &grouped[&Asset::stock("SH", "600000")];
        assert_eq!(bars[0].timestamp.format("%H:%M").to_string(), "09:30");
    }

    #[test]
    fn test_missing_column() {
        let file = create_test_csv("date,symbol,open\n2020-01-02,SH600000,1.0");
        let err = CsvBarReader::new().read(file.path()).unwrap_err();
        assert!(err.to_string().contains("Column 'high' not found"));
    }
}
