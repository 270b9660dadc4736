//! Query ranges selecting a window of bars

use super::frequency::Frequency;
use crate::types::{Bar, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Range part of a query. Both variants are half-open: `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "lowercase")]
pub enum QueryRange {
    /// Positional range; negative values count from the end, `None` end means "to the last bar"
    Index { start: i64, end: Option<i64> },
    /// Timestamp range; `None` leaves that side open
    Date {
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    },
}

/// Bar query: which range, at which bar period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub range: QueryRange,
    #[serde(default)]
    pub frequency: Frequency,
}

impl Query {
    /// Positional query
    pub fn index(start: i64, end: Option<i64>) -> Self {
        Self {
            range: QueryRange::Index { start, end },
            frequency: Frequency::Daily,
        }
    }

    /// Timestamp query
    pub fn dates(start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        Self {
            range: QueryRange::Date { start, end },
            frequency: Frequency::Daily,
        }
    }

    /// Every available bar
    pub fn all() -> Self {
        Self::index(0, None)
    }

    /// The last `n` bars
    pub fn last(n: usize) -> Self {
        Self::index(-(n as i64), None)
    }

    /// Set the bar period
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Select the queried window out of time-ordered bars
    pub fn select<'a>(&self, bars: &'a [Bar]) -> &'a [Bar] {
        let len = bars.len();
        let (start, end) = match &self.range {
            QueryRange::Index { start, end } => {
                let start = resolve_index(*start, len);
                let end = end.map(|e| resolve_index(e, len)).unwrap_or(len);
                (start, end)
            }
            QueryRange::Date { start, end } => {
                let start = start
                    .map(|s| bars.partition_point(|b| b.timestamp < s))
                    .unwrap_or(0);
                let end = end
                    .map(|e| bars.partition_point(|b| b.timestamp < e))
                    .unwrap_or(len);
                (start, end)
            }
        };
        if start >= end {
            &bars[0..0]
        } else {
            &bars[start..end]
        }
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::all()
    }
}

fn resolve_index(index: i64, len: usize) -> usize {
    if index < 0 {
        (len as i64 + index).max(0) as usize
    } else {
        (index as usize).min(len)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            QueryRange::Index { start, end } => match end {
                Some(end) => write!(f, "Query(index, {}, {}, {})", start, end, self.frequency),
                None => write!(f, "Query(index, {}, end, {})", start, self.frequency),
            },
            QueryRange::Date { start, end } => {
                let fmt_ts = |ts: &Option<Timestamp>| {
                    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "open".to_string())
                };
                write!(
                    f,
                    "Query(date, {}, {}, {})",
                    fmt_ts(start),
                    fmt_ts(end),
                    self.frequency
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let p = 10.0 + i as f64;
                Bar::new(start + Duration::days(i as i64), p, p, p, p, 100.0)
            })
            .collect()
    }

    #[test]
    fn test_index_query() {
        let data = bars(10);
        assert_eq!(Query::all().select(&data).len(), 10);
        assert_eq!(Query::index(2, Some(5)).select(&data).len(), 3);
        assert_eq!(Query::index(2, Some(5)).select(&data)[0].close, 12.0);
    }

    #[test]
    fn test_negative_index_query() {
        let data = bars(10);
        let last3 = Query::last(3).select(&data);
        assert_eq!(last3.len(), 3);
        assert_eq!(last3[0].close, 17.0);

        assert_eq!(Query::index(-100, Some(2)).select(&data).len(), 2);
        assert!(Query::index(8, Some(3)).select(&data).is_empty());
    }

    #[test]
    fn test_date_query_half_open() {
        let data = bars(10);
        let start = data[2].timestamp;
        let end = data[6].timestamp;
        let window = Query::dates(Some(start), Some(end)).select(&data);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].timestamp, start);
        assert_eq!(Query::dates(None, Some(start)).select(&data).len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(Query::all().to_string(), "Query(index, 0, end, daily)");
        assert_eq!(
            Query::index(1, Some(4)).with_frequency(Frequency::Weekly).to_string(),
            "Query(index, 1, 4, weekly)"
        );
    }
}
