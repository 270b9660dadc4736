//! Shared fixtures for integration tests
#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use rusty_indicator::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn day(i: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i)
}

/// `n` daily bars starting at `first_day`, close = `base + i`, open = close - 0.5
pub fn bars(n: i64, first_day: i64, base: f64) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let close = base + i as f64;
            Bar::new(
                day(first_day + i),
                close - 0.5,
                close + 1.0,
                close - 1.0,
                close,
                1000.0 + i as f64,
            )
        })
        .collect()
}

pub fn asset_x() -> Asset {
    Asset::stock("SH", "600000")
}

pub fn asset_y() -> Asset {
    Asset::stock("SZ", "000001")
}

/// Same length as X and Y, on a later calendar
pub fn asset_z() -> Asset {
    Asset::stock("SZ", "000002")
}

/// X: 30 bars closing 10..39; Y: same days closing 100..129; Z: 30 bars 100 days later
pub fn provider() -> InMemoryDataProvider {
    let mut provider = InMemoryDataProvider::new();
    provider.add_bars(&asset_x(), Frequency::Daily, bars(30, 0, 10.0));
    provider.add_bars(&asset_y(), Frequency::Daily, bars(30, 0, 100.0));
    provider.add_bars(&asset_z(), Frequency::Daily, bars(30, 100, 10.0));
    provider
}

pub fn series_x() -> BarSeries {
    BarSeries::new(bars(30, 0, 10.0)).unwrap()
}

/// Provider that counts fetches
pub struct CountingProvider {
    pub inner: InMemoryDataProvider,
    pub calls: AtomicUsize,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self {
            inner: provider(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataProvider for CountingProvider {
    fn get_bars(&self, asset: &Asset, query: &Query) -> Result<Vec<Bar>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_bars(asset, query)
    }
}

/// Multiplies channel 0 by `factor`, warm-up of `n`
#[derive(Debug, Clone, Default)]
pub struct Scale;

impl Formula for Scale {
    fn name(&self) -> &str {
        "SCALE"
    }

    fn default_params(&self) -> Parameters {
        let mut params = Parameters::new();
        params.set("factor", 1.0);
        params.set("n", 0usize);
        params
    }

    fn calculate(
        &self,
        input: &FormulaInput<'_>,
        params: &Parameters,
        out: &mut FormulaOutput,
    ) -> Result<()> {
        let factor: f64 = params.get("factor")?;
        let n: usize = params.get("n")?;
        if let (Some(src), Some(dst)) = (input.channel(0), out.channel_mut(0)) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d = s * factor;
            }
        }
        out.set_discard(input.discard().max(n));
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Formula> {
        Box::new(self.clone())
    }
}

/// Two result sets: input + width and input - width
#[derive(Debug, Clone, Default)]
pub struct Bands;

impl Formula for Bands {
    fn name(&self) -> &str {
        "BANDS"
    }

    fn result_count(&self, _input: &FormulaInput<'_>) -> usize {
        2
    }

    fn default_params(&self) -> Parameters {
        let mut params = Parameters::new();
        params.set("width", 1.0);
        params
    }

    fn calculate(
        &self,
        input: &FormulaInput<'_>,
        params: &Parameters,
        out: &mut FormulaOutput,
    ) -> Result<()> {
        let width: f64 = params.get("width")?;
        for pos in 0..input.len() {
            let value = input.get(pos, 0);
            out.set(pos, 0, value + width)?;
            out.set(pos, 1, value - width)?;
        }
        out.set_discard(input.discard());
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Formula> {
        Box::new(self.clone())
    }
}

pub fn registry() -> FormulaRegistry {
    let mut registry = FormulaRegistry::new();
    registry.register("SCALE", || Box::new(Scale));
    registry.register("BANDS", || Box::new(Bands));
    registry
}

/// Close of X bound through the provider
pub fn close_x(provider: &dyn DataProvider) -> Indicator {
    let close = Indicator::close();
    close
        .set_context(provider, &asset_x(), &Query::all())
        .unwrap();
    close
}
