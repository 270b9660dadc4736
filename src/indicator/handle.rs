//! Shared handle over a computation node

use super::formula::{Formula, Identity};
use super::imp::{DataContext, IndicatorImp};
use super::NodeState;
use crate::asset::Asset;
use crate::data::{fetch_series, BarSeries, DataProvider, PriceField, Query};
use crate::error::{IndicatorError, Result};
use crate::param::{ParamType, ParamValue, Parameters};
use crate::types::{Price, PriceList, Timestamp, NULL_PRICE};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One row of [`Indicator::items`]: timestamp (if any) and one value per result set
pub type IndicatorItem = (Option<Timestamp>, Vec<Price>);

/// Reference-counted handle over a computation node.
///
/// `Clone` aliases the node: parameter changes and rebinds made through one
/// handle are seen by every alias. Use [`Indicator::deep_clone`] for an
/// independent node.
///
/// Results are computed lazily on the first read after construction, a
/// context bind, a parameter change or a discard increase, then cached.
#[derive(Clone)]
pub struct Indicator {
    imp: Arc<RwLock<IndicatorImp>>,
}

impl Indicator {
    pub(crate) fn from_imp(imp: IndicatorImp) -> Self {
        Self {
            imp: Arc::new(RwLock::new(imp)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IndicatorImp> {
        self.imp.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndicatorImp> {
        self.imp.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against computed results, recomputing first if needed
    fn computed<R>(&self, f: impl FnOnce(&IndicatorImp) -> Result<R>) -> Result<R> {
        {
            let guard = self.read();
            if guard.state() == NodeState::Computed {
                return f(&*guard);
            }
        }
        let mut guard = self.write();
        guard.ensure_computed()?;
        f(&*guard)
    }

    /// Copy of the node as it is now, sharing its result buffers and children
    pub(crate) fn snapshot(&self) -> IndicatorImp {
        self.read().clone()
    }

    // ---- construction ----

    /// Node hosting a user formula; reads the context close until an input is applied
    pub fn from_formula(formula: impl Formula + 'static) -> Self {
        Self::from_boxed_formula(Box::new(formula))
    }

    /// Node hosting a boxed formula
    pub fn from_boxed_formula(formula: Box<dyn Formula>) -> Self {
        Self::from_imp(IndicatorImp::formula(formula))
    }

    /// Pass-through of its input
    pub fn identity() -> Self {
        Self::from_formula(Identity)
    }

    /// Raw field of the bound K-line; empty until a context is bound
    pub fn price(field: PriceField) -> Self {
        Self::from_imp(IndicatorImp::source(field))
    }

    pub fn open() -> Self {
        Self::price(PriceField::Open)
    }

    pub fn high() -> Self {
        Self::price(PriceField::High)
    }

    pub fn low() -> Self {
        Self::price(PriceField::Low)
    }

    pub fn close() -> Self {
        Self::price(PriceField::Close)
    }

    pub fn volume() -> Self {
        Self::price(PriceField::Volume)
    }

    /// Constant broadcast over the bound input or context (length 1 when unbound)
    pub fn constant(value: Price) -> Self {
        Self::from_imp(IndicatorImp::constant(value))
    }

    /// Fixed series without a timestamp axis
    pub fn from_prices(values: impl Into<PriceList>) -> Self {
        Self::from_imp(IndicatorImp::series(vec![values.into()], None, 0))
    }

    /// Fixed series on its own timestamp axis; timestamps must be strictly ascending
    pub fn from_points(points: Vec<(Timestamp, Price)>) -> Result<Self> {
        if let Some(pos) = points.windows(2).position(|w| w[0].0 >= w[1].0) {
            return Err(IndicatorError::DataError(format!(
                "Timestamps are not strictly ascending at position {}",
                pos + 1
            )));
        }
        let (axis, values): (Vec<Timestamp>, PriceList) = points.into_iter().unzip();
        Ok(Self::from_imp(IndicatorImp::series(
            vec![values],
            Some(Arc::new(axis)),
            0,
        )))
    }

    // ---- identity ----

    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    /// Rename without touching computed values
    pub fn set_name(&self, name: impl Into<String>) {
        self.write().name = name.into();
    }

    /// `NAME(param1=v1,param2=v2)`
    pub fn long_name(&self) -> String {
        self.read().long_name()
    }

    /// Infix rendering of the composition history
    pub fn formula(&self) -> String {
        self.read().formula_string()
    }

    /// Current position in the recompute state machine
    pub fn state(&self) -> NodeState {
        self.read().state()
    }

    /// Whether two handles alias the same node
    pub fn ptr_eq(&self, other: &Indicator) -> bool {
        Arc::ptr_eq(&self.imp, &other.imp)
    }

    // ---- parameters ----

    pub fn get_param<T: ParamType>(&self, name: &str) -> Result<T> {
        self.read().params.get(name)
    }

    /// Insert or overwrite; results are recomputed on the next read
    pub fn set_param<T: ParamType>(&self, name: &str, value: T) {
        self.write().set_params(|p| p.set(name, value));
    }

    pub fn have_param(&self, name: &str) -> bool {
        self.read().params.contains(name)
    }

    /// Untyped lookup
    pub fn param_value(&self, name: &str) -> Option<ParamValue> {
        self.read().params.get_value(name).cloned()
    }

    /// Untyped insert or overwrite
    pub fn set_param_value(&self, name: &str, value: ParamValue) {
        self.write().set_params(|p| p.set_value(name, value));
    }

    pub fn params(&self) -> Parameters {
        self.read().params.clone()
    }

    // ---- context ----

    /// Fetch `query` for `asset` once and bind it to this node and everything it owns
    pub fn set_context(
        &self,
        provider: &dyn DataProvider,
        asset: &Asset,
        query: &Query,
    ) -> Result<()> {
        let series = fetch_series(provider, asset, query)?;
        self.set_context_series(series);
        Ok(())
    }

    /// Bind a pre-fetched K-line
    pub fn set_context_series(&self, series: BarSeries) {
        log::debug!(
            "binding {} to {} bars of {}",
            self.name(),
            series.len(),
            series
                .asset()
                .map(Asset::market_code)
                .unwrap_or_else(|| "unnamed series".to_string())
        );
        let context = DataContext::new(series);
        self.write().set_context(&context);
    }

    /// Bound K-line, if any
    pub fn context(&self) -> Option<Arc<BarSeries>> {
        self.read().context.as_ref().map(|c| c.series.clone())
    }

    /// Raise the warm-up region to at least `discard`; never lowers it
    pub fn set_discard(&self, discard: usize) {
        self.write().set_discard(discard);
    }

    // ---- derivation ----

    /// Independent node with the same identity, parameters and context
    pub fn deep_clone(&self) -> Indicator {
        Self::from_imp(self.read().fresh_copy())
    }

    /// The handle itself, for chaining
    pub fn call(&self) -> Indicator {
        self.clone()
    }

    /// Re-apply this node's formula to `input`, leaving this node untouched
    pub fn apply(&self, input: &Indicator) -> Indicator {
        let input = Arc::new(input.snapshot());
        let mut node = self.read().fresh_copy();
        node.bind_input(&input);
        Self::from_imp(node)
    }

    /// Re-apply this node's formula to a pre-fetched K-line
    pub fn apply_series(&self, series: BarSeries) -> Indicator {
        let out = self.deep_clone();
        out.set_context_series(series);
        out
    }

    /// Re-apply this node's formula to freshly fetched data
    pub fn apply_query(
        &self,
        provider: &dyn DataProvider,
        asset: &Asset,
        query: &Query,
    ) -> Result<Indicator> {
        let series = fetch_series(provider, asset, query)?;
        Ok(self.apply_series(series))
    }

    /// Single-channel node holding one result set, without recomputation
    pub fn get_result(&self, channel: usize) -> Result<Indicator> {
        self.computed(|imp| imp.project(channel).map(Self::from_imp))
    }

    // ---- reads ----

    /// Compute now if results are stale
    pub fn evaluate(&self) -> Result<()> {
        self.computed(|_| Ok(()))
    }

    pub fn size(&self) -> Result<usize> {
        self.computed(|imp| Ok(imp.size()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.size().map(|n| n == 0)
    }

    pub fn result_count(&self) -> Result<usize> {
        self.computed(|imp| Ok(imp.result_count()))
    }

    pub fn discard(&self) -> Result<usize> {
        self.computed(|imp| Ok(imp.discard()))
    }

    /// Value at a position; null inside the warm-up region
    pub fn get(&self, pos: usize, channel: usize) -> Result<Price> {
        self.computed(|imp| imp.get(pos, channel))
    }

    /// Value of result set 0, negative positions counted from the end
    pub fn at(&self, index: i64) -> Result<Price> {
        self.computed(|imp| {
            let size = imp.size();
            let pos = if index < 0 {
                index + size as i64
            } else {
                index
            };
            if pos < 0 || pos >= size as i64 {
                return Err(IndicatorError::OutOfRange { index, size });
            }
            imp.get(pos as usize, 0)
        })
    }

    /// Timestamp at a position; `None` when the node has no timestamp axis
    pub fn get_datetime(&self, pos: usize) -> Result<Option<Timestamp>> {
        self.computed(|imp| imp.datetime(pos))
    }

    /// Position of a timestamp; `None` when it is not on the axis
    pub fn get_pos(&self, timestamp: Timestamp) -> Result<Option<usize>> {
        self.computed(|imp| Ok(imp.position(timestamp)))
    }

    /// Value at a timestamp; null when the timestamp is not on the axis
    pub fn get_by_date(&self, timestamp: Timestamp, channel: usize) -> Result<Price> {
        self.computed(|imp| match imp.position(timestamp) {
            Some(pos) => imp.get(pos, channel),
            None => {
                imp.channel(channel)?;
                Ok(NULL_PRICE)
            }
        })
    }

    /// Values of result set 0 selected like a Python slice `[start:stop:step]`
    pub fn slice(&self, start: Option<i64>, stop: Option<i64>, step: i64) -> Result<PriceList> {
        if step == 0 {
            return Err(IndicatorError::InvalidOperation(
                "slice step cannot be zero".to_string(),
            ));
        }
        self.computed(|imp| {
            let values = imp.channel(0)?;
            Ok(slice_positions(values.len(), start, stop, step)
                .map(|pos| values[pos])
                .collect())
        })
    }

    /// Materialized copy of one result set
    pub fn get_result_as_price_list(&self, channel: usize) -> Result<PriceList> {
        self.computed(|imp| imp.channel(channel).map(<[Price]>::to_vec))
    }

    /// Timestamp axis; empty when the node has none
    pub fn datetime_list(&self) -> Result<Vec<Timestamp>> {
        self.computed(|imp| Ok(imp.axis().map(|a| a.to_vec()).unwrap_or_default()))
    }

    /// Every position as (timestamp, value per result set), in axis order
    pub fn items(&self) -> Result<Vec<IndicatorItem>> {
        self.computed(|imp| {
            (0..imp.size())
                .map(|pos| {
                    let values = (0..imp.result_count())
                        .map(|ch| imp.get(pos, ch))
                        .collect::<Result<Vec<_>>>()?;
                    Ok((imp.datetime(pos)?, values))
                })
                .collect()
        })
    }
}

/// Positions selected by a Python-style slice over `len` elements
fn slice_positions(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: i64,
) -> impl Iterator<Item = usize> {
    let len = len as i64;
    let clamp = |index: i64, low: i64, high: i64| {
        let index = if index < 0 { index + len } else { index };
        index.clamp(low, high)
    };
    let (start, stop) = if step > 0 {
        (
            start.map_or(0, |s| clamp(s, 0, len)),
            stop.map_or(len, |s| clamp(s, 0, len)),
        )
    } else {
        (
            start.map_or(len - 1, |s| clamp(s, -1, len - 1)),
            stop.map_or(-1, |s| clamp(s, -1, len - 1)),
        )
    };

    let mut pos = start;
    std::iter::from_fn(move || {
        let more = if step > 0 { pos < stop } else { pos > stop };
        if !more {
            return None;
        }
        let current = pos;
        pos += step;
        Some(current as usize)
    })
}

impl Default for Indicator {
    /// Empty close-price source
    fn default() -> Self {
        Self::close()
    }
}

impl std::fmt::Debug for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let imp = self.read();
        f.debug_struct("Indicator")
            .field("name", &imp.name)
            .field("state", &imp.state())
            .field("size", &imp.size())
            .field("discard", &imp.discard())
            .field("result_count", &imp.result_count())
            .finish()
    }
}
