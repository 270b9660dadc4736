//! Pluggable computations hosted by indicator nodes

use crate::error::{IndicatorError, Result};
use crate::param::Parameters;
use crate::types::{Price, Timestamp, NULL_PRICE};
use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;

/// Evaluated input handed to a formula: one or more aligned value channels
#[derive(Debug, Clone, Copy)]
pub struct FormulaInput<'a> {
    values: &'a [Vec<Price>],
    discard: usize,
    axis: Option<&'a Arc<Vec<Timestamp>>>,
}

impl<'a> FormulaInput<'a> {
    pub(crate) fn new(
        values: &'a [Vec<Price>],
        discard: usize,
        axis: Option<&'a Arc<Vec<Timestamp>>>,
    ) -> Self {
        Self {
            values,
            discard,
            axis,
        }
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.values.first().map(Vec::len).unwrap_or(0)
    }

    /// Whether the input has no positions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of input channels
    pub fn result_count(&self) -> usize {
        self.values.len()
    }

    /// Leading positions of the input that are null
    pub fn discard(&self) -> usize {
        self.discard
    }

    /// Values of one channel
    pub fn channel(&self, channel: usize) -> Option<&'a [Price]> {
        self.values.get(channel).map(Vec::as_slice)
    }

    /// Value at a position, null when absent
    pub fn get(&self, pos: usize, channel: usize) -> Price {
        self.values
            .get(channel)
            .and_then(|v| v.get(pos))
            .copied()
            .unwrap_or(NULL_PRICE)
    }

    /// Timestamp axis, when the input is bound to market data
    pub fn timestamps(&self) -> Option<&'a [Timestamp]> {
        self.axis.map(|a| a.as_slice())
    }

    pub(crate) fn axis(&self) -> Option<Arc<Vec<Timestamp>>> {
        self.axis.cloned()
    }
}

/// Result buffers a formula writes into. Every channel has the input's length
/// and starts out null.
#[derive(Debug, Clone)]
pub struct FormulaOutput {
    values: Vec<Vec<Price>>,
    discard: usize,
}

impl FormulaOutput {
    pub(crate) fn new(result_count: usize, len: usize) -> Self {
        Self {
            values: vec![vec![NULL_PRICE; len]; result_count],
            discard: 0,
        }
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.values.first().map(Vec::len).unwrap_or(0)
    }

    /// Whether the output has no positions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of output channels
    pub fn result_count(&self) -> usize {
        self.values.len()
    }

    /// Write one value
    pub fn set(&mut self, pos: usize, channel: usize, value: Price) -> Result<()> {
        let count = self.values.len();
        let buf = self
            .values
            .get_mut(channel)
            .ok_or(IndicatorError::ChannelOutOfRange { channel, count })?;
        let size = buf.len();
        let slot = buf.get_mut(pos).ok_or(IndicatorError::OutOfRange {
            index: pos as i64,
            size,
        })?;
        *slot = value;
        Ok(())
    }

    /// Mutable view of one channel
    pub fn channel_mut(&mut self, channel: usize) -> Option<&mut [Price]> {
        self.values.get_mut(channel).map(Vec::as_mut_slice)
    }

    /// Raise the warm-up region; never lowers it
    pub fn set_discard(&mut self, discard: usize) {
        self.discard = self.discard.max(discard);
    }

    /// Current warm-up region
    pub fn discard(&self) -> usize {
        self.discard
    }

    pub(crate) fn into_parts(self) -> (Vec<Vec<Price>>, usize) {
        (self.values, self.discard)
    }
}

/// A computation hosted by an indicator node.
///
/// Implementations are stateless: all configuration lives in the node's
/// [`Parameters`], so a node can be rebuilt from its name and parameters.
pub trait Formula: Send + Sync + fmt::Debug {
    /// Registry key and default node name
    fn name(&self) -> &str;

    /// Number of result channels produced for an input
    fn result_count(&self, _input: &FormulaInput<'_>) -> usize {
        1
    }

    /// Parameters a fresh node starts with
    fn default_params(&self) -> Parameters {
        Parameters::new()
    }

    /// Fill `out` from `input`
    fn calculate(
        &self,
        input: &FormulaInput<'_>,
        params: &Parameters,
        out: &mut FormulaOutput,
    ) -> Result<()>;

    /// Clone as trait object
    fn clone_box(&self) -> Box<dyn Formula>;
}

impl Clone for Box<dyn Formula> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Pass-through of every input channel, keeping the input's warm-up region
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Formula for Identity {
    fn name(&self) -> &str {
        "IDENT"
    }

    fn result_count(&self, input: &FormulaInput<'_>) -> usize {
        input.result_count().max(1)
    }

    fn calculate(
        &self,
        input: &FormulaInput<'_>,
        _params: &Parameters,
        out: &mut FormulaOutput,
    ) -> Result<()> {
        for ch in 0..input.result_count() {
            if let (Some(src), Some(dst)) = (input.channel(ch), out.channel_mut(ch)) {
                dst.copy_from_slice(src);
            }
        }
        out.set_discard(input.discard());
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Formula> {
        Box::new(*self)
    }
}

/// Constructor of a formula with default configuration
pub type FormulaFactory = fn() -> Box<dyn Formula>;

/// Name → factory table used to rebuild formula nodes from their structural form
#[derive(Clone)]
pub struct FormulaRegistry {
    factories: HashMap<String, FormulaFactory>,
}

impl FormulaRegistry {
    /// Registry without any formula
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in formulas
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("IDENT", || Box::new(Identity));
        registry
    }

    /// Register or replace a factory
    pub fn register(&mut self, name: impl Into<String>, factory: FormulaFactory) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Whether a formula is known
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate a formula by name
    pub fn create(&self, name: &str) -> Result<Box<dyn Formula>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| IndicatorError::UnknownFormula(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FormulaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FormulaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaRegistry")
            .field("formulas", &self.names())
            .finish()
    }
}
