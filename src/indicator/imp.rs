//! Computation node: results, discard region, bound context and the
//! recompute state machine behind every [`Indicator`](super::Indicator).

use super::formula::{Formula, FormulaInput, FormulaOutput};
use super::op::BinOp;
use super::NodeState;
use crate::data::{BarSeries, PriceField};
use crate::error::{IndicatorError, Result};
use crate::param::Parameters;
use crate::types::{Price, Timestamp, NULL_PRICE};
use std::sync::Arc;

/// A bound K-line shared by every node of a tree, with its timestamp axis
/// extracted once.
#[derive(Debug, Clone)]
pub(crate) struct DataContext {
    pub(crate) series: Arc<BarSeries>,
    pub(crate) axis: Arc<Vec<Timestamp>>,
}

impl DataContext {
    pub(crate) fn new(series: BarSeries) -> Self {
        let axis = Arc::new(series.timestamps());
        Self {
            series: Arc::new(series),
            axis,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    /// One field of the bound context
    Source(PriceField),
    /// Broadcast of the `value` parameter
    Constant,
    /// Fixed values, unaffected by context binds
    Series {
        values: Arc<Vec<Vec<Price>>>,
        axis: Option<Arc<Vec<Timestamp>>>,
        discard: usize,
    },
    /// User computation over the input (or the context close)
    Formula(Box<dyn Formula>),
    /// Element-wise operation over two operands, shared until one side is mutated
    Binary {
        op: BinOp,
        left: Arc<IndicatorImp>,
        right: Arc<IndicatorImp>,
    },
}

/// Freshly computed buffers, before the discard region is applied
struct Output {
    results: Vec<Vec<Price>>,
    discard: usize,
    axis: Option<Arc<Vec<Timestamp>>>,
}

impl Output {
    fn empty(result_count: usize) -> Self {
        Self {
            results: vec![Vec::new(); result_count],
            discard: 0,
            axis: None,
        }
    }

    fn single(values: Vec<Price>, axis: Option<Arc<Vec<Timestamp>>>) -> Self {
        Self {
            results: vec![values],
            discard: 0,
            axis,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct IndicatorImp {
    pub(crate) name: String,
    pub(crate) params: Parameters,
    pub(crate) kind: NodeKind,
    pub(crate) input: Option<Arc<IndicatorImp>>,
    pub(crate) context: Option<DataContext>,
    pub(crate) requested_discard: usize,
    discard: usize,
    results: Arc<Vec<Vec<Price>>>,
    axis: Option<Arc<Vec<Timestamp>>>,
    state: NodeState,
    has_computed: bool,
}

impl IndicatorImp {
    pub(crate) fn new(name: impl Into<String>, kind: NodeKind, params: Parameters) -> Self {
        let mut imp = Self {
            name: name.into(),
            params,
            kind,
            input: None,
            context: None,
            requested_discard: 0,
            discard: 0,
            results: Arc::default(),
            axis: None,
            state: NodeState::Unbound,
            has_computed: false,
        };
        imp.state = imp.pending_state();
        imp
    }

    pub(crate) fn source(field: PriceField) -> Self {
        Self::new(field.name(), NodeKind::Source(field), Parameters::new())
    }

    pub(crate) fn constant(value: Price) -> Self {
        let mut params = Parameters::new();
        params.set("value", value);
        Self::new("CVAL", NodeKind::Constant, params)
    }

    pub(crate) fn series(
        values: Vec<Vec<Price>>,
        axis: Option<Arc<Vec<Timestamp>>>,
        discard: usize,
    ) -> Self {
        Self::new(
            "PRICELIST",
            NodeKind::Series {
                values: Arc::new(values),
                axis,
                discard,
            },
            Parameters::new(),
        )
    }

    pub(crate) fn formula(formula: Box<dyn Formula>) -> Self {
        let name = formula.name().to_string();
        let params = formula.default_params();
        Self::new(name, NodeKind::Formula(formula), params)
    }

    pub(crate) fn binary(op: BinOp, left: IndicatorImp, right: IndicatorImp) -> Self {
        Self::new(
            op.node_name(),
            NodeKind::Binary {
                op,
                left: Arc::new(left),
                right: Arc::new(right),
            },
            Parameters::new(),
        )
    }

    // ---- state ----

    pub(crate) fn state(&self) -> NodeState {
        self.state
    }

    fn is_bound(&self) -> bool {
        self.context.is_some()
            || self.input.is_some()
            || match &self.kind {
                NodeKind::Series { .. } => true,
                NodeKind::Binary { left, right, .. } => left.is_bound() || right.is_bound(),
                _ => false,
            }
    }

    fn pending_state(&self) -> NodeState {
        if self.is_bound() {
            NodeState::Pending
        } else {
            NodeState::Unbound
        }
    }

    /// Drop cached results on the next read
    pub(crate) fn invalidate(&mut self) {
        self.state = self.pending_state();
    }

    pub(crate) fn is_constant(&self) -> bool {
        matches!(self.kind, NodeKind::Constant)
    }

    // ---- mutation ----

    pub(crate) fn set_context(&mut self, context: &DataContext) {
        if let Some(input) = self.input.as_mut() {
            Arc::make_mut(input).set_context(context);
        }
        if let NodeKind::Binary { left, right, .. } = &mut self.kind {
            Arc::make_mut(left).set_context(context);
            Arc::make_mut(right).set_context(context);
        }
        self.context = Some(context.clone());
        self.invalidate();
    }

    pub(crate) fn set_discard(&mut self, discard: usize) {
        if discard > self.requested_discard {
            self.requested_discard = discard;
            self.invalidate();
        }
    }

    pub(crate) fn set_params(&mut self, update: impl FnOnce(&mut Parameters)) {
        update(&mut self.params);
        self.invalidate();
    }

    /// Substitute `input` at every input slot of the tree
    pub(crate) fn bind_input(&mut self, input: &Arc<IndicatorImp>) {
        match &mut self.kind {
            NodeKind::Binary { left, right, .. } => {
                Arc::make_mut(left).bind_input(input);
                Arc::make_mut(right).bind_input(input);
            }
            NodeKind::Formula(_) | NodeKind::Constant => match self.input.as_mut() {
                Some(inner) => Arc::make_mut(inner).bind_input(input),
                None => self.input = Some(Arc::clone(input)),
            },
            NodeKind::Source(_) | NodeKind::Series { .. } => {}
        }
        if input.context.is_some() {
            self.context = input.context.clone();
        }
        self.invalidate();
    }

    /// Independent copy with empty results, recomputed on first read
    pub(crate) fn fresh_copy(&self) -> IndicatorImp {
        let mut copy = self.clone();
        copy.reset();
        copy
    }

    fn reset(&mut self) {
        if let Some(input) = self.input.as_mut() {
            Arc::make_mut(input).reset();
        }
        if let NodeKind::Binary { left, right, .. } = &mut self.kind {
            Arc::make_mut(left).reset();
            Arc::make_mut(right).reset();
        }
        self.results = Arc::default();
        self.axis = None;
        self.discard = 0;
        self.has_computed = false;
        self.state = self.pending_state();
    }

    // ---- evaluation ----

    pub(crate) fn ensure_computed(&mut self) -> Result<()> {
        if self.state == NodeState::Computed {
            return Ok(());
        }
        self.recompute()
    }

    fn recompute(&mut self) -> Result<()> {
        log::debug!("recomputing {}", self.name);
        match self.calculate() {
            Ok(output) => {
                self.store(output);
                self.state = NodeState::Computed;
                self.has_computed = true;
                Ok(())
            }
            Err(e) => {
                log::warn!("recomputation of {} failed: {}", self.name, e);
                if self.has_computed {
                    self.state = NodeState::Computed;
                } else {
                    self.results = Arc::default();
                    self.axis = None;
                    self.discard = 0;
                    self.state = NodeState::Failed;
                }
                Err(e)
            }
        }
    }

    fn store(&mut self, output: Output) {
        let Output {
            mut results,
            discard,
            axis,
        } = output;
        let len = results.first().map(Vec::len).unwrap_or(0);
        let discard = discard.max(self.requested_discard).min(len);
        for buf in results.iter_mut() {
            for value in buf.iter_mut().take(discard) {
                *value = NULL_PRICE;
            }
        }
        self.results = Arc::new(results);
        self.discard = discard;
        self.axis = axis;
    }

    fn calculate(&mut self) -> Result<Output> {
        let Self {
            kind,
            input,
            context,
            params,
            ..
        } = self;
        match kind {
            NodeKind::Source(field) => Ok(match context {
                Some(ctx) => Output::single(ctx.series.field(*field), Some(ctx.axis.clone())),
                None => Output::empty(1),
            }),
            NodeKind::Constant => {
                let value = params.get::<f64>("value")?;
                let (len, axis) = match input {
                    Some(inner) => {
                        let inner = computed_child(inner)?;
                        (inner.size(), inner.axis.clone())
                    }
                    None => match context {
                        Some(ctx) => (ctx.series.len(), Some(ctx.axis.clone())),
                        None => (1, None),
                    },
                };
                Ok(Output::single(vec![value; len], axis))
            }
            NodeKind::Series {
                values,
                axis,
                discard,
            } => Ok(Output {
                results: values.to_vec(),
                discard: *discard,
                axis: axis.clone(),
            }),
            NodeKind::Formula(formula) => match input {
                Some(inner) => {
                    let inner = computed_child(inner)?;
                    let view = FormulaInput::new(
                        inner.results.as_slice(),
                        inner.discard,
                        inner.axis.as_ref(),
                    );
                    run_formula(&**formula, &view, params)
                }
                None => match context {
                    Some(ctx) => {
                        let close = vec![ctx.series.field(PriceField::Close)];
                        let view = FormulaInput::new(&close, 0, Some(&ctx.axis));
                        run_formula(&**formula, &view, params)
                    }
                    None => {
                        let view = FormulaInput::new(&[], 0, None);
                        Ok(Output::empty(formula.result_count(&view)))
                    }
                },
            },
            NodeKind::Binary { op, left, right } => calculate_binary(*op, left, right),
        }
    }

    /// `Some(value)` for a constant operand
    fn scalar_value(&self) -> Result<Option<Price>> {
        if self.is_constant() {
            self.params.get::<f64>("value").map(Some)
        } else {
            Ok(None)
        }
    }

    // ---- reads (valid once computed) ----

    pub(crate) fn size(&self) -> usize {
        self.results.first().map(Vec::len).unwrap_or(0)
    }

    pub(crate) fn result_count(&self) -> usize {
        self.results.len()
    }

    pub(crate) fn discard(&self) -> usize {
        self.discard
    }

    pub(crate) fn axis(&self) -> Option<&Arc<Vec<Timestamp>>> {
        self.axis.as_ref()
    }

    pub(crate) fn channel(&self, channel: usize) -> Result<&[Price]> {
        self.results
            .get(channel)
            .map(Vec::as_slice)
            .ok_or(IndicatorError::ChannelOutOfRange {
                channel,
                count: self.results.len(),
            })
    }

    pub(crate) fn get(&self, pos: usize, channel: usize) -> Result<Price> {
        let values = self.channel(channel)?;
        values.get(pos).copied().ok_or(IndicatorError::OutOfRange {
            index: pos as i64,
            size: values.len(),
        })
    }

    pub(crate) fn datetime(&self, pos: usize) -> Result<Option<Timestamp>> {
        let size = self.size();
        if pos >= size {
            return Err(IndicatorError::OutOfRange {
                index: pos as i64,
                size,
            });
        }
        Ok(self.axis.as_ref().and_then(|axis| axis.get(pos).copied()))
    }

    pub(crate) fn position(&self, timestamp: Timestamp) -> Option<usize> {
        self.axis
            .as_ref()
            .and_then(|axis| axis.binary_search(&timestamp).ok())
    }

    /// Single-channel fixed node holding one computed channel
    pub(crate) fn project(&self, channel: usize) -> Result<IndicatorImp> {
        let values = self.channel(channel)?.to_vec();
        let mut node = IndicatorImp::series(vec![values], self.axis.clone(), self.discard);
        node.name = self.name.clone();
        node.params = self.params.clone();
        node.context = self.context.clone();
        Ok(node)
    }

    // ---- rendering ----

    pub(crate) fn formula_string(&self) -> String {
        match &self.kind {
            NodeKind::Binary { op, left, right } => format!(
                "({} {} {})",
                left.formula_string(),
                op.symbol(),
                right.formula_string()
            ),
            NodeKind::Constant => match self.params.get::<f64>("value") {
                Ok(value) => value.to_string(),
                Err(_) => self.name.clone(),
            },
            _ => match &self.input {
                Some(input) => format!("{}({})", self.name, input.formula_string()),
                None => self.name.clone(),
            },
        }
    }

    pub(crate) fn long_name(&self) -> String {
        format!("{}({})", self.name, self.params.name_value_list())
    }
}

/// Computed view of a shared child, copying it first only when it needs
/// a recompute while another tree still holds it
fn computed_child(child: &mut Arc<IndicatorImp>) -> Result<&IndicatorImp> {
    if child.state() != NodeState::Computed {
        Arc::make_mut(child).ensure_computed()?;
    }
    Ok(&**child)
}

fn run_formula(
    formula: &dyn Formula,
    input: &FormulaInput<'_>,
    params: &Parameters,
) -> Result<Output> {
    let mut out = FormulaOutput::new(formula.result_count(input), input.len());
    formula.calculate(input, params, &mut out)?;
    let (results, discard) = out.into_parts();
    Ok(Output {
        results,
        discard,
        axis: input.axis(),
    })
}

fn broadcast(op: BinOp, node: &IndicatorImp, scalar: Price, scalar_first: bool) -> Output {
    let discard = node.discard;
    let results = node
        .results
        .iter()
        .map(|values| {
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| match (i < discard, scalar_first) {
                    (true, _) => NULL_PRICE,
                    (false, true) => op.apply(scalar, v),
                    (false, false) => op.apply(v, scalar),
                })
                .collect()
        })
        .collect();
    Output {
        results,
        discard,
        axis: node.axis.clone(),
    }
}

fn calculate_binary(
    op: BinOp,
    left: &mut Arc<IndicatorImp>,
    right: &mut Arc<IndicatorImp>,
) -> Result<Output> {
    match (left.scalar_value()?, right.scalar_value()?) {
        (Some(a), Some(b)) => {
            // the folded value still spans whatever the operands are bound to
            let shape = if left.is_bound() || !right.is_bound() {
                left
            } else {
                right
            };
            let shape = computed_child(shape)?;
            Ok(Output::single(
                vec![op.apply(a, b); shape.size()],
                shape.axis.clone(),
            ))
        }
        (None, Some(b)) => {
            let left = computed_child(left)?;
            Ok(broadcast(op, left, b, false))
        }
        (Some(a), None) => {
            let right = computed_child(right)?;
            Ok(broadcast(op, right, a, true))
        }
        (None, None) => {
            let left = computed_child(left)?;
            let right = computed_child(right)?;
            combine(op, left, right)
        }
    }
}

fn combine(op: BinOp, left: &IndicatorImp, right: &IndicatorImp) -> Result<Output> {
    let len = left.size();
    if len != right.size() {
        return Err(IndicatorError::Alignment(format!(
            "{} has {} positions but {} has {}",
            left.name,
            len,
            right.name,
            right.size()
        )));
    }
    if let (Some(a), Some(b)) = (&left.axis, &right.axis) {
        if !Arc::ptr_eq(a, b) && a != b {
            return Err(IndicatorError::Alignment(format!(
                "timestamp axes of {} and {} differ",
                left.name, right.name
            )));
        }
    }

    let discard = left.discard.max(right.discard);
    let count = left.result_count().min(right.result_count());
    let results = (0..count)
        .map(|ch| {
            let (l, r) = (&left.results[ch], &right.results[ch]);
            (0..len)
                .map(|i| {
                    if i < discard {
                        NULL_PRICE
                    } else {
                        op.apply(l[i], r[i])
                    }
                })
                .collect()
        })
        .collect();

    Ok(Output {
        results,
        discard,
        axis: left.axis.clone().or_else(|| right.axis.clone()),
    })
}
