//! Composable indicator nodes.
//!
//! An [`Indicator`] is a shared handle over a computation node. Nodes are
//! raw price sources, constants, fixed series, hosted [`Formula`]s, or
//! binary compositions of other nodes. Every node owns one or more result
//! sets aligned to a single timestamp axis, plus a leading warm-up region
//! (`discard`) in which every value is null.

pub mod compose;
pub mod def;
pub mod display;
pub mod formula;
mod handle;
mod imp;
pub mod op;

pub use compose::Term;
pub use def::{IndicatorDef, NodeDef};
pub use display::PrintOptions;
pub use formula::{Formula, FormulaFactory, FormulaInput, FormulaOutput, FormulaRegistry, Identity};
pub use handle::{Indicator, IndicatorItem};
pub use op::{BinOp, EQ_THRESHOLD};

/// Recompute state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Nothing bound yet; reads produce empty or unit-length results
    Unbound,
    /// Bound, results stale until the next read
    Pending,
    /// Results cached
    Computed,
    /// Last computation failed and no earlier results exist
    Failed,
}
