//! Re-appliable indicator expressions.
//!
//! An [`Operand`] is an immutable tree of indicator leaves joined by
//! operators. It holds no data: [`Operand::calculate`] applies every leaf to
//! the supplied input and combines the results, so one expression can be
//! evaluated against any number of inputs.

use crate::error::Result;
use crate::indicator::compose::binary;
use crate::indicator::{BinOp, FormulaRegistry, Indicator, IndicatorDef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops;
use std::sync::Arc;

#[derive(Debug)]
enum OperandNode {
    Leaf(Indicator),
    Binary {
        op: BinOp,
        left: Arc<OperandNode>,
        right: Arc<OperandNode>,
    },
    /// `outer` evaluated on the result of `inner`
    Apply {
        outer: Arc<OperandNode>,
        inner: Arc<OperandNode>,
    },
}

impl OperandNode {
    fn calculate(&self, input: &Indicator) -> Indicator {
        match self {
            OperandNode::Leaf(ind) => ind.apply(input),
            OperandNode::Binary { op, left, right } => {
                binary(*op, left.calculate(input), right.calculate(input))
            }
            OperandNode::Apply { outer, inner } => outer.calculate(&inner.calculate(input)),
        }
    }

    fn render(&self) -> String {
        match self {
            OperandNode::Leaf(ind) => ind.formula(),
            OperandNode::Binary { op, left, right } => {
                format!("({} {} {})", left.render(), op.symbol(), right.render())
            }
            OperandNode::Apply { outer, inner } => {
                format!("{}({})", outer.render(), inner.render())
            }
        }
    }

    fn to_def(&self) -> OperandNodeDef {
        match self {
            OperandNode::Leaf(ind) => OperandNodeDef::Leaf {
                indicator: ind.to_def(),
            },
            OperandNode::Binary { op, left, right } => OperandNodeDef::Binary {
                op: *op,
                left: Box::new(left.to_def()),
                right: Box::new(right.to_def()),
            },
            OperandNode::Apply { outer, inner } => OperandNodeDef::Apply {
                outer: Box::new(outer.to_def()),
                inner: Box::new(inner.to_def()),
            },
        }
    }

    fn from_def(def: &OperandNodeDef, registry: &FormulaRegistry) -> Result<Self> {
        Ok(match def {
            OperandNodeDef::Leaf { indicator } => {
                OperandNode::Leaf(Indicator::from_def(indicator, registry)?)
            }
            OperandNodeDef::Binary { op, left, right } => OperandNode::Binary {
                op: *op,
                left: Arc::new(OperandNode::from_def(left, registry)?),
                right: Arc::new(OperandNode::from_def(right, registry)?),
            },
            OperandNodeDef::Apply { outer, inner } => OperandNode::Apply {
                outer: Arc::new(OperandNode::from_def(outer, registry)?),
                inner: Arc::new(OperandNode::from_def(inner, registry)?),
            },
        })
    }
}

/// Immutable expression over indicators, evaluated against an input on demand
#[derive(Debug, Clone)]
pub struct Operand {
    root: Arc<OperandNode>,
    name: Option<String>,
}

impl Operand {
    /// Leaf wrapping a private copy of `ind`; later changes to `ind` are not seen
    pub fn new(ind: &Indicator) -> Self {
        Self::from_node(OperandNode::Leaf(ind.deep_clone()))
    }

    /// Expression returning its input unchanged
    pub fn identity() -> Self {
        Self::new(&Indicator::identity())
    }

    fn from_node(node: OperandNode) -> Self {
        Self {
            root: Arc::new(node),
            name: None,
        }
    }

    /// New tree joining two trees under `op`
    pub fn combine(op: BinOp, lhs: &Operand, rhs: &Operand) -> Operand {
        Self::from_node(OperandNode::Binary {
            op,
            left: lhs.root.clone(),
            right: rhs.root.clone(),
        })
    }

    /// New tree that evaluates `self` on the result of `inner`
    pub fn apply_operand(&self, inner: &Operand) -> Operand {
        Self::from_node(OperandNode::Apply {
            outer: self.root.clone(),
            inner: inner.root.clone(),
        })
    }

    /// Evaluate against `input`; the result computes lazily like any indicator
    pub fn calculate(&self, input: &Indicator) -> Indicator {
        self.root.calculate(input)
    }

    /// Explicit name, or the rendered formula
    pub fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.formula())
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Infix rendering of the tree
    pub fn formula(&self) -> String {
        self.root.render()
    }

    pub fn to_def(&self) -> OperandDef {
        OperandDef {
            name: self.name.clone(),
            root: self.root.to_def(),
        }
    }

    pub fn from_def(def: &OperandDef, registry: &FormulaRegistry) -> Result<Operand> {
        Ok(Operand {
            root: Arc::new(OperandNode::from_def(&def.root, registry)?),
            name: def.name.clone(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_def())?)
    }

    pub fn from_json(json: &str, registry: &FormulaRegistry) -> Result<Operand> {
        let def: OperandDef = serde_json::from_str(json)?;
        Operand::from_def(&def, registry)
    }
}

impl Default for Operand {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<&Indicator> for Operand {
    fn from(ind: &Indicator) -> Self {
        Operand::new(ind)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formula())
    }
}

/// Serializable form of an [`Operand`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperandDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub root: OperandNodeDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OperandNodeDef {
    Leaf {
        indicator: IndicatorDef,
    },
    Binary {
        op: BinOp,
        left: Box<OperandNodeDef>,
        right: Box<OperandNodeDef>,
    },
    Apply {
        outer: Box<OperandNodeDef>,
        inner: Box<OperandNodeDef>,
    },
}

macro_rules! impl_operand_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait<Operand> for Operand {
            type Output = Operand;
            fn $method(self, rhs: Operand) -> Operand {
                Operand::combine($op, &self, &rhs)
            }
        }

        impl ops::$trait<&Operand> for &Operand {
            type Output = Operand;
            fn $method(self, rhs: &Operand) -> Operand {
                Operand::combine($op, self, rhs)
            }
        }
    };
}

impl_operand_op!(Add, add, BinOp::Add);
impl_operand_op!(Sub, sub, BinOp::Sub);
impl_operand_op!(Mul, mul, BinOp::Mul);
impl_operand_op!(Div, div, BinOp::Div);
