//! Operator tags for composed indicator nodes

use crate::types::{is_null, Price, NULL_PRICE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used by equality, ordering and truthiness tests
pub const EQ_THRESHOLD: f64 = 0.000001;

/// Binary operation applied element-wise between two operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Or,
}

impl BinOp {
    /// Infix symbol used in formula rendering
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Gt => ">",
            BinOp::Lt => "<",
            BinOp::Ge => ">=",
            BinOp::Le => "<=",
            BinOp::And => "&",
            BinOp::Or => "|",
        }
    }

    /// Name given to nodes built from this operation
    pub fn node_name(&self) -> &'static str {
        match self {
            BinOp::Add => "ADD",
            BinOp::Sub => "SUB",
            BinOp::Mul => "MUL",
            BinOp::Div => "DIV",
            BinOp::Mod => "MOD",
            BinOp::Eq => "EQ",
            BinOp::Ne => "NE",
            BinOp::Gt => "GT",
            BinOp::Lt => "LT",
            BinOp::Ge => "GE",
            BinOp::Le => "LE",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        }
    }

    /// Arithmetic operations (`+ - * / %`)
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod
        )
    }

    /// Comparisons, producing 1.0 / 0.0
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Gt | BinOp::Lt | BinOp::Ge | BinOp::Le
        )
    }

    /// Logical and/or on truthiness
    pub fn is_logical(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    /// Whether swapping the operands leaves the result unchanged
    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Mul | BinOp::Eq | BinOp::Ne | BinOp::And | BinOp::Or
        )
    }

    /// Apply to one pair of values. Null in, null out; division or modulo by zero is null.
    pub fn apply(&self, a: Price, b: Price) -> Price {
        if is_null(a) || is_null(b) {
            return NULL_PRICE;
        }
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => {
                if b == 0.0 {
                    NULL_PRICE
                } else {
                    a / b
                }
            }
            BinOp::Mod => {
                if b == 0.0 {
                    NULL_PRICE
                } else {
                    a % b
                }
            }
            BinOp::Eq => flag((a - b).abs() < EQ_THRESHOLD),
            BinOp::Ne => flag((a - b).abs() >= EQ_THRESHOLD),
            BinOp::Gt => flag(a - b >= EQ_THRESHOLD),
            BinOp::Lt => flag(b - a >= EQ_THRESHOLD),
            BinOp::Ge => flag(b - a < EQ_THRESHOLD),
            BinOp::Le => flag(a - b < EQ_THRESHOLD),
            BinOp::And => flag(a >= EQ_THRESHOLD && b >= EQ_THRESHOLD),
            BinOp::Or => flag(a >= EQ_THRESHOLD || b >= EQ_THRESHOLD),
        }
    }
}

fn flag(value: bool) -> Price {
    if value {
        1.0
    } else {
        0.0
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
