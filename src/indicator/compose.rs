//! Building derived nodes from two operands and an operator.
//!
//! Composition never fails and never evaluates anything: the operands are
//! snapshotted (cached results included) into a new binary node, and length
//! or axis mismatches surface as [`IndicatorError::Alignment`] on first read.
//!
//! [`IndicatorError::Alignment`]: crate::error::IndicatorError::Alignment

use super::handle::Indicator;
use super::imp::IndicatorImp;
use super::op::BinOp;
use crate::types::Price;
use std::ops;

/// Either side of a composition
#[derive(Debug, Clone)]
pub enum Term {
    Indicator(Indicator),
    Scalar(Price),
}

impl Term {
    fn into_imp(self) -> IndicatorImp {
        match self {
            Term::Indicator(ind) => ind.snapshot(),
            Term::Scalar(value) => IndicatorImp::constant(value),
        }
    }
}

impl From<Indicator> for Term {
    fn from(ind: Indicator) -> Self {
        Term::Indicator(ind)
    }
}

impl From<&Indicator> for Term {
    fn from(ind: &Indicator) -> Self {
        Term::Indicator(ind.clone())
    }
}

impl From<Price> for Term {
    fn from(value: Price) -> Self {
        Term::Scalar(value)
    }
}

/// New node applying `op` element-wise to `lhs` and `rhs`
pub fn binary(op: BinOp, lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    // snapshot one side at a time so `x op x` never holds two locks on one node
    let left = lhs.into().into_imp();
    let right = rhs.into().into_imp();
    Indicator::from_imp(IndicatorImp::binary(op, left, right))
}

pub fn add(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Add, lhs, rhs)
}

pub fn subtract(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Sub, lhs, rhs)
}

pub fn multiply(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Mul, lhs, rhs)
}

/// Division by zero yields null at that position
pub fn divide(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Div, lhs, rhs)
}

pub fn modulo(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Mod, lhs, rhs)
}

/// 1.0 where the operands differ by less than [`EQ_THRESHOLD`](super::op::EQ_THRESHOLD)
pub fn equal(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Eq, lhs, rhs)
}

pub fn not_equal(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Ne, lhs, rhs)
}

pub fn greater(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Gt, lhs, rhs)
}

pub fn less(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Lt, lhs, rhs)
}

pub fn greater_equal(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Ge, lhs, rhs)
}

pub fn less_equal(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Le, lhs, rhs)
}

/// Logical and: 1.0 where both operands are truthy
pub fn and(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::And, lhs, rhs)
}

/// Logical or: 1.0 where either operand is truthy
pub fn or(lhs: impl Into<Term>, rhs: impl Into<Term>) -> Indicator {
    binary(BinOp::Or, lhs, rhs)
}

macro_rules! impl_indicator_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait<Indicator> for Indicator {
            type Output = Indicator;
            fn $method(self, rhs: Indicator) -> Indicator {
                binary($op, self, rhs)
            }
        }

        impl ops::$trait<&Indicator> for Indicator {
            type Output = Indicator;
            fn $method(self, rhs: &Indicator) -> Indicator {
                binary($op, self, rhs)
            }
        }

        impl ops::$trait<Indicator> for &Indicator {
            type Output = Indicator;
            fn $method(self, rhs: Indicator) -> Indicator {
                binary($op, self, rhs)
            }
        }

        impl ops::$trait<&Indicator> for &Indicator {
            type Output = Indicator;
            fn $method(self, rhs: &Indicator) -> Indicator {
                binary($op, self, rhs)
            }
        }

        impl ops::$trait<Price> for Indicator {
            type Output = Indicator;
            fn $method(self, rhs: Price) -> Indicator {
                binary($op, self, rhs)
            }
        }

        impl ops::$trait<Price> for &Indicator {
            type Output = Indicator;
            fn $method(self, rhs: Price) -> Indicator {
                binary($op, self, rhs)
            }
        }

        impl ops::$trait<Indicator> for Price {
            type Output = Indicator;
            fn $method(self, rhs: Indicator) -> Indicator {
                binary($op, self, rhs)
            }
        }

        impl ops::$trait<&Indicator> for Price {
            type Output = Indicator;
            fn $method(self, rhs: &Indicator) -> Indicator {
                binary($op, self, rhs)
            }
        }
    };
}

impl_indicator_op!(Add, add, BinOp::Add);
impl_indicator_op!(Sub, sub, BinOp::Sub);
impl_indicator_op!(Mul, mul, BinOp::Mul);
impl_indicator_op!(Div, div, BinOp::Div);
impl_indicator_op!(Rem, rem, BinOp::Mod);
impl_indicator_op!(BitAnd, bitand, BinOp::And);
impl_indicator_op!(BitOr, bitor, BinOp::Or);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::indicator::{Formula, FormulaInput, FormulaOutput, NodeState};
    use crate::param::Parameters;
    use crate::types::is_null;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Pass-through that counts its evaluations
    #[derive(Debug, Clone)]
    struct Counted(Arc<AtomicUsize>);

    impl Formula for Counted {
        fn name(&self) -> &str {
            "COUNTED"
        }

        fn calculate(
            &self,
            input: &FormulaInput<'_>,
            _params: &Parameters,
            out: &mut FormulaOutput,
        ) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if let (Some(src), Some(dst)) = (input.channel(0), out.channel_mut(0)) {
                dst.copy_from_slice(src);
            }
            Ok(())
        }

        fn clone_box(&self) -> Box<dyn Formula> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_operators_and_named_functions_agree() {
        let a = Indicator::from_prices(vec![1.0, 2.0, 3.0]);
        let b = Indicator::from_prices(vec![3.0, 2.0, 1.0]);

        let by_op = &a - &b;
        let by_fn = subtract(&a, &b);
        assert_eq!(
            by_op.get_result_as_price_list(0).unwrap(),
            by_fn.get_result_as_price_list(0).unwrap()
        );
        assert_eq!(by_op.get(0, 0).unwrap(), -2.0);
        assert_eq!(by_op.formula(), "(PRICELIST - PRICELIST)");
        assert_eq!(by_op.name(), "SUB");
    }

    #[test]
    fn test_scalar_on_either_side() {
        let x = Indicator::from_prices(vec![2.0, 4.0]);
        assert_eq!((&x / 2.0).get(1, 0).unwrap(), 2.0);
        assert_eq!((8.0 / &x).get(1, 0).unwrap(), 2.0);
        assert_eq!((10.0 - &x).get(0, 0).unwrap(), 8.0);
        assert_eq!((10.0 - &x).formula(), "(10 - PRICELIST)");
    }

    #[test]
    fn test_comparison_and_logic() {
        let x = Indicator::from_prices(vec![1.0, 2.0, 3.0]);
        let above = greater(&x, 1.5);
        let below = less(&x, 2.5);
        let both = &above & &below;
        assert_eq!(both.get_result_as_price_list(0).unwrap(), vec![0.0, 1.0, 0.0]);
        let either = above | below;
        assert_eq!(either.get_result_as_price_list(0).unwrap(), vec![1.0, 1.0, 1.0]);
        assert_eq!(equal(&x, 2.0).get(1, 0).unwrap(), 1.0);
        assert_eq!(not_equal(&x, 2.0).get(1, 0).unwrap(), 0.0);
        assert_eq!(greater_equal(&x, 3.0).get(2, 0).unwrap(), 1.0);
        assert_eq!(less_equal(&x, 0.0).get(0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_self_composition() {
        let x = Indicator::from_prices(vec![1.5, 2.0]);
        let doubled = &x + &x;
        assert_eq!(doubled.get(0, 0).unwrap(), 3.0);
        assert_eq!(multiply(&x, &x).get(1, 0).unwrap(), 4.0);
        assert!(is_null(modulo(&x, 0.0).get(0, 0).unwrap()));
    }

    #[test]
    fn test_composition_is_isolated_from_later_operand_changes() {
        let a = Indicator::from_prices(vec![1.0, 2.0, 3.0]);
        let sum = add(&a, 1.0);
        a.set_discard(2);
        assert_eq!(sum.discard().unwrap(), 0);
        assert_eq!(sum.get(0, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_composition_reuses_evaluated_operands() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Indicator::from_formula(Counted(Arc::clone(&calls)))
            .apply(&Indicator::from_prices(vec![1.0; 50]));
        let mut chain = counted.clone();
        for _ in 0..100 {
            chain = &chain + &counted;
        }
        assert_eq!(chain.get(0, 0).unwrap(), 101.0);
        let evaluated = calls.load(Ordering::SeqCst);

        let doubled = &chain * 2.0;
        assert_eq!(doubled.state(), NodeState::Pending);
        assert_eq!(doubled.get(49, 0).unwrap(), 202.0);
        assert_eq!(calls.load(Ordering::SeqCst), evaluated);
    }
}
