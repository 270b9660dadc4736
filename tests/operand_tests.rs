//! Integration tests for re-appliable operand expressions

mod common;

use common::*;
use rusty_indicator::prelude::*;

fn scale(factor: f64) -> Operand {
    let ind = Indicator::from_formula(Scale);
    ind.set_param("factor", factor);
    Operand::new(&ind)
}

#[test]
fn test_calculate_against_different_inputs() {
    init_logging();
    let provider = provider();
    let expr = scale(2.0) + Operand::identity();

    let x = expr.calculate(&close_x(&provider));
    assert_eq!(x.get(0, 0).unwrap(), 30.0);
    assert_eq!(x.formula(), "(SCALE(CLOSE) + IDENT(CLOSE))");

    let close_y = Indicator::close();
    close_y
        .set_context(&provider, &asset_y(), &Query::all())
        .unwrap();
    let y = expr.calculate(&close_y);
    assert_eq!(y.get(0, 0).unwrap(), 300.0);
    assert_eq!(y.get_datetime(0).unwrap(), Some(day(0)));

    // the first result is unaffected by the second evaluation
    assert_eq!(x.get(1, 0).unwrap(), 33.0);
}

#[test]
fn test_operators() {
    let provider = provider();
    let close = close_x(&provider);

    let diff = (scale(3.0) - scale(1.0)).calculate(&close);
    assert_eq!(diff.get(0, 0).unwrap(), 20.0);
    let product = (&scale(2.0) * &scale(2.0)).calculate(&close);
    assert_eq!(product.get(0, 0).unwrap(), 400.0);
    let ratio = (scale(3.0) / scale(1.5)).calculate(&close);
    assert_eq!(ratio.get(5, 0).unwrap(), 2.0);
    let zero = (scale(1.0) / scale(0.0)).calculate(&close);
    assert!(is_null(zero.get(0, 0).unwrap()));
}

#[test]
fn test_leaf_is_a_private_copy() {
    let provider = provider();
    let ind = Indicator::from_formula(Scale);
    let expr = Operand::new(&ind);
    ind.set_param("factor", 5.0);

    let out = expr.calculate(&close_x(&provider));
    assert_eq!(out.get(0, 0).unwrap(), 10.0);
}

#[test]
fn test_apply_operand_composes_without_evaluating() {
    let provider = provider();
    let inner = scale(2.0) + Operand::identity();
    let outer = scale(10.0);
    let nested = outer.apply_operand(&inner);

    assert_eq!(nested.formula(), "SCALE((SCALE + IDENT))");
    let out = nested.calculate(&close_x(&provider));
    assert_eq!(out.get(0, 0).unwrap(), 300.0);
}

#[test]
fn test_rendering_matches_indicator_formula() {
    let a = Indicator::from_formula(Scale);
    let b = Indicator::identity();
    let expr = Operand::new(&a) + Operand::new(&b);
    let composed = &a + &b;

    assert_eq!(expr.to_string(), composed.formula());
    assert_eq!(expr.name(), "(SCALE + IDENT)");
}

#[test]
fn test_constant_only_leaf_spans_the_input() {
    let provider = provider();
    let expr = Operand::new(&(Indicator::constant(2.0) * 3.0)) + Operand::identity();

    let out = expr.calculate(&close_x(&provider));
    assert_eq!(out.size().unwrap(), 30);
    assert_eq!(out.get(0, 0).unwrap(), 16.0);
    assert_eq!(out.get_datetime(29).unwrap(), Some(day(29)));
}

#[test]
fn test_naming() {
    let mut expr = scale(2.0) - Operand::identity();
    let unnamed = expr.clone();
    expr.set_name("excess");

    assert_eq!(expr.name(), "excess");
    assert_eq!(unnamed.name(), "(SCALE - IDENT)");
    assert_eq!(expr.to_string(), unnamed.to_string());
}

#[test]
fn test_operand_json_round_trip() {
    let provider = provider();
    let mut expr = scale(2.0).apply_operand(&(Operand::identity() - scale(0.5)));
    expr.set_name("half");

    let json = expr.to_json().unwrap();
    let back = Operand::from_json(&json, &registry()).unwrap();
    assert_eq!(back.name(), "half");
    assert_eq!(back.formula(), expr.formula());

    let close = close_x(&provider);
    let (a, b) = (expr.calculate(&close), back.calculate(&close));
    assert_eq!(
        a.get_result_as_price_list(0).unwrap(),
        b.get_result_as_price_list(0).unwrap()
    );
    assert_eq!(a.get(0, 0).unwrap(), 10.0);

    assert!(matches!(
        Operand::from_json(&json, &FormulaRegistry::new()),
        Err(IndicatorError::UnknownFormula(_))
    ));
}
