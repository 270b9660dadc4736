//! Structural form of an indicator tree: identity, parameters, discard and
//! children, without computed buffers or bound data. Rebuilding yields an
//! equivalent unevaluated node that recomputes once a context is bound.

use super::formula::FormulaRegistry;
use super::handle::Indicator;
use super::imp::{IndicatorImp, NodeKind};
use super::op::BinOp;
use crate::data::PriceField;
use crate::error::{IndicatorError, Result};
use crate::param::Parameters;
use crate::types::{is_null, Price, Timestamp, NULL_PRICE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Serializable description of one node and everything it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub params: Parameters,
    /// Requested warm-up region
    #[serde(default)]
    pub discard: usize,
    #[serde(flatten)]
    pub node: NodeDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Box<IndicatorDef>>,
}

/// Node variant; nulls in fixed series are written as `null`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeDef {
    Source {
        field: PriceField,
    },
    Constant,
    Series {
        values: Vec<Vec<Option<Price>>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamps: Option<Vec<Timestamp>>,
        #[serde(default)]
        discard: usize,
    },
    Formula {
        formula: String,
    },
    Binary {
        op: BinOp,
        left: Box<IndicatorDef>,
        right: Box<IndicatorDef>,
    },
}

impl IndicatorImp {
    pub(crate) fn to_def(&self) -> IndicatorDef {
        let node = match &self.kind {
            NodeKind::Source(field) => NodeDef::Source { field: *field },
            NodeKind::Constant => NodeDef::Constant,
            NodeKind::Series {
                values,
                axis,
                discard,
            } => NodeDef::Series {
                values: values
                    .iter()
                    .map(|ch| ch.iter().map(|&v| (!is_null(v)).then_some(v)).collect())
                    .collect(),
                timestamps: axis.as_ref().map(|a| a.to_vec()),
                discard: *discard,
            },
            NodeKind::Formula(formula) => NodeDef::Formula {
                formula: formula.name().to_string(),
            },
            NodeKind::Binary { op, left, right } => NodeDef::Binary {
                op: *op,
                left: Box::new(left.to_def()),
                right: Box::new(right.to_def()),
            },
        };
        IndicatorDef {
            name: self.name.clone(),
            params: self.params.clone(),
            discard: self.requested_discard,
            node,
            input: self.input.as_ref().map(|i| Box::new(i.to_def())),
        }
    }

    pub(crate) fn from_def(def: &IndicatorDef, registry: &FormulaRegistry) -> Result<Self> {
        let mut imp = match &def.node {
            NodeDef::Source { field } => IndicatorImp::source(*field),
            NodeDef::Constant => IndicatorImp::new("CVAL", NodeKind::Constant, Parameters::new()),
            NodeDef::Series {
                values,
                timestamps,
                discard,
            } => {
                let values: Vec<Vec<Price>> = values
                    .iter()
                    .map(|ch| ch.iter().map(|v| v.unwrap_or(NULL_PRICE)).collect())
                    .collect();
                let len = values.first().map(Vec::len).unwrap_or(0);
                if values.iter().any(|ch| ch.len() != len) {
                    return Err(IndicatorError::DataError(format!(
                        "result sets of {} differ in length",
                        def.name
                    )));
                }
                if let Some(ts) = timestamps {
                    if ts.len() != len {
                        return Err(IndicatorError::DataError(format!(
                            "{} has {} timestamps for {} values",
                            def.name,
                            ts.len(),
                            len
                        )));
                    }
                }
                IndicatorImp::series(values, timestamps.clone().map(Arc::new), *discard)
            }
            NodeDef::Formula { formula } => IndicatorImp::formula(registry.create(formula)?),
            NodeDef::Binary { op, left, right } => IndicatorImp::binary(
                *op,
                IndicatorImp::from_def(left, registry)?,
                IndicatorImp::from_def(right, registry)?,
            ),
        };
        imp.name = def.name.clone();
        imp.params = def.params.clone();
        if let Some(input) = &def.input {
            imp.input = Some(Arc::new(IndicatorImp::from_def(input, registry)?));
        }
        imp.set_discard(def.discard);
        imp.invalidate();
        Ok(imp)
    }
}

impl Indicator {
    /// Structural description of this node
    pub fn to_def(&self) -> IndicatorDef {
        self.snapshot().to_def()
    }

    /// Rebuild an unevaluated node; formula nodes are created through `registry`
    pub fn from_def(def: &IndicatorDef, registry: &FormulaRegistry) -> Result<Indicator> {
        IndicatorImp::from_def(def, registry).map(Indicator::from_imp)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_def())?)
    }

    pub fn from_json(json: &str, registry: &FormulaRegistry) -> Result<Indicator> {
        let def: IndicatorDef = serde_json::from_str(json)?;
        Indicator::from_def(&def, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::compose::add;

    #[test]
    fn test_json_shape() {
        let ind = add(Indicator::close(), 1.0);
        let value: serde_json::Value = serde_json::from_str(&ind.to_json().unwrap()).unwrap();

        assert_eq!(value["kind"], "binary");
        assert_eq!(value["op"], "add");
        assert_eq!(value["left"]["kind"], "source");
        assert_eq!(value["left"]["field"], "close");
        assert_eq!(value["right"]["params"]["value"]["value"], 1.0);
    }

    #[test]
    fn test_series_nulls_and_discard_survive() {
        let ind = Indicator::from_prices(vec![1.0, NULL_PRICE, 3.0]);
        ind.set_discard(1);
        let back = Indicator::from_json(&ind.to_json().unwrap(), &FormulaRegistry::new()).unwrap();

        assert_eq!(back.discard().unwrap(), 1);
        assert!(is_null(back.get(1, 0).unwrap()));
        assert_eq!(back.get(2, 0).unwrap(), 3.0);
    }

    #[test]
    fn test_unknown_formula_rejected() {
        let def = IndicatorDef {
            name: "MA".to_string(),
            params: Parameters::new(),
            discard: 0,
            node: NodeDef::Formula {
                formula: "MA".to_string(),
            },
            input: None,
        };
        assert!(matches!(
            Indicator::from_def(&def, &FormulaRegistry::new()),
            Err(IndicatorError::UnknownFormula(_))
        ));
    }

    #[test]
    fn test_ragged_series_rejected() {
        let def = IndicatorDef {
            name: "PRICELIST".to_string(),
            params: Parameters::new(),
            discard: 0,
            node: NodeDef::Series {
                values: vec![vec![Some(1.0)], vec![]],
                timestamps: None,
                discard: 0,
            },
            input: None,
        };
        assert!(Indicator::from_def(&def, &FormulaRegistry::new()).is_err());
    }
}
