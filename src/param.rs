//! Named, typed parameters attached to every indicator node

use crate::error::{IndicatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Name of the stored type, used in mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "string",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Rust types that can be stored in and fetched from a [`Parameters`] bag
pub trait ParamType: Sized {
    /// Type name reported in mismatch errors
    const TYPE_NAME: &'static str;

    /// Extract from a stored value; `None` on type mismatch
    fn from_value(value: &ParamValue) -> Option<Self>;

    /// Wrap into a stored value
    fn into_value(self) -> ParamValue;
}

impl ParamType for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn into_value(self) -> ParamValue {
        ParamValue::Bool(self)
    }
}

impl ParamType for i64 {
    const TYPE_NAME: &'static str = "int";

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn into_value(self) -> ParamValue {
        ParamValue::Int(self)
    }
}

impl ParamType for i32 {
    const TYPE_NAME: &'static str = "int";

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }

    fn into_value(self) -> ParamValue {
        ParamValue::Int(self as i64)
    }
}

impl ParamType for usize {
    const TYPE_NAME: &'static str = "int";

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }

    fn into_value(self) -> ParamValue {
        ParamValue::Int(self as i64)
    }
}

impl ParamType for f64 {
    const TYPE_NAME: &'static str = "float";

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn into_value(self) -> ParamValue {
        ParamValue::Float(self)
    }
}

impl ParamType for String {
    const TYPE_NAME: &'static str = "string";

    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn into_value(self) -> ParamValue {
        ParamValue::Text(self)
    }
}

/// Parameter bag, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    values: BTreeMap<String, ParamValue>,
}

impl Parameters {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed lookup; fails with `ParamNotFound` or `TypeMismatch`
    pub fn get<T: ParamType>(&self, name: &str) -> Result<T> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| IndicatorError::ParamNotFound(name.to_string()))?;
        T::from_value(value).ok_or_else(|| IndicatorError::TypeMismatch {
            name: name.to_string(),
            expected: T::TYPE_NAME,
            found: value.type_name(),
        })
    }

    /// Insert or overwrite
    pub fn set<T: ParamType>(&mut self, name: impl Into<String>, value: T) {
        self.values.insert(name.into(), value.into_value());
    }

    /// Untyped lookup
    pub fn get_value(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Untyped insert or overwrite
    pub fn set_value(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    /// Whether a parameter exists
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `name1=v1,name2=v2` rendering used by long names
    pub fn name_value_list(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_get_set() {
        let mut params = Parameters::new();
        params.set("n", 20usize);
        params.set("alpha", 0.5);
        params.set("fill", true);
        params.set("kind", "close".to_string());

        assert_eq!(params.get::<usize>("n").unwrap(), 20);
        assert_eq!(params.get::<i64>("n").unwrap(), 20);
        assert_eq!(params.get::<f64>("alpha").unwrap(), 0.5);
        assert!(params.get::<bool>("fill").unwrap());
        assert_eq!(params.get::<String>("kind").unwrap(), "close");
    }

    #[test]
    fn test_not_found_and_mismatch() {
        let mut params = Parameters::new();
        params.set("n", 20i64);

        assert!(matches!(
            params.get::<i64>("missing"),
            Err(IndicatorError::ParamNotFound(_))
        ));
        match params.get::<f64>("n") {
            Err(IndicatorError::TypeMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, "float");
                assert_eq!(found, "int");
            }
            other => panic!("unexpected: {:?}", other),
        }
        params.set("neg", -1i64);
        assert!(params.get::<usize>("neg").is_err());
    }

    #[test]
    fn test_overwrite_and_contains() {
        let mut params = Parameters::new();
        assert!(!params.contains("n"));
        params.set("n", 1i64);
        params.set("n", 2.5);
        assert!(params.contains("n"));
        assert_eq!(params.len(), 1);
        assert_eq!(params.get::<f64>("n").unwrap(), 2.5);
    }

    #[test]
    fn test_name_value_list_sorted() {
        let mut params = Parameters::new();
        params.set("slow", 26i64);
        params.set("fast", 12i64);
        assert_eq!(params.name_value_list(), "fast=12,slow=26");
        assert_eq!(Parameters::new().name_value_list(), "");
    }

    #[test]
    fn test_serde_shape() {
        let mut params = Parameters::new();
        params.set("n", 3i64);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"n":{"type":"int","value":3}}"#);
        let back: Parameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
