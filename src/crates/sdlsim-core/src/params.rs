//! Parameter values, typed coercion, and the per-trial override view
//!
//! Parameters resolve in three layers, highest priority first: the canvas
//! override map (snapshotted at trial start), the instance declaration, and
//! the model's built-in default. [`ParamView`] packages the first two layers
//! for a single instance so component models read one way everywhere.

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declared type of a component parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Bool,
    Int,
    Float,
    Str,
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Str => "string",
        };
        f.write_str(name)
    }
}

/// A scalar parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Str(_) => ParamType::Str,
        }
    }

    /// Coerce to a declared type. Integers widen to floats; everything else
    /// must match exactly.
    pub fn coerce(self, ty: ParamType, path: &str) -> Result<ParamValue, SimError> {
        match (self, ty) {
            (v, t) if v.param_type() == t => Ok(v),
            (ParamValue::Int(i), ParamType::Float) => Ok(ParamValue::Float(i as f64)),
            (v, t) => Err(SimError::TypeMismatch {
                path: path.to_string(),
                expected: t.to_string(),
                found: v.param_type().to_string(),
            }),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ParamValue::Int(i) if *i >= 0 => Some(*i as u64),
            ParamValue::Float(f) if *f >= 0.0 => Some(*f as u64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Snapshot of the canvas override map, keyed by canonical dotted path
/// (`instance.Param`). Taken once per trial so a `set` mid-run affects only
/// subsequent trials.
pub type OverrideMap = HashMap<String, ParamValue>;

/// Read-side view of one instance's parameters for a single trial
pub struct ParamView<'a> {
    /// Canonical instance name within the bound system
    instance: &'a str,
    overrides: &'a OverrideMap,
    declared: &'a HashMap<String, ParamValue>,
}

impl<'a> ParamView<'a> {
    pub fn new(
        instance: &'a str,
        overrides: &'a OverrideMap,
        declared: &'a HashMap<String, ParamValue>,
    ) -> Self {
        ParamView { instance, overrides, declared }
    }

    pub fn instance(&self) -> &str {
        self.instance
    }

    fn lookup(&self, name: &str) -> Option<&ParamValue> {
        let path = format!("{}.{}", self.instance, name);
        self.overrides.get(&path).or_else(|| self.declared.get(name))
    }

    pub fn f64(&self, name: &str, default: f64) -> f64 {
        self.lookup(name).and_then(ParamValue::as_f64).unwrap_or(default)
    }

    pub fn u64(&self, name: &str, default: u64) -> u64 {
        self.lookup(name).and_then(ParamValue::as_u64).unwrap_or(default)
    }

    pub fn usize(&self, name: &str, default: usize) -> usize {
        self.u64(name, default as u64) as usize
    }

    pub fn bool(&self, name: &str, default: bool) -> bool {
        self.lookup(name).and_then(ParamValue::as_bool).unwrap_or(default)
    }

    pub fn str(&self, name: &str, default: &str) -> String {
        self.lookup(name)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }
}
