//! Typed coercion of feature-service attribute values.
//!
//! Upstream declares a type per field in the response metadata; we coerce
//! every raw JSON value against that declaration instead of trusting the
//! JSON lexer. The recognized declarations form a closed set, and anything
//! outside it degrades to opaque text rather than being guessed at.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::PipelineError;

/// Field types recognized in response metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Declared integer: only JSON integers are accepted.
    Integer,
    /// Object identifier: integer-valued, handled like `Integer`.
    ObjectId,
    /// Declared double: integers and floats both accepted.
    Double,
    /// Millisecond epoch timestamp (UTC).
    Date,
    /// Declared text, or any declaration we do not recognize.
    Text,
}

impl FieldKind {
    /// Map an upstream type declaration to a kind, `None` if unrecognized.
    pub fn from_declared(declared: &str) -> Option<Self> {
        match declared {
            "esriFieldTypeInteger" => Some(Self::Integer),
            "esriFieldTypeOID" => Some(Self::ObjectId),
            "esriFieldTypeDouble" => Some(Self::Double),
            "esriFieldTypeDate" => Some(Self::Date),
            "esriFieldTypeString" => Some(Self::Text),
            _ => None,
        }
    }
}

/// A coerced attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedField {
    Integer(i64),
    Decimal(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl TypedField {
    /// Read this value as a whole count if it is numerically one.
    ///
    /// Decimals are accepted because aggregate statistics come back declared
    /// as doubles even when every value is a whole count; they are truncated
    /// toward zero. Non-finite decimals and non-numeric values yield `None`.
    pub fn as_count(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Decimal(v) if v.is_finite() => Some(v.trunc() as i64),
            _ => None,
        }
    }
}

/// One decoded row, keyed by attribute name.
pub type TypedRow = BTreeMap<String, TypedField>;

/// Running per-field sums over the numeric values of one decode pass.
///
/// A fresh instance is created per pass; sums never leak across queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTotals {
    sums: BTreeMap<String, f64>,
}

impl FieldTotals {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, field: &str, value: f64) {
        *self.sums.entry(field.to_string()).or_insert(0.0) += value;
    }

    /// Sum of all numeric values seen for `field`, `None` if none were.
    pub fn sum(&self, field: &str) -> Option<f64> {
        self.sums.get(field).copied()
    }

    /// Sum of `field` as a whole count (truncated toward zero).
    pub fn sum_as_count(&self, field: &str) -> Option<i64> {
        self.sum(field).filter(|v| v.is_finite()).map(|v| v.trunc() as i64)
    }
}

/// Coerce one raw attribute value against its declared kind.
pub fn coerce(kind: FieldKind, field: &str, raw: &Value) -> Result<TypedField, PipelineError> {
    match kind {
        FieldKind::Integer | FieldKind::ObjectId => raw
            .as_i64()
            .map(TypedField::Integer)
            .ok_or_else(|| mismatch(field, "an integer", raw)),
        FieldKind::Double => {
            if let Some(v) = raw.as_i64() {
                Ok(TypedField::Decimal(v as f64))
            } else if let Some(v) = raw.as_f64() {
                Ok(TypedField::Decimal(v))
            } else {
                Err(mismatch(field, "a number", raw))
            }
        }
        FieldKind::Date => {
            let millis = raw
                .as_i64()
                .ok_or_else(|| mismatch(field, "a millisecond timestamp", raw))?;
            DateTime::from_timestamp_millis(millis)
                .map(TypedField::Timestamp)
                .ok_or_else(|| mismatch(field, "a representable timestamp", raw))
        }
        FieldKind::Text => Ok(TypedField::Text(match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
    }
}

/// Coerce one attribute and fold numeric results into the running totals.
pub fn coerce_into(
    kind: FieldKind,
    field: &str,
    raw: &Value,
    totals: &mut FieldTotals,
) -> Result<TypedField, PipelineError> {
    let typed = coerce(kind, field, raw)?;
    match &typed {
        TypedField::Integer(v) => totals.add(field, *v as f64),
        TypedField::Decimal(v) => totals.add(field, *v),
        TypedField::Timestamp(_) | TypedField::Text(_) => {}
    }
    Ok(typed)
}

fn mismatch(field: &str, expected: &'static str, raw: &Value) -> PipelineError {
    PipelineError::TypeMismatch {
        field: field.to_string(),
        expected,
        value: raw.to_string(),
    }
}
