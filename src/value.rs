//! Resource values and write modes
//!
//! A resource holds either one scalar or an ordered map of small integer
//! indices to scalars (multi-instance). Values are only ever mutated through
//! enabler operations; this module is pure data plus the reader-facing
//! rounding rule.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ResourceType;

/// A single typed scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
}

impl ScalarValue {
    /// The model type this scalar satisfies.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Float(_) => ResourceType::Float,
            Self::Integer(_) => ResourceType::Integer,
            Self::Boolean(_) => ResourceType::Boolean,
            Self::Text(_) => ResourceType::Text,
        }
    }

    /// Float accessor; `None` for other variants.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text accessor; `None` for other variants.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Value of one resource: a scalar or a multi-instance collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceValue {
    /// Single-valued resource
    Single(ScalarValue),
    /// Multi-instance resource: unique indices, ascending
    Multiple(BTreeMap<u16, ScalarValue>),
}

impl ResourceValue {
    pub fn float(v: f64) -> Self {
        Self::Single(ScalarValue::Float(v))
    }

    pub fn integer(v: i64) -> Self {
        Self::Single(ScalarValue::Integer(v))
    }

    pub fn boolean(v: bool) -> Self {
        Self::Single(ScalarValue::Boolean(v))
    }

    pub fn text(v: impl Into<String>) -> Self {
        Self::Single(ScalarValue::Text(v.into()))
    }

    /// Build a multi-instance value from (index, scalar) pairs.
    pub fn multiple(entries: impl IntoIterator<Item = (u16, ScalarValue)>) -> Self {
        Self::Multiple(entries.into_iter().collect())
    }

    /// Scalar accessor; `None` for multi-instance values.
    pub fn as_single(&self) -> Option<&ScalarValue> {
        match self {
            Self::Single(s) => Some(s),
            Self::Multiple(_) => None,
        }
    }

    /// Index map accessor; `None` for single values.
    pub fn as_multiple(&self) -> Option<&BTreeMap<u16, ScalarValue>> {
        match self {
            Self::Single(_) => None,
            Self::Multiple(m) => Some(m),
        }
    }
}

/// Write mode for multi-instance resources
///
/// Replace discards every existing index before inserting the payload;
/// Update adds/overwrites payload indices and leaves the rest untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Replace,
    Update,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replace => write!(f, "replace"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// Round a reader-visible float to two decimal places, half up.
///
/// Rounds on the shortest decimal representation, so 20.345 becomes 20.35
/// even though its binary form sits just below the midpoint. Internal state
/// keeps the unrounded value.
pub fn round_two_digits(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let repr = format!("{}", value);
    if repr.contains(['e', 'E']) {
        // Magnitudes outside plain-decimal range; nearest is good enough.
        return (value * 100.0).round() / 100.0;
    }
    let Some((int_part, frac)) = repr.split_once('.') else {
        return value;
    };
    if frac.len() <= 2 {
        return value;
    }
    let negative = int_part.starts_with('-');
    let magnitude = int_part.trim_start_matches('-');
    let Ok(whole) = magnitude.parse::<i64>() else {
        return (value * 100.0).round() / 100.0;
    };
    let frac_bytes = frac.as_bytes();
    let mut cents = whole * 100 + ((frac_bytes[0] - b'0') as i64) * 10 + (frac_bytes[1] - b'0') as i64;
    if frac_bytes[2] >= b'5' {
        cents += 1;
    }
    let rounded = cents as f64 / 100.0;
    if negative {
        -rounded
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up_at_midpoint() {
        assert_eq!(round_two_digits(20.345), 20.35);
        assert_eq!(round_two_digits(20.344), 20.34);
    }

    #[test]
    fn test_round_short_values_unchanged() {
        assert_eq!(round_two_digits(20.0), 20.0);
        assert_eq!(round_two_digits(20.3), 20.3);
        assert_eq!(round_two_digits(20.35), 20.35);
    }

    #[test]
    fn test_round_negative_half_away_from_zero() {
        assert_eq!(round_two_digits(-20.345), -20.35);
        assert_eq!(round_two_digits(-20.344), -20.34);
    }

    #[test]
    fn test_round_long_tail() {
        assert_eq!(round_two_digits(19.999999), 20.0);
        assert_eq!(round_two_digits(0.005), 0.01);
    }

    #[test]
    fn test_scalar_type_mapping() {
        assert_eq!(ScalarValue::Float(1.0).resource_type(), ResourceType::Float);
        assert_eq!(ScalarValue::Integer(1).resource_type(), ResourceType::Integer);
        assert_eq!(ScalarValue::Boolean(true).resource_type(), ResourceType::Boolean);
        assert_eq!(
            ScalarValue::Text("cel".into()).resource_type(),
            ResourceType::Text
        );
    }

    #[test]
    fn test_value_accessors() {
        let single = ResourceValue::float(21.5);
        assert_eq!(single.as_single().and_then(ScalarValue::as_f64), Some(21.5));
        assert!(single.as_multiple().is_none());

        let multi = ResourceValue::multiple([
            (0, ScalarValue::Integer(1)),
            (1, ScalarValue::Integer(2)),
        ]);
        assert!(multi.as_single().is_none());
        assert_eq!(multi.as_multiple().map(|m| m.len()), Some(2));
    }

    #[test]
    fn test_multiple_indices_unique_and_ordered() {
        let multi = ResourceValue::multiple([
            (3, ScalarValue::Integer(30)),
            (1, ScalarValue::Integer(10)),
            (3, ScalarValue::Integer(31)),
        ]);
        let map = multi.as_multiple().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(map[&3], ScalarValue::Integer(31));
    }

    #[test]
    fn test_value_serde_roundtrip() {
        let value = ResourceValue::multiple([(0, ScalarValue::Float(1.5))]);
        let json = serde_json::to_string(&value).unwrap();
        let back: ResourceValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
