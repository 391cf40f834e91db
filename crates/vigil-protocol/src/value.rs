//! Tagged field values for scenario structures.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::structure::Structure;

/// A single structure field value.
///
/// Scenario fields are heterogeneous: numbers, booleans, quoted strings,
/// and bare literals whose real type (flags, caps, expressions) only the
/// consumer knows. Bare literals are kept as [`Value::Raw`] and
/// reinterpreted lazily when a typed view is requested.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A boolean literal (`true` / `false`).
    Bool(bool),
    /// A signed integer literal.
    Int(i64),
    /// An unsigned integer, produced programmatically (e.g. clock times).
    UInt(u64),
    /// A floating point literal.
    Double(f64),
    /// A quoted string.
    Str(String),
    /// An unquoted literal: identifiers, flags (`flush+accurate`), caps
    /// and anything else deserialized lazily by the consumer.
    Raw(String),
    /// A nested structure (used for programmatically built sub-actions).
    Structure(Box<Structure>),
}

impl Value {
    /// Parse an unquoted literal token into its most specific variant.
    pub fn from_token(token: &str) -> Self {
        match token {
            "true" | "TRUE" | "True" => return Self::Bool(true),
            "false" | "FALSE" | "False" => return Self::Bool(false),
            _ => {}
        }
        // A leading `+` marks a relative quantity (track indices); keep
        // the sign visible to the consumer instead of collapsing to an
        // integer.
        if token.starts_with('+') {
            return Self::Raw(token.to_string());
        }
        if let Ok(i) = token.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(d) = token.parse::<f64>() {
            // Bare words like "nan" stay raw; only numeric-looking input
            // becomes a double.
            if token.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.') {
                return Self::Double(d);
            }
        }
        Self::Raw(token.to_string())
    }

    /// Boolean view.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Signed integer view; accepts exact unsigned values.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Unsigned view; accepts non-negative signed values.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::UInt(u) => Some(*u),
            Self::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Floating point view; integers coerce.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Int(i) => Some(*i as f64),
            Self::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }

    /// String view: quoted strings and bare literals both qualify.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Raw(s) => Some(s),
            _ => None,
        }
    }

    /// Nested structure view.
    pub fn as_structure(&self) -> Option<&Structure> {
        match self {
            Self::Structure(s) => Some(s),
            _ => None,
        }
    }

    /// True when the value holds a string of either flavor.
    pub fn is_string(&self) -> bool {
        matches!(self, Self::Str(_) | Self::Raw(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::UInt(u) => write!(f, "{}", u),
            Self::Double(d) => write!(f, "{}", d),
            Self::Str(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Self::Raw(s) => write!(f, "{}", s),
            Self::Structure(s) => write!(f, "[{}]", s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::UInt(u) => serializer.serialize_u64(*u),
            Self::Double(d) => serializer.serialize_f64(*d),
            Self::Str(s) | Self::Raw(s) => serializer.serialize_str(s),
            Self::Structure(s) => s.serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_typing() {
        assert_eq!(Value::from_token("true"), Value::Bool(true));
        assert_eq!(Value::from_token("42"), Value::Int(42));
        assert_eq!(Value::from_token("-7"), Value::Int(-7));
        assert_eq!(Value::from_token("+1"), Value::Raw("+1".into()));
        assert_eq!(Value::from_token("3.14"), Value::Double(3.14));
        assert_eq!(
            Value::from_token("flush+accurate"),
            Value::Raw("flush+accurate".into())
        );
        assert_eq!(Value::from_token("paused"), Value::Raw("paused".into()));
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(Value::Int(5).as_double(), Some(5.0));
        assert_eq!(Value::UInt(5).as_int(), Some(5));
        assert_eq!(Value::Int(-1).as_uint(), None);
        assert_eq!(Value::Double(1.5).as_int(), None);
    }

    #[test]
    fn string_views() {
        assert_eq!(Value::Str("a".into()).as_str(), Some("a"));
        assert_eq!(Value::Raw("a+b".into()).as_str(), Some("a+b"));
        assert_eq!(Value::Int(1).as_str(), None);
    }

    #[test]
    fn display_quotes_strings() {
        assert_eq!(Value::Str("hi \"there\"".into()).to_string(), "\"hi \\\"there\\\"\"");
        assert_eq!(Value::Raw("flush+accurate".into()).to_string(), "flush+accurate");
    }
}
