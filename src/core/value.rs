// Copyright 2025 Cowtable Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Value type for Cowtable - runtime values with type information

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use super::error::{Error, Result};
use super::types::DataType;

/// Timestamp formats supported for parsing
/// Order matters - more specific formats first
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z", // RFC3339 with fractional seconds
    "%Y-%m-%dT%H:%M:%S%:z",    // RFC3339
    "%Y-%m-%dT%H:%M:%SZ",      // RFC3339 UTC
    "%Y-%m-%dT%H:%M:%S",       // ISO without timezone
    "%Y-%m-%d %H:%M:%S%.f",    // SQL-style with fractional seconds
    "%Y-%m-%d %H:%M:%S",       // SQL-style
    "%Y-%m-%d",                // Date only
];

/// A runtime value with type information
///
/// Each variant carries its data directly. `Text` uses `Arc<str>` for cheap
/// cloning during row operations; when a value must outlive the tuple slot it
/// came from (a preserved pre-image), use [`Value::deep_clone`] instead.
#[derive(Debug, Clone)]
pub enum Value {
    /// NULL value with optional type hint
    Null(DataType),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// UTF-8 text string (Arc for cheap cloning)
    Text(Arc<str>),

    /// Boolean value
    Boolean(bool),

    /// Timestamp (UTC)
    Timestamp(DateTime<Utc>),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a NULL value with a type hint
    pub fn null(data_type: DataType) -> Self {
        Value::Null(data_type)
    }

    /// Create a NULL value with unknown type
    pub fn null_unknown() -> Self {
        Value::Null(DataType::Null)
    }

    /// Create an integer value
    pub fn integer(value: i64) -> Self {
        Value::Integer(value)
    }

    /// Create a float value
    pub fn float(value: f64) -> Self {
        Value::Float(value)
    }

    /// Create a text value
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(Arc::from(value.into().as_str()))
    }

    /// Create a text value from Arc<str> (zero-copy)
    pub fn text_arc(value: Arc<str>) -> Self {
        Value::Text(value)
    }

    /// Create a boolean value
    pub fn boolean(value: bool) -> Self {
        Value::Boolean(value)
    }

    /// Create a timestamp value
    pub fn timestamp(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }

    // =========================================================================
    // Type accessors
    // =========================================================================

    /// Returns the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null(dt) => *dt,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Text(_) => DataType::Text,
            Value::Boolean(_) => DataType::Boolean,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }

    /// Returns true if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    // =========================================================================
    // Value extractors
    // =========================================================================

    /// Extract as i64, with type coercion
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Null(_) => None,
            Value::Integer(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Text(s) => s.parse::<i64>().ok(),
            Value::Boolean(b) => Some(if *b { 1 } else { 0 }),
            Value::Timestamp(t) => Some(t.timestamp_nanos_opt().unwrap_or(0)),
        }
    }

    /// Extract as f64, with type coercion
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Value::Null(_) => None,
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.parse::<f64>().ok(),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Timestamp(_) => None,
        }
    }

    /// Extract as &str without coercion
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Extract as boolean without coercion
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    // =========================================================================
    // Copying
    // =========================================================================

    /// Clone this value so that its heap payloads are independent of the
    /// source allocation.
    ///
    /// A plain `clone()` of a `Text` value shares the `Arc<str>` with the
    /// slot it came from; `deep_clone` re-allocates the string so that a
    /// preserved pre-image keeps no tie to live tuple storage.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Text(s) => Value::Text(Arc::from(&**s)),
            other => other.clone(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null(_), Value::Null(_)) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(_) => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// Parse a timestamp string in any of the supported formats
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(s, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&naive));
            }
        }
    }
    Err(Error::internal(format!("cannot parse timestamp: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_data_types() {
        assert_eq!(Value::integer(1).data_type(), DataType::Integer);
        assert_eq!(Value::text("x").data_type(), DataType::Text);
        assert_eq!(Value::null(DataType::Float).data_type(), DataType::Float);
        assert!(Value::null_unknown().is_null());
        assert!(!Value::boolean(false).is_null());
    }

    #[test]
    fn test_value_extractors() {
        assert_eq!(Value::integer(42).as_int64(), Some(42));
        assert_eq!(Value::text("42").as_int64(), Some(42));
        assert_eq!(Value::float(1.5).as_float64(), Some(1.5));
        assert_eq!(Value::text("abc").as_str(), Some("abc"));
        assert_eq!(Value::null_unknown().as_int64(), None);
    }

    #[test]
    fn test_deep_clone_detaches_text() {
        let original = Value::text("payload");
        let copy = original.deep_clone();
        assert_eq!(original, copy);

        if let (Value::Text(a), Value::Text(b)) = (&original, &copy) {
            // Distinct allocations, same content
            assert!(!Arc::ptr_eq(a, b));
        } else {
            panic!("expected text values");
        }
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp("2025-03-01 12:30:00").is_ok());
        assert!(parse_timestamp("2025-03-01").is_ok());
        assert!(parse_timestamp("not a time").is_err());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::integer(7).to_string(), "7");
        assert_eq!(Value::text("hi").to_string(), "hi");
        assert_eq!(Value::null_unknown().to_string(), "NULL");
    }
}
