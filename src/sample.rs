//! Timestamped data sample values.
//!
//! Samples are the unit of data flowing through the hub: a wall-clock
//! timestamp plus one of a small set of value payloads. They are
//! immutable after construction (except the timestamp) and shared by
//! reference count.
//!
//! # Main Types
//!
//! - [`DataType`] - External type tag (trigger, boolean, numeric, string, json)
//! - [`Value`] - The payload carried by a sample
//! - [`Sample`] - A timestamped value; [`SampleRef`] is its shared handle
//!
//! # Type tags live with the holder
//!
//! The external data type is *not* stored in the sample. A JSON sample
//! and a string sample are structurally identical; whoever holds the
//! sample (typically the owning resource) carries the [`DataType`].

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::MAX_STRING_BYTES;
use crate::error::{HubError, Result};
use crate::json::{self, JsonType};

/// External data type of a sample, as seen by the holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DataType {
    /// No payload; only the timestamp is meaningful.
    #[default]
    Trigger,
    /// Boolean value.
    Boolean,
    /// 64-bit floating point value.
    Numeric,
    /// UTF-8 string value.
    String,
    /// Textual JSON value.
    Json,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Trigger => write!(f, "trigger"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Numeric => write!(f, "numeric"),
            DataType::String => write!(f, "string"),
            DataType::Json => write!(f, "json"),
        }
    }
}

/// The payload of a sample.
///
/// String and JSON values share [`Value::Text`]; the distinction is
/// carried by the holder's [`DataType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Trigger,
    Boolean(bool),
    Numeric(f64),
    Text(Box<str>),
}

/// Shared handle to a sample. The hub is single-threaded cooperative, so
/// plain `Rc` reference counting is used; "push hands off one reference"
/// becomes passing a `SampleRef` by value.
pub type SampleRef = Rc<Sample>;

/// A timestamped value.
#[derive(Debug)]
pub struct Sample {
    timestamp: Cell<f64>,
    value: Value,
}

/// Seconds since the Unix epoch, as the hub's timestamp unit.
pub(crate) fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl Sample {
    /// Timestamp sentinel resolved to the current wall clock at creation.
    pub const NOW: f64 = 0.0;

    fn create(timestamp: f64, value: Value) -> SampleRef {
        let timestamp = if timestamp == Self::NOW {
            wall_clock()
        } else {
            timestamp
        };
        Rc::new(Self {
            timestamp: Cell::new(timestamp),
            value,
        })
    }

    /// Create a trigger sample (timestamp only).
    pub fn trigger(timestamp: f64) -> SampleRef {
        Self::create(timestamp, Value::Trigger)
    }

    /// Create a Boolean sample.
    pub fn boolean(timestamp: f64, value: bool) -> SampleRef {
        Self::create(timestamp, Value::Boolean(value))
    }

    /// Create a numeric sample.
    pub fn numeric(timestamp: f64, value: f64) -> SampleRef {
        Self::create(timestamp, Value::Numeric(value))
    }

    /// Create a string sample. The string is copied into the sample.
    pub fn string(timestamp: f64, value: impl Into<Box<str>>) -> SampleRef {
        Self::create(timestamp, Value::Text(value.into()))
    }

    /// Create a JSON sample. JSON values are stored the same way strings
    /// are; the holder's [`DataType`] tells them apart.
    pub fn json(timestamp: f64, value: impl Into<Box<str>>) -> SampleRef {
        Self::string(timestamp, value)
    }

    /// The timestamp, in seconds since the epoch.
    pub fn timestamp(&self) -> f64 {
        self.timestamp.get()
    }

    /// Overwrite the timestamp. The only mutation a sample permits.
    pub fn set_timestamp(&self, timestamp: f64) {
        self.timestamp.set(timestamp);
    }

    /// The payload.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The Boolean payload, if this is a Boolean sample.
    pub fn as_boolean(&self) -> Option<bool> {
        match &self.value {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// The numeric payload, if this is a numeric sample.
    pub fn as_numeric(&self) -> Option<f64> {
        match &self.value {
            Value::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// The text payload, if this is a string or JSON sample.
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Create a new sample carrying the same value with a different
    /// timestamp. Used when an override substitutes a pushed sample.
    pub fn with_timestamp(&self, timestamp: f64) -> SampleRef {
        Self::create(timestamp, self.value.clone())
    }

    /// Render the sample's value as JSON.
    ///
    /// Strings are quoted and escaped per RFC 8259. Returns an overflow
    /// error if the rendition exceeds the string size limit.
    pub fn to_json(&self, data_type: DataType) -> Result<String> {
        let out = match data_type {
            DataType::Trigger => "null".to_string(),
            DataType::Boolean => match &self.value {
                Value::Boolean(v) => v.to_string(),
                _ => return Err(self.type_mismatch(data_type)),
            },
            DataType::Numeric => match &self.value {
                Value::Numeric(v) => format_numeric(*v),
                _ => return Err(self.type_mismatch(data_type)),
            },
            DataType::String => match &self.value {
                Value::Text(s) => serde_json::to_string(s.as_ref())
                    .map_err(|e| HubError::Fault(format!("string encoding failed: {e}")))?,
                _ => return Err(self.type_mismatch(data_type)),
            },
            DataType::Json => match &self.value {
                // Already JSON text; copied verbatim.
                Value::Text(s) => s.to_string(),
                _ => return Err(self.type_mismatch(data_type)),
            },
        };

        if out.len() >= MAX_STRING_BYTES {
            return Err(HubError::Overflow(format!(
                "JSON rendition is {} bytes",
                out.len()
            )));
        }
        Ok(out)
    }

    /// Render the sample's value as a printable string. Identical to
    /// [`Sample::to_json`] except that strings are unquoted and
    /// unescaped.
    pub fn to_display_string(&self, data_type: DataType) -> Result<String> {
        if data_type == DataType::String {
            match &self.value {
                Value::Text(s) => {
                    if s.len() >= MAX_STRING_BYTES {
                        return Err(HubError::Overflow(format!("string is {} bytes", s.len())));
                    }
                    Ok(s.to_string())
                }
                _ => Err(self.type_mismatch(data_type)),
            }
        } else {
            self.to_json(data_type)
        }
    }

    /// Parse a JSON primitive into a typed sample.
    pub fn from_json(timestamp: f64, json: &str) -> Result<(DataType, SampleRef)> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| HubError::BadParameter(format!("invalid JSON: {e}")))?;

        Ok(match value {
            serde_json::Value::Null => (DataType::Trigger, Sample::trigger(timestamp)),
            serde_json::Value::Bool(v) => (DataType::Boolean, Sample::boolean(timestamp, v)),
            serde_json::Value::Number(n) => (
                DataType::Numeric,
                Sample::numeric(timestamp, n.as_f64().unwrap_or(f64::NAN)),
            ),
            serde_json::Value::String(s) => (DataType::String, Sample::string(timestamp, s)),
            other => (DataType::Json, Sample::json(timestamp, other.to_string())),
        })
    }

    /// Extract an object member or array element from a JSON sample,
    /// producing a new sample of the extracted kind that inherits this
    /// sample's timestamp.
    pub fn extract_json(&self, spec: &str) -> Result<(DataType, SampleRef)> {
        let text = self.as_text().ok_or_else(|| {
            HubError::BadParameter("extraction from a non-text sample".to_string())
        })?;

        let (json_type, rendered) = json::extract(text, spec).inspect_err(|e| {
            warn!("Failed to extract '{spec}' from JSON '{text}': {e}");
        })?;

        let timestamp = self.timestamp();
        Ok(match json_type {
            JsonType::Null => (DataType::Trigger, Sample::trigger(timestamp)),
            JsonType::Boolean => (
                DataType::Boolean,
                Sample::boolean(timestamp, json::to_boolean(&rendered)),
            ),
            JsonType::Number => (
                DataType::Numeric,
                Sample::numeric(timestamp, json::to_number(&rendered)),
            ),
            JsonType::String => (DataType::String, Sample::string(timestamp, rendered)),
            JsonType::Object | JsonType::Array => (DataType::Json, Sample::json(timestamp, rendered)),
        })
    }

    fn type_mismatch(&self, data_type: DataType) -> HubError {
        HubError::BadParameter(format!(
            "sample value does not match data type {data_type}"
        ))
    }
}

/// Fixed six-decimal rendition, matching classic `%lf` output.
fn format_numeric(value: f64) -> String {
    format!("{value:.6}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_resolves_to_wall_clock() {
        let sample = Sample::numeric(Sample::NOW, 1.0);
        // Any time in the 21st century will do.
        assert!(sample.timestamp() > 1_000_000_000.0);
    }

    #[test]
    fn test_explicit_timestamp_kept() {
        let sample = Sample::boolean(1234.5, true);
        assert_eq!(sample.timestamp(), 1234.5);
        sample.set_timestamp(99.0);
        assert_eq!(sample.timestamp(), 99.0);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Sample::boolean(1.0, true).as_boolean(), Some(true));
        assert_eq!(Sample::numeric(1.0, 2.5).as_numeric(), Some(2.5));
        assert_eq!(Sample::string(1.0, "hi").as_text(), Some("hi"));
        assert_eq!(Sample::trigger(1.0).as_numeric(), None);
    }

    #[test]
    fn test_to_json_primitives() {
        assert_eq!(Sample::trigger(1.0).to_json(DataType::Trigger).unwrap(), "null");
        assert_eq!(
            Sample::boolean(1.0, true).to_json(DataType::Boolean).unwrap(),
            "true"
        );
        assert_eq!(
            Sample::numeric(1.0, 3.14).to_json(DataType::Numeric).unwrap(),
            "3.140000"
        );
        assert_eq!(
            Sample::json(1.0, r#"{"a":1}"#).to_json(DataType::Json).unwrap(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn test_to_json_escapes_strings() {
        let sample = Sample::string(1.0, "say \"hi\"\\\n");
        assert_eq!(
            sample.to_json(DataType::String).unwrap(),
            r#""say \"hi\"\\\n""#
        );
    }

    #[test]
    fn test_to_display_string_is_raw() {
        let sample = Sample::string(1.0, "say \"hi\"");
        assert_eq!(
            sample.to_display_string(DataType::String).unwrap(),
            "say \"hi\""
        );
    }

    #[test]
    fn test_json_round_trip() {
        for json in ["null", "true", "false", "2.500000", "\"text\"", r#"{"a":[1,2]}"#] {
            let (data_type, sample) = Sample::from_json(7.0, json).unwrap();
            assert_eq!(sample.to_json(data_type).unwrap(), json, "for input {json}");
            assert_eq!(sample.timestamp(), 7.0);
        }
    }

    #[test]
    fn test_extract_json_inherits_timestamp() {
        let sample = Sample::json(42.0, r#"{"temp": 21.5, "ok": true}"#);

        let (data_type, extracted) = sample.extract_json("temp").unwrap();
        assert_eq!(data_type, DataType::Numeric);
        assert_eq!(extracted.as_numeric(), Some(21.5));
        assert_eq!(extracted.timestamp(), 42.0);

        let (data_type, extracted) = sample.extract_json("ok").unwrap();
        assert_eq!(data_type, DataType::Boolean);
        assert_eq!(extracted.as_boolean(), Some(true));
    }

    #[test]
    fn test_extract_json_failure() {
        let sample = Sample::json(1.0, r#"{"temp": 21.5}"#);
        assert!(sample.extract_json("missing").is_err());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let sample = Sample::numeric(1.0, 2.0);
        assert!(sample.to_json(DataType::Boolean).is_err());
    }
}
