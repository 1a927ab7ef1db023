//! Raw input sample: one JSON object of named flow metrics plus connection metadata.

use crate::error::FeatureSchemaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample(Map<String, Value>);

impl Sample {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse one NDJSON line.
    pub fn from_json_str(line: &str) -> Result<Self, FeatureSchemaError> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| FeatureSchemaError::Malformed(e.to_string()))?;
        Self::try_from(value)
    }

    /// Source address; "unknown" when absent.
    pub fn src_ip(&self) -> String {
        match self.get("src_ip") {
            None | Some(Value::Null) => UNKNOWN.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Source port; `None` when absent or explicitly "unknown".
    pub fn src_port(&self) -> Result<Option<u16>, FeatureSchemaError> {
        let raw = match self.get("src_port") {
            None | Some(Value::Null) => return Ok(None),
            Some(v) => v,
        };
        let parsed = match raw {
            Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Value::String(s) if s == UNKNOWN => return Ok(None),
            Value::String(s) => s.trim().parse::<u16>().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| FeatureSchemaError::InvalidPort(raw.to_string()))
    }

    /// Capture time: epoch seconds (fractional allowed) or an RFC 3339 string.
    pub fn timestamp(&self) -> Result<Option<DateTime<Utc>>, FeatureSchemaError> {
        let raw = match self.get("timestamp") {
            None | Some(Value::Null) => return Ok(None),
            Some(v) => v,
        };
        let parsed = match raw {
            Value::Number(n) => n.as_f64().and_then(from_epoch_secs),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().and_then(from_epoch_secs)),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| FeatureSchemaError::InvalidTimestamp(raw.to_string()))
    }
}

fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

impl TryFrom<Value> for Sample {
    type Error = FeatureSchemaError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(FeatureSchemaError::NotAnObject),
        }
    }
}

impl From<Map<String, Value>> for Sample {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Sample {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut sample = Sample::new();
        for (k, v) in iter {
            sample.insert(k, v);
        }
        sample
    }
}
