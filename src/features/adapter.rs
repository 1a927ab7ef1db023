//! Sample → fixed-order feature vector, with zero-fill and ratio fallback policy.

use super::{feature_index, FeatureVector, Sample, FEATURE_COUNT, FEATURE_NAMES, UNBOUNDED_RATIO};
use crate::error::FeatureSchemaError;
use serde_json::Value;

/// (ratio field, numerator, denominator)
const RATIO_FIELDS: [(&str, &str, &str); 2] = [
    ("fwd_bwd_ratio_bytes", "bytes_fwd", "bytes_bwd"),
    ("fwd_bwd_ratio_pkts", "pkts_fwd", "pkts_bwd"),
];

/// Ratio for a zero or missing denominator: unbounded when there is forward
/// traffic, balanced (1.0) when there is none.
pub fn resolve_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        if numerator > 0.0 {
            UNBOUNDED_RATIO
        } else {
            1.0
        }
    } else {
        (numerator / denominator).clamp(-UNBOUNDED_RATIO, UNBOUNDED_RATIO)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureAdapter;

impl FeatureAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Map a sample onto the schema. Missing fields are 0.0; a ratio is only
    /// derived when the caller did not supply a finite one.
    pub fn adapt(&self, sample: &Sample) -> Result<FeatureVector, FeatureSchemaError> {
        let mut values = [0.0f64; FEATURE_COUNT];
        let mut ratio_supplied = [false; RATIO_FIELDS.len()];

        for (i, name) in FEATURE_NAMES.iter().enumerate() {
            let Some(raw) = coerce(name, sample.get(name))? else {
                continue;
            };
            if let Some(r) = RATIO_FIELDS.iter().position(|(field, _, _)| field == name) {
                if raw.is_finite() {
                    values[i] = raw;
                    ratio_supplied[r] = true;
                }
                continue;
            }
            if raw.is_nan() {
                return Err(FeatureSchemaError::NotANumber {
                    field: name.to_string(),
                });
            }
            values[i] = raw.clamp(-UNBOUNDED_RATIO, UNBOUNDED_RATIO);
        }

        for (r, (field, num, den)) in RATIO_FIELDS.iter().enumerate() {
            if ratio_supplied[r] {
                continue;
            }
            let (Some(fi), Some(ni), Some(di)) =
                (feature_index(field), feature_index(num), feature_index(den))
            else {
                continue;
            };
            values[fi] = resolve_ratio(values[ni], values[di]);
        }

        Ok(FeatureVector::new(values))
    }
}

/// `None` for missing or null. Numbers, numeric strings and booleans coerce.
fn coerce(field: &str, value: Option<&Value>) -> Result<Option<f64>, FeatureSchemaError> {
    let non_numeric = |found: &Value| FeatureSchemaError::NonNumeric {
        field: field.to_string(),
        found: found.to_string(),
    };
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| non_numeric(v)),
        Some(Value::Bool(b)) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Some(v @ Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| non_numeric(v)),
        Some(other) => Err(non_numeric(other)),
    }
}
