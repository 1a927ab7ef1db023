//! Per-feature standardization `(x - mean) / scale`, fitted offline and loaded from JSON.

use super::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use crate::error::{DetectError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const F32_LIMIT: f64 = f32::MAX as f64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feature_names: Option<Vec<String>>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        let scaler = Self {
            mean,
            scale,
            feature_names: None,
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Pass-through scaler (mean 0, scale 1).
    pub fn identity() -> Self {
        Self {
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
            feature_names: None,
        }
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let scaler: Self = serde_json::from_str(data)
            .map_err(|e| DetectError::config(format!("malformed scaler: {e}")))?;
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            DetectError::config(format!("scaler not readable at {}: {e}", path.display()))
        })?;
        Self::from_json_str(&data)
    }

    fn validate(&self) -> Result<()> {
        if self.mean.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            return Err(DetectError::config(format!(
                "scaler expects {FEATURE_COUNT} features, got mean={} scale={}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if !self.mean.iter().chain(&self.scale).all(|v| v.is_finite()) {
            return Err(DetectError::config("scaler contains non-finite values"));
        }
        if let Some(names) = &self.feature_names {
            if !names.iter().map(String::as_str).eq(FEATURE_NAMES.iter().copied()) {
                return Err(DetectError::config(
                    "scaler feature_names do not match the flow schema order",
                ));
            }
        }
        Ok(())
    }

    pub fn transform(&self, features: &FeatureVector) -> FeatureVector {
        let mut out = [0.0f64; FEATURE_COUNT];
        for (i, x) in features.as_slice().iter().enumerate() {
            // zero variance at fit time means the feature was constant
            let scale = if self.scale[i] == 0.0 { 1.0 } else { self.scale[i] };
            // models run in f32
            out[i] = ((x - self.mean[i]) / scale).clamp(-F32_LIMIT, F32_LIMIT);
        }
        FeatureVector::new(out)
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::identity()
    }
}
