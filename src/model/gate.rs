//! Fixed per-model decision threshold: raw score → anomaly flag.

use super::ModelKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDirection {
    /// Anomalous when strictly below the threshold.
    Below,
    /// Anomalous when strictly above the threshold.
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdGate {
    threshold: f64,
    direction: GateDirection,
}

impl ThresholdGate {
    pub fn new(threshold: f64, direction: GateDirection) -> Self {
        Self {
            threshold,
            direction,
        }
    }

    pub fn for_model(kind: ModelKind, threshold: f64) -> Self {
        Self::new(threshold, kind.direction())
    }

    /// NaN never flags.
    pub fn is_anomalous(&self, score: f64) -> bool {
        match self.direction {
            GateDirection::Below => score < self.threshold,
            GateDirection::Above => score > self.threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn direction(&self) -> GateDirection {
        self.direction
    }
}

impl Default for ThresholdGate {
    fn default() -> Self {
        Self::for_model(
            ModelKind::IsolationForest,
            ModelKind::IsolationForest.default_threshold(),
        )
    }
}
