//! The three ensemble detectors: identity, scoring seam, threshold gates, and loading.
//!
//! Models are black boxes behind [`AnomalyScorer`]: a scaled feature vector
//! goes in, one real-valued score comes out.

mod gate;
mod loader;
mod onnx;

pub use gate::{GateDirection, ThresholdGate};
pub use loader::{verify_checksum, ArtifactLoader, InMemoryArtifacts, OnnxArtifacts};
pub use onnx::{OnnxScorer, ScoreOutput};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    IsolationForest,
    OneClassSvm,
    Autoencoder,
}

impl ModelKind {
    /// Vote order.
    pub const ALL: [ModelKind; 3] = [
        ModelKind::IsolationForest,
        ModelKind::OneClassSvm,
        ModelKind::Autoencoder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::IsolationForest => "isolation_forest",
            ModelKind::OneClassSvm => "one_class_svm",
            ModelKind::Autoencoder => "autoencoder",
        }
    }

    /// Prefix used in flat result fields (`if_score`, `oc_anomaly`, ...).
    pub fn short_name(&self) -> &'static str {
        match self {
            ModelKind::IsolationForest => "if",
            ModelKind::OneClassSvm => "oc",
            ModelKind::Autoencoder => "ae",
        }
    }

    /// Without a required model there is no session; the autoencoder may degrade.
    pub fn is_required(&self) -> bool {
        !matches!(self, ModelKind::Autoencoder)
    }

    /// Decision functions flag low scores; reconstruction error flags high ones.
    pub fn direction(&self) -> GateDirection {
        match self {
            ModelKind::IsolationForest | ModelKind::OneClassSvm => GateDirection::Below,
            ModelKind::Autoencoder => GateDirection::Above,
        }
    }

    pub fn default_threshold(&self) -> f64 {
        match self {
            ModelKind::IsolationForest => -0.2,
            ModelKind::OneClassSvm => 0.0,
            ModelKind::Autoencoder => 0.01,
        }
    }

    pub fn score_output(&self) -> ScoreOutput {
        match self {
            ModelKind::Autoencoder => ScoreOutput::Reconstruction,
            _ => ScoreOutput::Decision,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless, read-only scoring over a loaded model.
pub trait AnomalyScorer: Send + Sync {
    fn score(&self, input: &[f32]) -> Result<f64>;
}

/// Plain functions score infallibly; handy for calibration stubs and tests.
impl<F> AnomalyScorer for F
where
    F: Fn(&[f32]) -> f64 + Send + Sync,
{
    fn score(&self, input: &[f32]) -> Result<f64> {
        Ok(self(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_autoencoder_is_optional() {
        let optional: Vec<_> = ModelKind::ALL.iter().filter(|k| !k.is_required()).collect();
        assert_eq!(optional, vec![&ModelKind::Autoencoder]);
    }

    #[test]
    fn closures_are_scorers() {
        let scorer = |x: &[f32]| x.iter().map(|v| *v as f64).sum::<f64>();
        assert_eq!(scorer.score(&[1.0, 2.0]).unwrap(), 3.0);
    }
}
