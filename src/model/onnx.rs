//! ONNX Runtime scoring. Input: [1, feature_dim] f32.
//!
//! skl2onnx exports of the isolation forest and one-class SVM carry the
//! decision function in a `scores` output. The autoencoder's single output
//! is a reconstruction, scored as mean squared error against the input.

use super::{AnomalyScorer, ModelKind};
use crate::error::{DetectError, Result};
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::fmt::Display;
use std::path::Path;
use std::sync::Mutex;

const DECISION_OUTPUT: &str = "scores";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOutput {
    /// First element of the decision-function output.
    Decision,
    /// MSE between input and reconstructed output.
    Reconstruction,
}

pub struct OnnxScorer {
    kind: ModelKind,
    // `run` needs exclusive access to the session
    session: Mutex<Session>,
    output_name: String,
    output: ScoreOutput,
}

impl OnnxScorer {
    pub fn load(kind: ModelKind, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DetectError::config(format!(
                "{kind} model not found at {}",
                path.display()
            )));
        }
        let session = Session::builder()
            .map_err(|e| load_error(kind, path, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_error(kind, path, e))?
            .commit_from_file(path)
            .map_err(|e| load_error(kind, path, e))?;

        let output = kind.score_output();
        let names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let output_name = match output {
            ScoreOutput::Decision => names
                .iter()
                .find(|n| n.as_str() == DECISION_OUTPUT)
                .or_else(|| names.last())
                .cloned(),
            ScoreOutput::Reconstruction => names.first().cloned(),
        }
        .ok_or_else(|| DetectError::config(format!("{kind} model declares no outputs")))?;

        tracing::info!(
            model = %kind,
            path = %path.display(),
            output = %output_name,
            "ONNX model loaded"
        );
        Ok(Self {
            kind,
            session: Mutex::new(session),
            output_name,
            output,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    fn fail(&self, reason: impl Display) -> DetectError {
        DetectError::Inference {
            model: self.kind,
            reason: reason.to_string(),
        }
    }
}

impl AnomalyScorer for OnnxScorer {
    fn score(&self, input: &[f32]) -> Result<f64> {
        let arr = Array2::from_shape_vec((1, input.len()), input.to_vec())
            .map_err(|e| self.fail(e))?;
        let tensor = Value::from_array(arr).map_err(|e| self.fail(e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| self.fail("session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| self.fail(e))?;
        let out = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| self.fail(format!("missing output `{}`", self.output_name)))?;
        let (_, data) = out.try_extract_tensor::<f32>().map_err(|e| self.fail(e))?;

        match self.output {
            ScoreOutput::Decision => data
                .first()
                .map(|s| *s as f64)
                .ok_or_else(|| self.fail("empty decision output")),
            ScoreOutput::Reconstruction => reconstruction_error(input, data)
                .ok_or_else(|| self.fail("empty reconstruction output")),
        }
    }
}

fn load_error(kind: ModelKind, path: &Path, e: impl Display) -> DetectError {
    DetectError::config(format!("{kind} model at {} failed to load: {e}", path.display()))
}

/// Mean squared error over the overlapping prefix.
pub(crate) fn reconstruction_error(input: &[f32], recon: &[f32]) -> Option<f64> {
    let n = input.len().min(recon.len());
    if n == 0 {
        return None;
    }
    let sum: f64 = input
        .iter()
        .zip(recon)
        .map(|(x, r)| {
            let d = (*x - *r) as f64;
            d * d
        })
        .sum();
    Some(sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;

    fn fixture(kind: ModelKind, name: &str) -> OnnxScorer {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name);
        OnnxScorer::load(kind, &path).unwrap()
    }

    #[test]
    fn decision_model_reads_named_scores_output() {
        // fixture outputs: scores = -input, label = input (declared last)
        let scorer = fixture(ModelKind::IsolationForest, "decision.onnx");
        let mut input = vec![0.0f32; FEATURE_COUNT];
        input[0] = 0.75;
        let score = scorer.score(&input).unwrap();
        assert!((score + 0.75).abs() < 1e-6, "got {score}");
    }

    #[test]
    fn autoencoder_scores_reconstruction_error() {
        // fixture reconstruction = -input, so error = mean((2x)^2)
        let scorer = fixture(ModelKind::Autoencoder, "reconstruction.onnx");
        let mut input = vec![0.0f32; FEATURE_COUNT];
        input[3] = 1.0;
        input[4] = -2.0;
        let score = scorer.score(&input).unwrap();
        assert!((score - 20.0 / FEATURE_COUNT as f64).abs() < 1e-6, "got {score}");
    }

    #[test]
    fn wrong_input_width_is_an_inference_error() {
        let scorer = fixture(ModelKind::OneClassSvm, "decision.onnx");
        let err = scorer.score(&[1.0; 5]).unwrap_err();
        assert!(matches!(err, DetectError::Inference { model: ModelKind::OneClassSvm, .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_model_is_configuration_error() {
        let err = OnnxScorer::load(ModelKind::OneClassSvm, Path::new("nonexistent.onnx"))
            .err()
            .unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("one_class_svm"));
    }

    #[test]
    fn reconstruction_error_is_mse() {
        let mse = reconstruction_error(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0, 2.0]).unwrap();
        assert!((mse - 1.0).abs() < 1e-12);
        assert_eq!(reconstruction_error(&[], &[1.0]), None);
    }
}
