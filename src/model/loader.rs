//! Artifact loading seam between the session and the persistence layer.

use super::{AnomalyScorer, ModelKind, OnnxScorer};
use crate::config::{ArtifactConfig, ModelsConfig};
use crate::error::{DetectError, Result};
use crate::features::StandardScaler;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub trait ArtifactLoader {
    fn load_model(&self, kind: ModelKind) -> Result<Arc<dyn AnomalyScorer>>;
    fn load_scaler(&self) -> Result<StandardScaler>;
}

/// Compare a file's SHA-256 against the expected hex digest.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let bytes = std::fs::read(path)
        .map_err(|e| DetectError::config(format!("read {}: {e}", path.display())))?;
    let actual = format!("{:x}", Sha256::digest(&bytes));
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(DetectError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(())
}

fn check(artifact: &ArtifactConfig) -> Result<()> {
    match &artifact.sha256 {
        Some(expected) => verify_checksum(&artifact.path, expected),
        None => Ok(()),
    }
}

/// ONNX models and a JSON scaler at configured paths.
pub struct OnnxArtifacts {
    config: ModelsConfig,
}

impl OnnxArtifacts {
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl ArtifactLoader for OnnxArtifacts {
    fn load_model(&self, kind: ModelKind) -> Result<Arc<dyn AnomalyScorer>> {
        let artifact = self.config.artifact(kind);
        if !artifact.path.exists() {
            return Err(DetectError::config(format!(
                "{kind} model not found at {}",
                artifact.path.display()
            )));
        }
        check(artifact)?;
        Ok(Arc::new(OnnxScorer::load(kind, &artifact.path)?))
    }

    fn load_scaler(&self) -> Result<StandardScaler> {
        let artifact = &self.config.scaler;
        if artifact.path.exists() {
            check(artifact)?;
        }
        StandardScaler::load(&artifact.path)
    }
}

/// Models already resident in memory, e.g. shared across sessions.
#[derive(Default, Clone)]
pub struct InMemoryArtifacts {
    scaler: Option<StandardScaler>,
    models: HashMap<ModelKind, Arc<dyn AnomalyScorer>>,
}

impl InMemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scaler(mut self, scaler: StandardScaler) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn with_model(mut self, kind: ModelKind, scorer: Arc<dyn AnomalyScorer>) -> Self {
        self.models.insert(kind, scorer);
        self
    }
}

impl ArtifactLoader for InMemoryArtifacts {
    fn load_model(&self, kind: ModelKind) -> Result<Arc<dyn AnomalyScorer>> {
        self.models
            .get(&kind)
            .cloned()
            .ok_or_else(|| DetectError::config(format!("{kind} model not registered")))
    }

    fn load_scaler(&self) -> Result<StandardScaler> {
        self.scaler
            .clone()
            .ok_or_else(|| DetectError::config("scaler not registered"))
    }
}
