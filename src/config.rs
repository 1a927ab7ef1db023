//! Detector configuration. Loaded from JSON; every section falls back to defaults.

use crate::error::{DetectError, Result};
use crate::model::ModelKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Data directory (alert journal)
    pub data_dir: PathBuf,
    /// Model and scaler artifacts
    pub models: ModelsConfig,
    /// Per-model decision thresholds
    pub thresholds: ThresholdsConfig,
    /// Host compromise window
    pub window: WindowConfig,
    /// Encrypted local alert journal
    pub journal: JournalConfig,
    /// Alert forwarding to a collector
    pub uplink: UplinkConfig,
    /// Logging
    pub log: LogConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .map(|d| d.join("nids-agent"))
                .unwrap_or_else(|| PathBuf::from(".nids")),
            models: ModelsConfig::default(),
            thresholds: ThresholdsConfig::default(),
            window: WindowConfig::default(),
            journal: JournalConfig::default(),
            uplink: UplinkConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub path: PathBuf,
    /// Expected SHA-256 (hex); checked before loading when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ArtifactConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sha256: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub scaler: ArtifactConfig,
    pub isolation_forest: ArtifactConfig,
    pub one_class_svm: ArtifactConfig,
    /// Optional: when missing the session runs degraded
    pub autoencoder: ArtifactConfig,
}

impl ModelsConfig {
    pub fn artifact(&self, kind: ModelKind) -> &ArtifactConfig {
        match kind {
            ModelKind::IsolationForest => &self.isolation_forest,
            ModelKind::OneClassSvm => &self.one_class_svm,
            ModelKind::Autoencoder => &self.autoencoder,
        }
    }

    /// All artifacts under one directory, default file names.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            scaler: ArtifactConfig::new(dir.join("scaler.json")),
            isolation_forest: ArtifactConfig::new(dir.join("isolation_forest.onnx")),
            one_class_svm: ArtifactConfig::new(dir.join("oneclass_svm.onnx")),
            autoencoder: ArtifactConfig::new(dir.join("autoencoder.onnx")),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self::in_dir(Path::new("models"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    /// Flag when decision score < this
    pub isolation_forest: f64,
    /// Flag when decision score < this
    pub one_class_svm: f64,
    /// Flag when reconstruction MSE > this
    pub autoencoder: f64,
}

impl ThresholdsConfig {
    pub fn for_model(&self, kind: ModelKind) -> f64 {
        match kind {
            ModelKind::IsolationForest => self.isolation_forest,
            ModelKind::OneClassSvm => self.one_class_svm,
            ModelKind::Autoencoder => self.autoencoder,
        }
    }
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            isolation_forest: ModelKind::IsolationForest.default_threshold(),
            one_class_svm: ModelKind::OneClassSvm.default_threshold(),
            autoencoder: ModelKind::Autoencoder.default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Disabled windowing never reports a compromised host
    pub use_window: bool,
    /// Recent verdicts kept per source
    pub window_size: usize,
    /// Anomalies within the window that mark the host compromised
    pub compromise_threshold: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            use_window: true,
            window_size: 50,
            compromise_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    /// Defaults to `<data_dir>/alerts.db`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UplinkConfig {
    pub enabled: bool,
    /// Collector base URL when enabled
    pub endpoint: Option<String>,
    /// Identifies this sensor to the collector
    pub sensor_id: Option<String>,
    pub timeout_secs: u64,
    /// Alerts buffered for the background sender; further alerts are dropped
    pub queue_capacity: usize,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            sensor_id: None,
            timeout_secs: 15,
            queue_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl DetectorConfig {
    /// Load from JSON file if present; otherwise return default. A file that
    /// exists but does not parse is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| DetectError::config(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| DetectError::config(format!("parse {}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.window;
        if w.window_size == 0 {
            return Err(DetectError::config("window.window_size must be at least 1"));
        }
        if w.compromise_threshold == 0 {
            return Err(DetectError::config(
                "window.compromise_threshold must be at least 1",
            ));
        }
        if w.use_window && w.compromise_threshold > w.window_size {
            tracing::warn!(
                window_size = w.window_size,
                compromise_threshold = w.compromise_threshold,
                "compromise threshold exceeds window size; hosts can never be flagged"
            );
        }
        for kind in ModelKind::ALL {
            let t = self.thresholds.for_model(kind);
            if !t.is_finite() {
                return Err(DetectError::config(format!(
                    "thresholds.{kind} must be finite, got {t}"
                )));
            }
        }
        if self.uplink.enabled && self.uplink.endpoint.is_none() {
            return Err(DetectError::config("uplink.enabled requires uplink.endpoint"));
        }
        if self.uplink.enabled && self.uplink.queue_capacity == 0 {
            return Err(DetectError::config("uplink.queue_capacity must be at least 1"));
        }
        Ok(())
    }

    pub fn journal_path(&self) -> PathBuf {
        self.journal
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("alerts.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_calibration() {
        let c = DetectorConfig::default();
        assert_eq!(c.window.window_size, 50);
        assert!(c.window.use_window);
        assert_eq!(c.window.compromise_threshold, 3);
        assert_eq!(c.thresholds.isolation_forest, -0.2);
        assert_eq!(c.thresholds.one_class_svm, 0.0);
        assert_eq!(c.thresholds.autoencoder, 0.01);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let json = r#"{"window": {"window_size": 10}, "thresholds": {"autoencoder": 0.05}}"#;
        let c: DetectorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.window.window_size, 10);
        assert_eq!(c.window.compromise_threshold, 3);
        assert_eq!(c.thresholds.autoencoder, 0.05);
        assert_eq!(c.thresholds.isolation_forest, -0.2);
        assert_eq!(c.models.scaler.path, PathBuf::from("models/scaler.json"));
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut c = DetectorConfig::default();
        c.window.window_size = 0;
        assert!(c.validate().unwrap_err().is_fatal());

        let mut c = DetectorConfig::default();
        c.window.compromise_threshold = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn uplink_without_endpoint_is_rejected() {
        let mut c = DetectorConfig::default();
        c.uplink.enabled = true;
        assert!(c.validate().is_err());

        c.uplink.endpoint = Some("http://collector:8080".into());
        assert!(c.validate().is_ok());
        c.uplink.queue_capacity = 0;
        assert!(c.validate().is_err());
    }
}
