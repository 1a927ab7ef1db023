//! Per-sample detection output: verdict, connection metadata, and window snapshot.

use crate::ensemble::Verdict;
use crate::error::FeatureSchemaError;
use crate::features::Sample;
use crate::window::WindowSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monitored connection source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId {
    #[serde(rename = "src_ip")]
    pub ip: String,
    #[serde(rename = "src_port")]
    pub port: Option<u16>,
}

impl SourceId {
    pub fn new(ip: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    pub fn from_sample(sample: &Sample) -> Result<Self, FeatureSchemaError> {
        Ok(Self::new(sample.src_ip(), sample.src_port()?))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.ip, port),
            None => write!(f, "{}:unknown", self.ip),
        }
    }
}

/// Snapshot of one detection; later pushes do not change it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub source: SourceId,
    #[serde(flatten)]
    pub verdict: Verdict,
    pub window_anomaly_count: usize,
    pub host_compromised: bool,
}

impl DetectionResult {
    pub fn new(
        timestamp: DateTime<Utc>,
        source: SourceId,
        verdict: Verdict,
        window: WindowSnapshot,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            source,
            verdict,
            window_anomaly_count: window.window_anomaly_count,
            host_compromised: window.host_compromised,
        }
    }

    pub fn final_anomaly(&self) -> bool {
        self.verdict.final_anomaly()
    }

    pub fn window(&self) -> WindowSnapshot {
        WindowSnapshot {
            window_anomaly_count: self.window_anomaly_count,
            host_compromised: self.host_compromised,
        }
    }

    /// Equal in everything but the generated id.
    pub fn same_outcome(&self, other: &DetectionResult) -> bool {
        self.timestamp == other.timestamp
            && self.source == other.source
            && self.verdict == other.verdict
            && self.window() == other.window()
    }
}
