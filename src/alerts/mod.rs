//! Alert events raised by the detection session and the sinks that observe them.
//!
//! Two independent triggers are evaluated on every sample: a packet-level
//! alert when the ensemble flags the sample, and a host-level alert whenever
//! the source's window is at or over the compromise threshold.

mod sink;

pub use sink::{AlertSink, MemorySink, SinkError, TracingSink};

use crate::session::{DetectionResult, SourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertKind {
    PacketAnomaly {
        votes: usize,
    },
    HostCompromised {
        window_anomaly_count: usize,
        threshold: usize,
    },
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::PacketAnomaly { .. } => "packet_anomaly",
            AlertKind::HostCompromised { .. } => "host_compromised",
        }
    }

    pub fn severity(&self) -> &'static str {
        match self {
            AlertKind::PacketAnomaly { .. } => "warning",
            AlertKind::HostCompromised { .. } => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    /// Observation time of the triggering sample
    pub ts: DateTime<Utc>,
    pub result_id: String,
    #[serde(flatten)]
    pub source: SourceId,
    pub kind: AlertKind,
}

impl Alert {
    fn from_result(result: &DetectionResult, kind: AlertKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ts: result.timestamp,
            result_id: result.id.clone(),
            source: result.source.clone(),
            kind,
        }
    }

    pub fn packet_anomaly(result: &DetectionResult) -> Self {
        Self::from_result(
            result,
            AlertKind::PacketAnomaly {
                votes: result.verdict.vote_count(),
            },
        )
    }

    pub fn host_compromised(result: &DetectionResult, threshold: usize) -> Self {
        Self::from_result(
            result,
            AlertKind::HostCompromised {
                window_anomaly_count: result.window_anomaly_count,
                threshold,
            },
        )
    }

    /// Alerts owed for one result.
    pub fn for_result(result: &DetectionResult, threshold: usize) -> Vec<Alert> {
        let mut alerts = Vec::new();
        if result.final_anomaly() {
            alerts.push(Alert::packet_anomaly(result));
        }
        if result.host_compromised {
            alerts.push(Alert::host_compromised(result, threshold));
        }
        alerts
    }
}
