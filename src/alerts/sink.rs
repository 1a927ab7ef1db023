//! Alert sinks: where raised alerts go besides the detection result.

use super::{Alert, AlertKind};
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Observer for alert events. A failing sink never changes a detection result.
///
/// `emit` runs on the detection path and must not block on I/O that can
/// stall; sinks with slow backends hand the alert off and deliver it later.
pub trait AlertSink: Send {
    fn name(&self) -> &'static str;
    fn emit(&self, alert: &Alert) -> Result<(), SinkError>;

    /// Wait, within the sink's own deadline, for alerts handed off by `emit`
    /// to be delivered. Called on shutdown.
    fn flush(&self) {}
}

/// Writes alerts to the tracing log: packet anomalies at warn, compromised hosts at error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AlertSink for TracingSink {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn emit(&self, alert: &Alert) -> Result<(), SinkError> {
        match alert.kind {
            AlertKind::PacketAnomaly { votes } => warn!(
                alert_id = %alert.id,
                source = %alert.source,
                votes,
                "packet detected as anomaly"
            ),
            AlertKind::HostCompromised {
                window_anomaly_count,
                threshold,
            } => error!(
                alert_id = %alert.id,
                host = %alert.source.ip,
                window_anomaly_count,
                threshold,
                "host flagged as compromised"
            ),
        }
        Ok(())
    }
}

/// Collects alerts in memory. Clones share the same buffer, so a handle kept
/// by the caller sees what the session emitted.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .map(|a| a.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.alerts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut a) = self.alerts.lock() {
            a.clear();
        }
    }
}

impl AlertSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn emit(&self, alert: &Alert) -> Result<(), SinkError> {
        self.alerts
            .lock()
            .map_err(|_| "memory sink lock poisoned")?
            .push(alert.clone());
        Ok(())
    }
}
