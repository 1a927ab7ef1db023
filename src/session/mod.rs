//! Detection session: features → scaling → per-model scores → vote → window → result.
//!
//! The session owns immutable handles to the loaded models and the mutable
//! per-entity windows. Batch calls are defined as repeated single calls, so
//! window history within a batch advances element by element, in order.

mod result;

pub use result::{DetectionResult, SourceId};

use crate::alerts::{Alert, AlertKind, AlertSink, TracingSink};
use crate::config::DetectorConfig;
use crate::ensemble::EnsembleVoter;
use crate::error::{DetectError, Result};
use crate::features::{FeatureAdapter, Sample, StandardScaler};
use crate::model::{AnomalyScorer, ArtifactLoader, ModelKind, OnnxArtifacts};
use crate::window::{SlidingWindow, WindowTracker};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Optional model that could not be loaded; its vote is fixed to non-anomaly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedModel {
    pub model: ModelKind,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub samples: u64,
    pub anomalies: u64,
    pub packet_alerts: u64,
    pub host_alerts: u64,
    pub errors: u64,
}

pub struct DetectionSession {
    adapter: FeatureAdapter,
    scaler: StandardScaler,
    isolation_forest: Arc<dyn AnomalyScorer>,
    one_class_svm: Arc<dyn AnomalyScorer>,
    autoencoder: Option<Arc<dyn AnomalyScorer>>,
    voter: EnsembleVoter,
    windows: WindowTracker,
    sinks: Vec<Box<dyn AlertSink>>,
    degraded: Vec<DegradedModel>,
    stats: SessionStats,
}

impl DetectionSession {
    /// Load ONNX models and scaler from the configured paths.
    pub fn load(config: &DetectorConfig) -> Result<Self> {
        Self::from_loader(config, &OnnxArtifacts::new(&config.models))
    }

    /// Missing scaler or required model is fatal; a missing autoencoder
    /// degrades the session.
    pub fn from_loader(config: &DetectorConfig, loader: &dyn ArtifactLoader) -> Result<Self> {
        config.validate()?;
        let scaler = loader.load_scaler()?;
        let isolation_forest = loader.load_model(ModelKind::IsolationForest)?;
        let one_class_svm = loader.load_model(ModelKind::OneClassSvm)?;

        let mut degraded = Vec::new();
        let autoencoder = match loader.load_model(ModelKind::Autoencoder) {
            Ok(m) => Some(m),
            // a pinned artifact that fails its checksum is tampering, not absence
            Err(e @ DetectError::ChecksumMismatch { .. }) => {
                error!(model = %ModelKind::Autoencoder, error = %e, "model artifact rejected");
                return Err(e);
            }
            Err(e) => {
                warn!(
                    model = %ModelKind::Autoencoder,
                    error = %e,
                    "optional model unavailable; its vote is fixed to non-anomaly and \
                     the remaining two models must agree"
                );
                degraded.push(DegradedModel {
                    model: ModelKind::Autoencoder,
                    reason: e.to_string(),
                });
                None
            }
        };

        info!(
            window_size = config.window.window_size,
            use_window = config.window.use_window,
            compromise_threshold = config.window.compromise_threshold,
            degraded = !degraded.is_empty(),
            "detection session ready"
        );

        Ok(Self {
            adapter: FeatureAdapter::new(),
            scaler,
            isolation_forest,
            one_class_svm,
            autoencoder,
            voter: EnsembleVoter::new(&config.thresholds),
            windows: WindowTracker::new(config.window),
            sinks: vec![Box::new(TracingSink)],
            degraded,
            stats: SessionStats::default(),
        })
    }

    /// Register an extra alert sink.
    pub fn with_sink(mut self, sink: impl AlertSink + 'static) -> Self {
        self.add_sink(Box::new(sink));
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    /// Drop all sinks, including the default tracing sink.
    pub fn without_sinks(mut self) -> Self {
        self.sinks.clear();
        self
    }

    pub fn predict_single(&mut self, sample: &Sample) -> Result<DetectionResult> {
        self.stats.samples += 1;
        let result = match self.evaluate(sample) {
            Ok(r) => r,
            Err(e) => {
                self.stats.errors += 1;
                warn!(src_ip = %sample.src_ip(), error = %e, "sample rejected");
                return Err(e);
            }
        };
        if result.final_anomaly() {
            self.stats.anomalies += 1;
        }
        self.dispatch(&result);
        Ok(result)
    }

    /// Results in input order; a failing sample yields its own error slot
    /// and leaves the window untouched.
    pub fn predict_batch<'a, I>(&mut self, samples: I) -> Vec<Result<DetectionResult>>
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        samples
            .into_iter()
            .map(|s| self.predict_single(s))
            .collect()
    }

    /// Count an input that failed before it could become a [`Sample`],
    /// e.g. a line that is not JSON.
    pub fn record_rejected(&mut self, error: &DetectError) {
        self.stats.samples += 1;
        self.stats.errors += 1;
        warn!(error = %error, "input rejected");
    }

    fn evaluate(&mut self, sample: &Sample) -> Result<DetectionResult> {
        let source = SourceId::from_sample(sample)?;
        let timestamp = sample.timestamp()?.unwrap_or_else(Utc::now);
        let features = self.adapter.adapt(sample)?;
        let input = self.scaler.transform(&features).to_f32();

        let if_score = self.isolation_forest.score(&input)?;
        let oc_score = self.one_class_svm.score(&input)?;
        let ae_score = match &self.autoencoder {
            Some(ae) => Some(ae.score(&input)?),
            None => None,
        };
        let verdict = self.voter.vote(if_score, oc_score, ae_score);

        // only a complete verdict reaches the window
        let window = self.windows.record(&source.ip, verdict.final_anomaly());
        Ok(DetectionResult::new(timestamp, source, verdict, window))
    }

    fn dispatch(&mut self, result: &DetectionResult) {
        let alerts = Alert::for_result(result, self.windows.config().compromise_threshold);
        for alert in &alerts {
            match alert.kind {
                AlertKind::PacketAnomaly { .. } => self.stats.packet_alerts += 1,
                AlertKind::HostCompromised { .. } => self.stats.host_alerts += 1,
            }
            for sink in &self.sinks {
                if let Err(e) = sink.emit(alert) {
                    warn!(
                        sink = sink.name(),
                        alert_id = %alert.id,
                        error = %e,
                        "alert sink failed"
                    );
                }
            }
        }
    }

    /// Give every sink a chance to deliver queued alerts.
    pub fn flush_sinks(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn degraded_models(&self) -> &[DegradedModel] {
        &self.degraded
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn window_snapshot(&self, ip: &str) -> Option<&SlidingWindow> {
        self.windows.window(ip)
    }

    pub fn windows(&self) -> &WindowTracker {
        &self.windows
    }

    /// Forget all window history, e.g. before replaying a capture.
    pub fn reset_windows(&mut self) {
        self.windows.reset();
    }

    pub fn voter(&self) -> &EnsembleVoter {
        &self.voter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::MemorySink;
    use crate::config::WindowConfig;
    use crate::model::InMemoryArtifacts;
    use std::path::PathBuf;

    /// Scores every sample as clearly normal or clearly anomalous depending on
    /// the `syn_count` feature.
    fn loader(with_ae: bool) -> InMemoryArtifacts {
        let syn = crate::features::feature_index("syn_count").unwrap();
        let l = InMemoryArtifacts::new()
            .with_scaler(StandardScaler::identity())
            .with_model(
                ModelKind::IsolationForest,
                Arc::new(move |x: &[f32]| if x[syn] > 5.0 { -0.5 } else { 0.1 }),
            )
            .with_model(
                ModelKind::OneClassSvm,
                Arc::new(move |x: &[f32]| if x[syn] > 5.0 { -1.0 } else { 0.5 }),
            );
        if with_ae {
            l.with_model(
                ModelKind::Autoencoder,
                Arc::new(move |x: &[f32]| if x[syn] > 5.0 { 0.5 } else { 0.001 }),
            )
        } else {
            l
        }
    }

    fn session(window: WindowConfig) -> DetectionSession {
        let config = DetectorConfig {
            window,
            ..Default::default()
        };
        DetectionSession::from_loader(&config, &loader(true))
            .unwrap()
            .without_sinks()
    }

    fn packet(ip: &str, syn: f64) -> Sample {
        Sample::new()
            .with("src_ip", ip)
            .with("src_port", 40000)
            .with("timestamp", 1_700_000_000.0)
            .with("syn_count", syn)
    }

    #[test]
    fn missing_required_model_is_fatal() {
        let l = InMemoryArtifacts::new()
            .with_scaler(StandardScaler::identity())
            .with_model(ModelKind::OneClassSvm, Arc::new(|_: &[f32]| 0.0));
        let err = DetectionSession::from_loader(&DetectorConfig::default(), &l)
            .err()
            .unwrap();
        assert!(matches!(err, DetectError::Configuration(_)));
    }

    #[test]
    fn missing_autoencoder_degrades() {
        let s = DetectionSession::from_loader(&DetectorConfig::default(), &loader(false)).unwrap();
        assert!(s.is_degraded());
        assert_eq!(s.degraded_models()[0].model, ModelKind::Autoencoder);
    }

    #[test]
    fn autoencoder_checksum_mismatch_is_fatal() {
        struct Tampered(InMemoryArtifacts);
        impl ArtifactLoader for Tampered {
            fn load_model(&self, kind: ModelKind) -> Result<Arc<dyn AnomalyScorer>> {
                match kind {
                    ModelKind::Autoencoder => Err(DetectError::ChecksumMismatch {
                        path: PathBuf::from("models/autoencoder.onnx"),
                        expected: "aa".into(),
                        actual: "bb".into(),
                    }),
                    _ => self.0.load_model(kind),
                }
            }
            fn load_scaler(&self) -> Result<StandardScaler> {
                self.0.load_scaler()
            }
        }
        let tampered = Tampered(loader(true));
        let err = DetectionSession::from_loader(&DetectorConfig::default(), &tampered)
            .err()
            .unwrap();
        assert!(matches!(err, DetectError::ChecksumMismatch { .. }));
    }

    #[test]
    fn rejected_input_is_counted() {
        let mut s = session(WindowConfig::default());
        s.predict_single(&packet("10.0.0.3", 0.0)).unwrap();
        s.record_rejected(&DetectError::FeatureSchema(
            crate::error::FeatureSchemaError::Malformed("eof".into()),
        ));
        assert_eq!(s.stats().samples, 2);
        assert_eq!(s.stats().errors, 1);
        assert!(s.window_snapshot("unknown").is_none());
    }

    #[test]
    fn invalid_window_config_is_fatal() {
        let config = DetectorConfig {
            window: WindowConfig {
                window_size: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(DetectionSession::from_loader(&config, &loader(true)).is_err());
    }

    #[test]
    fn single_prediction_carries_metadata() {
        let mut s = session(WindowConfig::default());
        let r = s.predict_single(&packet("10.0.0.7", 20.0)).unwrap();
        assert!(r.final_anomaly());
        assert_eq!(r.source, SourceId::new("10.0.0.7", Some(40000)));
        assert_eq!(r.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(r.window_anomaly_count, 1);
        assert!(!r.host_compromised);
    }

    #[test]
    fn failing_sample_does_not_touch_window() {
        let mut s = session(WindowConfig::default());
        let bad = packet("10.0.0.7", 20.0).with("ack_count", "many");
        let out = s.predict_batch([&packet("10.0.0.7", 20.0), &bad, &packet("10.0.0.7", 20.0)]);
        assert!(out[0].is_ok());
        assert!(matches!(out[1], Err(DetectError::FeatureSchema(_))));
        assert_eq!(out[2].as_ref().unwrap().window_anomaly_count, 2);
        assert_eq!(s.stats().errors, 1);
        assert_eq!(s.stats().samples, 3);
    }

    #[test]
    fn alerts_reach_sinks() {
        let sink = MemorySink::new();
        let mut s = session(WindowConfig {
            use_window: true,
            window_size: 10,
            compromise_threshold: 2,
        })
        .with_sink(sink.clone());
        s.predict_single(&packet("10.0.0.8", 20.0)).unwrap();
        assert_eq!(sink.len(), 1);
        s.predict_single(&packet("10.0.0.8", 20.0)).unwrap();
        assert_eq!(sink.len(), 3);
        // normal packet, host still compromised
        s.predict_single(&packet("10.0.0.8", 0.0)).unwrap();
        assert_eq!(sink.len(), 4);
        assert_eq!(s.stats().packet_alerts, 2);
        assert_eq!(s.stats().host_alerts, 2);
    }

    #[test]
    fn failing_model_is_a_per_sample_error() {
        struct Broken;
        impl AnomalyScorer for Broken {
            fn score(&self, _: &[f32]) -> Result<f64> {
                Err(DetectError::Inference {
                    model: ModelKind::Autoencoder,
                    reason: "boom".into(),
                })
            }
        }
        let l = loader(false).with_model(ModelKind::Autoencoder, Arc::new(Broken));
        let mut s = DetectionSession::from_loader(&DetectorConfig::default(), &l)
            .unwrap()
            .without_sinks();
        let err = s.predict_single(&packet("10.0.0.1", 0.0)).unwrap_err();
        assert!(matches!(err, DetectError::Inference { .. }));
        assert!(s.window_snapshot("10.0.0.1").is_none());
    }
}
