//! NIDS agent: ensemble network intrusion detection over per-connection feature records.
//!
//! Modular structure:
//! - [`features`]: Sample records, 22-feature schema, standard scaler
//! - [`model`]: ONNX anomaly scorers, threshold gates, artifact loading
//! - [`ensemble`]: Majority-vote fusion of the three model decisions
//! - [`window`]: Per-source sliding window of verdicts and compromise flag
//! - [`session`]: Detection session: single and batch prediction
//! - [`alerts`]: Alert events and sinks
//! - [`storage`]: Encrypted local alert journal
//! - [`uplink`]: Optional forwarding of alerts to a collector
//! - [`logging`]: Structured JSON logging

pub mod alerts;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod session;
pub mod storage;
pub mod uplink;
pub mod window;

pub use alerts::{Alert, AlertKind, AlertSink, MemorySink, TracingSink};
pub use config::DetectorConfig;
pub use ensemble::{EnsembleVoter, Verdict};
pub use error::{DetectError, FeatureSchemaError, Result};
pub use features::{FeatureAdapter, FeatureVector, Sample, StandardScaler};
pub use logging::StructuredLogger;
pub use model::{AnomalyScorer, ModelKind, ThresholdGate};
pub use session::{DetectionResult, DetectionSession, SourceId};
pub use storage::AlertJournal;
pub use uplink::AlertUplink;
pub use window::{SlidingWindow, WindowTracker};
