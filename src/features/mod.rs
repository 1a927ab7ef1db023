//! Flow feature schema, raw samples, and the fixed-order vector the models consume.

mod adapter;
mod sample;
mod scaler;

pub use adapter::{resolve_ratio, FeatureAdapter};
pub use sample::Sample;
pub use scaler::StandardScaler;

use serde::{Deserialize, Serialize};

/// Number of features in the flow schema.
pub const FEATURE_COUNT: usize = 22;

/// Field names in model input order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "bytes_fwd",
    "bytes_bwd",
    "pkts_fwd",
    "pkts_bwd",
    "duration_ms",
    "pkt_len_mean",
    "pkt_len_std",
    "pkt_len_max",
    "pkt_len_min",
    "pkt_rate",
    "byte_rate",
    "syn_count",
    "fin_count",
    "rst_count",
    "psh_count",
    "ack_count",
    "retransmissions",
    "out_of_order",
    "small_pkt_ratio",
    "idle_time_mean",
    "fwd_bwd_ratio_bytes",
    "fwd_bwd_ratio_pkts",
];

/// Finite stand-in for a ratio with a zero denominator and a positive numerator.
pub const UNBOUNDED_RATIO: f64 = 1.0e6;

/// Position of `name` in the schema.
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|f| *f == name)
}

/// Fixed-size feature vector for model input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn zeros() -> Self {
        Self::new([0.0; FEATURE_COUNT])
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|i| self.values[i])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Narrow to f32 for ONNX input.
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|v| *v as f32).collect()
    }

    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::zeros()
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        Self::new(values)
    }
}
