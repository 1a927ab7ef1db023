//! Combines the three gated model scores into one majority verdict.

use crate::config::ThresholdsConfig;
use crate::model::{ModelKind, ThresholdGate};
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Votes needed for an anomalous verdict, whatever the number of live models.
pub const QUORUM: usize = 2;

/// Exact majority law over the three votes.
pub fn majority(votes: [bool; 3]) -> bool {
    votes.iter().filter(|v| **v).count() >= QUORUM
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelScore {
    pub model: ModelKind,
    /// `None` when the model is unavailable
    pub score: Option<f64>,
    pub anomaly: bool,
}

impl ModelScore {
    pub fn gated(model: ModelKind, score: f64, gate: &ThresholdGate) -> Self {
        Self {
            model,
            score: Some(score),
            anomaly: gate.is_anomalous(score),
        }
    }

    /// Fixed non-anomaly vote for a model that is not loaded.
    pub fn unavailable(model: ModelKind) -> Self {
        Self {
            model,
            score: None,
            anomaly: false,
        }
    }
}

/// Fused decision for one sample. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    scores: [ModelScore; 3],
    final_anomaly: bool,
}

impl Verdict {
    pub fn new(
        isolation_forest: ModelScore,
        one_class_svm: ModelScore,
        autoencoder: ModelScore,
    ) -> Self {
        let scores = [isolation_forest, one_class_svm, autoencoder];
        let final_anomaly = majority(scores.map(|s| s.anomaly));
        Self {
            scores,
            final_anomaly,
        }
    }

    pub fn isolation_forest(&self) -> &ModelScore {
        &self.scores[0]
    }

    pub fn one_class_svm(&self) -> &ModelScore {
        &self.scores[1]
    }

    pub fn autoencoder(&self) -> &ModelScore {
        &self.scores[2]
    }

    pub fn scores(&self) -> &[ModelScore; 3] {
        &self.scores
    }

    pub fn votes(&self) -> [bool; 3] {
        self.scores.map(|s| s.anomaly)
    }

    pub fn vote_count(&self) -> usize {
        self.votes().iter().filter(|v| **v).count()
    }

    pub fn final_anomaly(&self) -> bool {
        self.final_anomaly
    }
}

/// Flat layout: `if_score, if_anomaly, oc_score, ..., final_anomaly`.
impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("Verdict", 7)?;
        for s in &self.scores {
            let (score_key, anomaly_key) = match s.model {
                ModelKind::IsolationForest => ("if_score", "if_anomaly"),
                ModelKind::OneClassSvm => ("oc_score", "oc_anomaly"),
                ModelKind::Autoencoder => ("ae_score", "ae_anomaly"),
            };
            st.serialize_field(score_key, &s.score)?;
            st.serialize_field(anomaly_key, &s.anomaly)?;
        }
        st.serialize_field("final_anomaly", &self.final_anomaly)?;
        st.end()
    }
}

/// Gates each model's score against its configured threshold and votes.
///
/// The quorum stays at [`QUORUM`] when the autoencoder is unavailable, so a
/// degraded ensemble needs the two remaining models to agree. This is a
/// conservative policy: it lowers sensitivity while degraded rather than
/// letting a single model decide.
#[derive(Debug, Clone)]
pub struct EnsembleVoter {
    gates: [ThresholdGate; 3],
}

impl EnsembleVoter {
    pub fn new(thresholds: &ThresholdsConfig) -> Self {
        Self {
            gates: ModelKind::ALL.map(|k| ThresholdGate::for_model(k, thresholds.for_model(k))),
        }
    }

    pub fn gate(&self, kind: ModelKind) -> &ThresholdGate {
        match kind {
            ModelKind::IsolationForest => &self.gates[0],
            ModelKind::OneClassSvm => &self.gates[1],
            ModelKind::Autoencoder => &self.gates[2],
        }
    }

    pub fn vote(&self, if_score: f64, oc_score: f64, ae_score: Option<f64>) -> Verdict {
        let ae = match ae_score {
            Some(s) => {
                ModelScore::gated(ModelKind::Autoencoder, s, self.gate(ModelKind::Autoencoder))
            }
            None => ModelScore::unavailable(ModelKind::Autoencoder),
        };
        Verdict::new(
            ModelScore::gated(
                ModelKind::IsolationForest,
                if_score,
                self.gate(ModelKind::IsolationForest),
            ),
            ModelScore::gated(ModelKind::OneClassSvm, oc_score, self.gate(ModelKind::OneClassSvm)),
            ae,
        )
    }
}

impl Default for EnsembleVoter {
    fn default() -> Self {
        Self::new(&ThresholdsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_law_over_all_vote_combinations() {
        for bits in 0u8..8 {
            let votes = [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0];
            assert_eq!(majority(votes), bits.count_ones() >= 2, "votes {votes:?}");
        }
    }

    #[test]
    fn default_thresholds_gate_each_direction() {
        let voter = EnsembleVoter::default();
        let v = voter.vote(-0.5, -0.1, Some(0.02));
        assert_eq!(v.votes(), [true, true, true]);
        assert!(v.final_anomaly());

        let v = voter.vote(0.1, 0.3, Some(0.001));
        assert_eq!(v.votes(), [false, false, false]);
        assert!(!v.final_anomaly());
    }

    #[test]
    fn two_of_three_is_enough() {
        let v = EnsembleVoter::default().vote(-0.5, 0.3, Some(0.5));
        assert_eq!(v.vote_count(), 2);
        assert!(v.final_anomaly());
    }

    #[test]
    fn degraded_ensemble_needs_both_remaining_models() {
        let voter = EnsembleVoter::default();
        let one = voter.vote(-0.5, 0.3, None);
        assert!(!one.autoencoder().anomaly);
        assert_eq!(one.autoencoder().score, None);
        assert!(!one.final_anomaly());

        let both = voter.vote(-0.5, -0.3, None);
        assert!(both.final_anomaly());
    }

    #[test]
    fn overridden_thresholds_apply() {
        let thresholds = ThresholdsConfig {
            autoencoder: 1.0,
            ..Default::default()
        };
        let v = EnsembleVoter::new(&thresholds).vote(0.0, 0.0, Some(0.5));
        assert!(!v.autoencoder().anomaly);
    }

    #[test]
    fn serializes_flat() {
        let v = EnsembleVoter::default().vote(-0.5, 0.3, None);
        let json = serde_json::to_value(v).unwrap();
        assert_eq!(json["if_score"], -0.5);
        assert_eq!(json["if_anomaly"], true);
        assert_eq!(json["oc_anomaly"], false);
        assert!(json["ae_score"].is_null());
        assert_eq!(json["final_anomaly"], false);
    }
}
