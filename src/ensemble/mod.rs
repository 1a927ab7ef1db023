//! Majority-vote fusion of the per-model flags.

mod voter;

pub use voter::{majority, EnsembleVoter, ModelScore, Verdict, QUORUM};
