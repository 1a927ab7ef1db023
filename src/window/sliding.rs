//! Bounded FIFO of recent verdicts for one entity, with a running anomaly count.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPhase {
    Empty,
    Filling,
    Full,
}

/// Window outputs after a push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub window_anomaly_count: usize,
    pub host_compromised: bool,
}

impl WindowSnapshot {
    /// Reported when windowing is disabled.
    pub const CLEAR: WindowSnapshot = WindowSnapshot {
        window_anomaly_count: 0,
        host_compromised: false,
    };
}

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    verdicts: VecDeque<bool>,
    capacity: usize,
    anomalies: usize,
    threshold: usize,
}

impl SlidingWindow {
    /// `capacity` below 1 is raised to 1.
    pub fn new(capacity: usize, threshold: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            verdicts: VecDeque::with_capacity(capacity),
            capacity,
            anomalies: 0,
            threshold,
        }
    }

    /// Append the newest verdict, evicting the oldest when full.
    pub fn push(&mut self, anomaly: bool) -> WindowSnapshot {
        if self.verdicts.len() == self.capacity {
            if let Some(true) = self.verdicts.pop_front() {
                self.anomalies -= 1;
            }
        }
        self.verdicts.push_back(anomaly);
        if anomaly {
            self.anomalies += 1;
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            window_anomaly_count: self.anomalies,
            host_compromised: self.is_compromised(),
        }
    }

    pub fn is_compromised(&self) -> bool {
        !self.verdicts.is_empty() && self.anomalies >= self.threshold
    }

    pub fn phase(&self) -> WindowPhase {
        match self.verdicts.len() {
            0 => WindowPhase::Empty,
            n if n < self.capacity => WindowPhase::Filling,
            _ => WindowPhase::Full,
        }
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.verdicts.iter().copied()
    }
}
