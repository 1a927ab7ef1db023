//! Host compromise signal: per-entity sliding windows over fused verdicts.
//!
//! Windows are created lazily on an entity's first verdict and live for the
//! session. Pushes are order-sensitive, so one tracker has a single writer.

mod sliding;

pub use sliding::{SlidingWindow, WindowPhase, WindowSnapshot};

use crate::config::WindowConfig;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct WindowTracker {
    config: WindowConfig,
    windows: HashMap<String, SlidingWindow>,
}

impl WindowTracker {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
        }
    }

    /// Push a verdict for `entity`. With windowing disabled nothing is
    /// recorded and the snapshot is always clear.
    pub fn record(&mut self, entity: &str, anomaly: bool) -> WindowSnapshot {
        if !self.config.use_window {
            return WindowSnapshot::CLEAR;
        }
        let config = self.config;
        self.windows
            .entry(entity.to_string())
            .or_insert_with(|| SlidingWindow::new(config.window_size, config.compromise_threshold))
            .push(anomaly)
    }

    pub fn window(&self, entity: &str) -> Option<&SlidingWindow> {
        self.windows.get(entity)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.use_window
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn entity_count(&self) -> usize {
        self.windows.len()
    }

    /// Entities whose window currently meets the compromise threshold.
    pub fn compromised(&self) -> impl Iterator<Item = &str> + '_ {
        self.windows
            .iter()
            .filter(|(_, w)| w.is_compromised())
            .map(|(k, _)| k.as_str())
    }

    pub fn reset(&mut self) {
        self.windows.clear();
    }
}

impl Default for WindowTracker {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize, threshold: usize) -> WindowConfig {
        WindowConfig {
            use_window: true,
            window_size: size,
            compromise_threshold: threshold,
        }
    }

    #[test]
    fn entities_have_independent_windows() {
        let mut t = WindowTracker::new(config(10, 2));
        t.record("10.0.0.1", true);
        t.record("10.0.0.2", true);
        let s = t.record("10.0.0.1", true);
        assert!(s.host_compromised);
        assert_eq!(t.window("10.0.0.2").unwrap().anomaly_count(), 1);
        assert_eq!(t.compromised().collect::<Vec<_>>(), vec!["10.0.0.1"]);
        assert_eq!(t.entity_count(), 2);
    }

    #[test]
    fn disabled_windowing_is_always_clear() {
        let mut t = WindowTracker::new(WindowConfig {
            use_window: false,
            ..config(3, 1)
        });
        for _ in 0..10 {
            assert_eq!(t.record("10.0.0.1", true), WindowSnapshot::CLEAR);
        }
        assert_eq!(t.entity_count(), 0);
    }

    #[test]
    fn reset_drops_history() {
        let mut t = WindowTracker::new(config(10, 1));
        assert!(t.record("h", true).host_compromised);
        t.reset();
        assert!(t.window("h").is_none());
        assert!(!t.record("h", false).host_compromised);
    }
}
