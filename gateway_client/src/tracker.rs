//! Latency Tracker Module
//!
//! Records gateway request round-trip times per action in HdrHistograms
//! (microsecond resolution) and reports percentile statistics.

use hdrhistogram::{CreationError, Histogram};
use std::collections::BTreeMap;
use std::time::Duration;

/// Highest trackable round trip: one hour in microseconds.
const MAX_LATENCY_US: u64 = 3_600_000_000;

/// Latency statistics for one action, in microseconds
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub max: u64,
}

/// Per-action round-trip latency histograms
pub struct LatencyTracker {
    /// Keyed by action name so the summary prints in a stable order
    histograms: BTreeMap<String, Histogram<u64>>,
    significant_figures: u8,
}

impl LatencyTracker {
    /// Create a tracker whose histograms keep `significant_figures` digits (0..=5).
    pub fn new(significant_figures: u8) -> Result<Self, CreationError> {
        // Validate up front so `record` never has to deal with creation errors
        Histogram::<u64>::new_with_bounds(1, MAX_LATENCY_US, significant_figures)?;
        Ok(Self {
            histograms: BTreeMap::new(),
            significant_figures,
        })
    }

    /// Record one round trip for `action`
    pub fn record(&mut self, action: &str, elapsed: Duration) {
        let micros = (elapsed.as_micros() as u64).clamp(1, MAX_LATENCY_US);
        if !self.histograms.contains_key(action) {
            match Histogram::new_with_bounds(1, MAX_LATENCY_US, self.significant_figures) {
                Ok(h) => {
                    self.histograms.insert(action.to_string(), h);
                }
                Err(e) => {
                    log::warn!("Failed to create histogram for {}: {}", action, e);
                    return;
                }
            }
        }
        if let Some(histogram) = self.histograms.get_mut(action) {
            if let Err(e) = histogram.record(micros) {
                log::warn!("Failed to record latency {}us for {}: {}", micros, action, e);
            }
        }
    }

    /// Statistics for `action`, `None` if nothing was recorded
    pub fn stats(&self, action: &str) -> Option<LatencyStats> {
        self.histograms.get(action).map(|h| LatencyStats {
            count: h.len(),
            p50: h.value_at_quantile(0.50),
            p90: h.value_at_quantile(0.90),
            p99: h.value_at_quantile(0.99),
            max: h.max(),
        })
    }

    pub fn total_count(&self) -> u64 {
        self.histograms.values().map(Histogram::len).sum()
    }

    /// One line per action
    pub fn summary(&self) -> String {
        if self.histograms.is_empty() {
            return "No requests recorded".to_string();
        }
        self.histograms
            .keys()
            .filter_map(|action| self.stats(action).map(|s| (action, s)))
            .map(|(action, s)| {
                format!(
                    "{:<12} count={} p50={}us p90={}us p99={}us max={}us",
                    action, s.count, s.p50, s.p90, s.p99, s.max
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tracker_is_empty() {
        let tracker = LatencyTracker::new(3).unwrap();
        assert_eq!(tracker.total_count(), 0);
        assert!(tracker.stats("buy").is_none());
        assert_eq!(tracker.summary(), "No requests recorded");
    }

    #[test]
    fn test_invalid_significant_figures() {
        assert!(LatencyTracker::new(6).is_err());
    }

    #[test]
    fn test_record_per_action() {
        let mut tracker = LatencyTracker::new(3).unwrap();
        tracker.record("buy", Duration::from_millis(2));
        tracker.record("buy", Duration::from_millis(4));
        tracker.record("start", Duration::from_micros(500));

        let buy = tracker.stats("buy").unwrap();
        assert_eq!(buy.count, 2);
        assert!(buy.max >= 3_990 && buy.max <= 4_010);
        assert_eq!(tracker.stats("start").unwrap().count, 1);
        assert_eq!(tracker.total_count(), 3);
    }

    #[test]
    fn test_zero_duration_is_clamped() {
        let mut tracker = LatencyTracker::new(3).unwrap();
        tracker.record("orders", Duration::ZERO);
        assert_eq!(tracker.stats("orders").unwrap().max, 1);
    }
}
