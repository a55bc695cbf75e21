//! Decision counters for the authorization service

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the service counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Role graph loads (calls to the role provider)
    pub loads: u64,

    /// Decisions that granted the permission
    pub granted: u64,

    /// Decisions that denied the permission
    pub denied: u64,

    /// Denials caused by an assertion veto (included in `denied`)
    pub assertion_vetoes: u64,

    /// Calls that ended in an error instead of a decision
    pub errors: u64,
}

impl MetricsSnapshot {
    /// Total decisions made
    pub fn decisions(&self) -> u64 {
        self.granted + self.denied
    }

    /// Share of decisions that granted
    pub fn grant_rate(&self) -> f64 {
        let total = self.decisions();
        if total == 0 {
            0.0
        } else {
            self.granted as f64 / total as f64
        }
    }
}

/// Lock-free counters, shareable across per-request services
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    loads: AtomicU64,
    granted: AtomicU64,
    denied: AtomicU64,
    assertion_vetoes: AtomicU64,
    errors: AtomicU64,
}

impl ServiceMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a role graph load
    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a grant or deny
    pub fn record_decision(&self, granted: bool) {
        if granted {
            self.granted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.denied.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a deny coming from an assertion
    pub fn record_veto(&self) {
        self.assertion_vetoes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed call
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            loads: self.loads.load(Ordering::Relaxed),
            granted: self.granted.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            assertion_vetoes: self.assertion_vetoes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters
    pub fn reset(&self) {
        self.loads.store(0, Ordering::Relaxed);
        self.granted.store(0, Ordering::Relaxed);
        self.denied.store(0, Ordering::Relaxed);
        self.assertion_vetoes.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();
        metrics.record_load();
        metrics.record_decision(true);
        metrics.record_decision(false);
        metrics.record_decision(false);
        metrics.record_veto();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.loads, 1);
        assert_eq!(snapshot.decisions(), 3);
        assert_eq!(snapshot.assertion_vetoes, 1);
        assert!((snapshot.grant_rate() - 1.0 / 3.0).abs() < f64::EPSILON);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
