//! Build metrics collected through the observer hook.

use std::time::Duration;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::FactoryError;
use crate::name::AnyName;
use crate::observer::FactoryObserver;

/// Timing statistics for one component name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingStats {
    pub count: u64,
    pub failures: u64,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub total_duration: Duration,
}

impl TimingStats {
    fn new() -> Self {
        Self {
            count: 0,
            failures: 0,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            total_duration: Duration::ZERO,
        }
    }

    /// Add a new timing measurement
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.total_duration += duration;
    }

    pub fn average_duration(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total_duration / count,
            Err(_) => self.total_duration.div_f64(self.count as f64),
        }
    }
}

/// Observer that accumulates per-name build counts and durations.
///
/// With a single factory every name is built once, so `count` above 1
/// means the observer is shared between factories, or a name was rebuilt
/// by another factory from the same builder rounds.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    stats: RwLock<AHashMap<AnyName, TimingStats>>,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, name: &AnyName) -> Option<TimingStats> {
        self.stats.read().get(name).cloned()
    }

    /// Total successful builds observed.
    pub fn build_count(&self) -> u64 {
        self.stats.read().values().map(|s| s.count).sum()
    }

    pub fn failure_count(&self) -> u64 {
        self.stats.read().values().map(|s| s.failures).sum()
    }

    pub fn total_build_time(&self) -> Duration {
        self.stats.read().values().map(|s| s.total_duration).sum()
    }

    /// Names ordered by total build time, slowest first.
    pub fn slowest(&self, limit: usize) -> Vec<(AnyName, Duration)> {
        let mut all: Vec<(AnyName, Duration)> = self
            .stats
            .read()
            .iter()
            .map(|(name, s)| (name.clone(), s.total_duration))
            .collect();
        all.sort_by(|a, b| b.1.cmp(&a.1));
        all.truncate(limit);
        all
    }

    pub fn reset(&self) {
        self.stats.write().clear();
    }
}

impl FactoryObserver for MetricsObserver {
    fn built(&self, name: &AnyName, duration: Duration) {
        self.stats
            .write()
            .entry(name.clone())
            .or_insert_with(TimingStats::new)
            .record(duration);
    }

    fn build_failed(&self, name: &AnyName, _error: &FactoryError) {
        self.stats
            .write()
            .entry(name.clone())
            .or_insert_with(TimingStats::new)
            .failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;

    #[test]
    fn records_builds_and_failures_per_name() {
        let m = MetricsObserver::new();
        let a = Name::<u32>::of("a").into_any();
        let b = Name::<u32>::of("b").into_any();

        m.built(&a, Duration::from_millis(2));
        m.built(&a, Duration::from_millis(4));
        m.built(&b, Duration::from_millis(1));
        m.build_failed(&b, &FactoryError::other("boom"));

        let sa = m.stats(&a).unwrap();
        assert_eq!(sa.count, 2);
        assert_eq!(sa.average_duration(), Duration::from_millis(3));
        assert_eq!(m.build_count(), 3);
        assert_eq!(m.failure_count(), 1);
        assert_eq!(m.slowest(1)[0].0, a);

        m.reset();
        assert_eq!(m.build_count(), 0);
    }

    #[test]
    fn average_survives_counts_beyond_u32() {
        let mut stats = TimingStats::new();
        stats.count = u64::from(u32::MAX) + 1;
        stats.total_duration = Duration::from_secs(u64::from(u32::MAX) + 1);

        let average = stats.average_duration();
        assert!(average > Duration::from_millis(999) && average < Duration::from_millis(1001));
    }
}
