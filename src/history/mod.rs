//! Fixed-capacity rolling windows of time-series samples.

mod set;

pub use set::*;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// One point in a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// FIFO ring of samples with a capacity fixed at construction.
///
/// Values are always finite and timestamps never lie in the future: a
/// non-finite value is stored as `0.0` and a future timestamp is clamped to
/// the time of the push.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl HistoryBuffer {
    /// A zero capacity is bumped to one so the buffer can hold the latest value.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, timestamp: DateTime<Utc>, value: f64) {
        let value = if value.is_finite() { value } else { 0.0 };
        let timestamp = timestamp.min(Utc::now());

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { timestamp, value });
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    /// Mean of the retained values, `0.0` when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.value).sum::<f64>() / self.samples.len() as f64
    }

    /// Largest retained value, `0.0` when empty.
    pub fn peak(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| s.value)
            .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_keeps_most_recent_in_push_order() {
        let mut buf = HistoryBuffer::new(5);
        let base = Utc::now() - ChronoDuration::minutes(10);
        for i in 0..23 {
            buf.push(base + ChronoDuration::seconds(i), i as f64);
        }

        let values: Vec<f64> = buf.snapshot().iter().map(|s| s.value).collect();
        assert_eq!(buf.len(), 5);
        assert_eq!(values, vec![18.0, 19.0, 20.0, 21.0, 22.0]);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        for capacity in [1, 2, 10, 60] {
            let mut buf = HistoryBuffer::new(capacity);
            for i in 0..(capacity * 3 + 1) {
                buf.push(Utc::now(), i as f64);
                assert!(buf.len() <= capacity);
            }
            assert_eq!(buf.len(), capacity);
        }
    }

    #[test]
    fn test_non_finite_values_become_zero() {
        let mut buf = HistoryBuffer::new(3);
        buf.push(Utc::now(), f64::NAN);
        buf.push(Utc::now(), f64::INFINITY);
        buf.push(Utc::now(), f64::NEG_INFINITY);
        assert!(buf.iter().all(|s| s.value == 0.0));
    }

    #[test]
    fn test_future_timestamp_is_clamped() {
        let mut buf = HistoryBuffer::new(3);
        let future = Utc::now() + ChronoDuration::hours(1);
        buf.push(future, 1.0);
        assert!(buf.latest().unwrap().timestamp <= Utc::now());
    }

    #[test]
    fn test_stats_and_clear() {
        let mut buf = HistoryBuffer::new(4);
        assert_eq!(buf.average(), 0.0);
        assert_eq!(buf.peak(), 0.0);

        for v in [10.0, 30.0, 20.0] {
            buf.push(Utc::now(), v);
        }
        assert_eq!(buf.average(), 20.0);
        assert_eq!(buf.peak(), 30.0);

        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 4);
    }
}
