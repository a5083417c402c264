//! Bounded window of `(red, ir)` PPG samples.
//!
//! Samples are kept in acquisition order. Pushing past `capacity` evicts the
//! oldest samples down to `keep_on_overflow`, so the estimator always sees
//! the most recent stretch of signal. Every sample carries its acquisition
//! time, so the window start moves with eviction and the effective sample
//! rate stays correct after a trim.
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SampleWindow {
    red: VecDeque<f32>,
    ir: VecDeque<f32>,
    at: VecDeque<Instant>,
    capacity: usize,
    keep_on_overflow: usize,
}

impl SampleWindow {
    /// `keep_on_overflow` is clamped to `1..=capacity`.
    pub fn new(capacity: usize, keep_on_overflow: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            red: VecDeque::with_capacity(capacity),
            ir: VecDeque::with_capacity(capacity),
            at: VecDeque::with_capacity(capacity),
            capacity,
            keep_on_overflow: keep_on_overflow.clamp(1, capacity),
        }
    }

    /// Append one sample acquired at `at`.
    pub fn push(&mut self, red: u32, ir: u32, at: Instant) {
        self.red.push_back(red as f32);
        self.ir.push_back(ir as f32);
        self.at.push_back(at);
        if self.red.len() > self.capacity {
            let dropped = self.red.len() - self.keep_on_overflow;
            self.drop_oldest(dropped);
            tracing::trace!(dropped, kept = self.red.len(), "sample window overflow");
        }
    }

    fn drop_oldest(&mut self, n: usize) {
        self.red.drain(..n);
        self.ir.drain(..n);
        self.at.drain(..n);
    }

    /// Keep only the newest `n` samples.
    pub fn retain_tail(&mut self, n: usize) {
        let len = self.red.len();
        if n < len {
            self.drop_oldest(len - n);
        }
    }

    pub fn clear(&mut self) {
        self.red.clear();
        self.ir.clear();
        self.at.clear();
    }

    pub fn len(&self) -> usize {
        self.red.len()
    }

    pub fn is_empty(&self) -> bool {
        self.red.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Acquisition time of the oldest retained sample.
    pub fn started_at(&self) -> Option<Instant> {
        self.at.front().copied()
    }

    /// Time covered by the retained samples: from the oldest sample to the
    /// newest, plus one `sample_period` for the newest sample's own slot.
    pub fn span(&self, sample_period: Duration) -> Duration {
        match (self.at.front(), self.at.back()) {
            (Some(first), Some(last)) => last.saturating_duration_since(*first) + sample_period,
            _ => Duration::ZERO,
        }
    }

    /// Contiguous copies of both channels, oldest first.
    pub fn channels(&self) -> (Vec<f32>, Vec<f32>) {
        (
            self.red.iter().copied().collect(),
            self.ir.iter().copied().collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_keeps_newest_tail() {
        let t0 = Instant::now();
        let mut w = SampleWindow::new(5, 3);
        for i in 0..6u32 {
            w.push(i, i + 100, t0 + Duration::from_millis(u64::from(i) * 20));
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.started_at(), Some(t0 + Duration::from_millis(60)));
        let (red, ir) = w.channels();
        assert_eq!(red, vec![3.0, 4.0, 5.0]);
        assert_eq!(ir, vec![103.0, 104.0, 105.0]);
    }

    #[test]
    fn start_time_follows_oldest_sample() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(2);
        let mut w = SampleWindow::new(10, 5);
        assert!(w.started_at().is_none());
        w.push(1, 1, t0);
        w.push(2, 2, t1);
        assert_eq!(w.started_at(), Some(t0));
        w.retain_tail(1);
        assert_eq!(w.started_at(), Some(t1));
        assert_eq!(w.channels().0, vec![2.0]);
        w.clear();
        assert!(w.is_empty() && w.started_at().is_none());
    }

    #[test]
    fn span_counts_one_period_per_sample() {
        let t0 = Instant::now();
        let period = Duration::from_millis(20);
        let mut w = SampleWindow::new(150, 50);
        assert_eq!(w.span(period), Duration::ZERO);
        for i in 0..100u32 {
            w.push(60_000, 80_000, t0 + period * i);
        }
        // 100 samples at 50 Hz cover exactly 2 s
        assert_eq!(w.span(period), Duration::from_secs(2));
        w.retain_tail(50);
        assert_eq!(w.span(period), Duration::from_secs(1));
    }
}
