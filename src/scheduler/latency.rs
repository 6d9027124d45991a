//! Rolling window of recent dispatch latencies.
//!
//! Feeds `estimated_wait`: until enough dispatches have completed the
//! configured default applies, afterwards the measured average takes over.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

pub struct LatencyWindow {
    samples: Mutex<VecDeque<Duration>>,
    capacity: usize,
    fallback: Duration,
}

impl LatencyWindow {
    pub fn new(capacity: usize, fallback: Duration) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            fallback,
        }
    }

    pub fn record(&self, latency: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(latency);
    }

    /// Average over the window, or the configured fallback when no dispatch
    /// has completed yet.
    pub fn average(&self) -> Duration {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return self.fallback;
        }
        let total: Duration = samples.iter().sum();
        total / samples.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_uses_fallback() {
        let window = LatencyWindow::new(8, Duration::from_secs(30));
        assert_eq!(window.average(), Duration::from_secs(30));
    }

    #[test]
    fn average_over_samples() {
        let window = LatencyWindow::new(8, Duration::from_secs(30));
        window.record(Duration::from_secs(10));
        window.record(Duration::from_secs(20));
        assert_eq!(window.average(), Duration::from_secs(15));
    }

    #[test]
    fn window_discards_oldest_beyond_capacity() {
        let window = LatencyWindow::new(2, Duration::from_secs(30));
        window.record(Duration::from_secs(100));
        window.record(Duration::from_secs(10));
        window.record(Duration::from_secs(20));
        assert_eq!(window.average(), Duration::from_secs(15));
    }
}
