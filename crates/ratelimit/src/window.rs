//! A weighted sliding window over recent events, used once per (peer,
//! granularity) pair (spec §4.8: "sliding windows of 1s/1min/1h").

use std::{collections::VecDeque, time::{Duration, Instant}};

#[derive(Debug, Default)]
pub struct SlidingWindow {
    entries: VecDeque<(Instant, f64)>,
    sum: f64,
}

impl SlidingWindow {
    fn evict_expired(&mut self, now: Instant, window: Duration) {
        while let Some(&(at, weight)) = self.entries.front() {
            if now.duration_since(at) > window {
                self.entries.pop_front();
                self.sum -= weight;
            } else {
                break;
            }
        }
    }

    /// Total weight currently inside the window.
    pub fn load(&mut self, now: Instant, window: Duration) -> f64 {
        self.evict_expired(now, window);
        self.sum
    }

    pub fn record(&mut self, now: Instant, weight: f64) {
        self.entries.push_back((now, weight));
        self.sum += weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_drop_out_of_the_window() {
        let mut window = SlidingWindow::default();
        let t0 = Instant::now();
        window.record(t0, 1.0);
        assert_eq!(window.load(t0, Duration::from_secs(1)), 1.0);
        assert_eq!(
            window.load(t0 + Duration::from_secs(2), Duration::from_secs(1)),
            0.0
        );
    }
}
