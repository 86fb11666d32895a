//! Sliding-window rate and bandwidth measurement for one topic.

use std::collections::VecDeque;
use std::time::Instant;

use crate::data::MessageValue;

/// Default number of arrivals kept for measurement.
pub const DEFAULT_WINDOW: usize = 100;

/// Message rate over the current window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateStats {
    /// Messages per second (inverse of the mean inter-arrival time).
    pub rate: f64,
    /// Shortest inter-arrival time, in seconds.
    pub min_delta: f64,
    /// Longest inter-arrival time, in seconds.
    pub max_delta: f64,
    /// Standard deviation of the inter-arrival time, in seconds.
    pub std_dev: f64,
    /// Number of intervals measured.
    pub window: usize,
}

/// Bandwidth over the current window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthStats {
    pub bytes_per_sec: f64,
    pub mean_size: f64,
    pub min_size: usize,
    pub max_size: usize,
}

/// Arrival history and latest message of a monitored topic.
#[derive(Debug, Clone)]
pub struct TopicStats {
    window: usize,
    arrivals: VecDeque<(Instant, usize)>,
    last_message: Option<MessageValue>,
    received: u64,
}

impl Default for TopicStats {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl TopicStats {
    /// Create with a window of `window` arrivals (at least 2).
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(2),
            arrivals: VecDeque::new(),
            last_message: None,
            received: 0,
        }
    }

    /// Record one message arrival of `size` bytes.
    ///
    /// `message` is `None` when the payload could not be decoded; the arrival
    /// still counts for rate and bandwidth.
    pub fn record(&mut self, at: Instant, size: usize, message: Option<MessageValue>) {
        self.arrivals.push_back((at, size));
        if self.arrivals.len() > self.window {
            self.arrivals.pop_front();
        }
        if message.is_some() {
            self.last_message = message;
        }
        self.received += 1;
    }

    pub fn last_message(&self) -> Option<&MessageValue> {
        self.last_message.as_ref()
    }

    /// Total messages recorded since creation.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Rate over the window; `None` until two messages have arrived.
    pub fn rate(&self) -> Option<RateStats> {
        if self.arrivals.len() < 2 {
            return None;
        }

        let deltas: Vec<f64> = self
            .arrivals
            .iter()
            .zip(self.arrivals.iter().skip(1))
            .map(|((a, _), (b, _))| b.duration_since(*a).as_secs_f64())
            .collect();

        let n = deltas.len() as f64;
        let mean = deltas.iter().sum::<f64>() / n;
        if mean <= 0.0 {
            return None;
        }

        let variance = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        Some(RateStats {
            rate: 1.0 / mean,
            min_delta: deltas.iter().copied().fold(f64::INFINITY, f64::min),
            max_delta: deltas.iter().copied().fold(0.0, f64::max),
            std_dev: variance.sqrt(),
            window: deltas.len(),
        })
    }

    /// Bandwidth from the first arrival in the window up to `now`; `None`
    /// until two messages have arrived.
    pub fn bandwidth(&self, now: Instant) -> Option<BandwidthStats> {
        if self.arrivals.len() < 2 {
            return None;
        }

        let (first, _) = self.arrivals.front()?;
        let elapsed = now.saturating_duration_since(*first).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }

        let total: usize = self.arrivals.iter().map(|(_, size)| size).sum();
        Some(BandwidthStats {
            bytes_per_sec: total as f64 / elapsed,
            mean_size: total as f64 / self.arrivals.len() as f64,
            min_size: self.arrivals.iter().map(|(_, s)| *s).min().unwrap_or(0),
            max_size: self.arrivals.iter().map(|(_, s)| *s).max().unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn feed(stats: &mut TopicStats, start: Instant, period_ms: u64, sizes: &[usize]) {
        for (i, size) in sizes.iter().enumerate() {
            let at = start + Duration::from_millis(period_ms * i as u64);
            stats.record(at, *size, Some(MessageValue::Int(i as i64)));
        }
    }

    #[test]
    fn no_stats_before_two_messages() {
        let mut stats = TopicStats::default();
        let now = Instant::now();
        assert!(stats.rate().is_none());
        assert!(stats.bandwidth(now).is_none());

        stats.record(now, 10, None);
        assert!(stats.rate().is_none());
        assert!(stats.bandwidth(now).is_none());
        assert!(stats.last_message().is_none());
    }

    #[test]
    fn rate_from_regular_intervals() {
        let mut stats = TopicStats::default();
        let start = Instant::now();
        feed(&mut stats, start, 100, &[10; 11]);

        let rate = stats.rate().unwrap();
        assert!((rate.rate - 10.0).abs() < 1e-6);
        assert!(rate.std_dev < 1e-9);
        assert_eq!(rate.window, 10);
        assert!((rate.min_delta - 0.1).abs() < 1e-9);
        assert!((rate.max_delta - 0.1).abs() < 1e-9);
    }

    #[test]
    fn bandwidth_measured_up_to_now() {
        let mut stats = TopicStats::default();
        let start = Instant::now();
        feed(&mut stats, start, 500, &[100, 300]);

        let bw = stats.bandwidth(start + Duration::from_secs(2)).unwrap();
        assert!((bw.bytes_per_sec - 200.0).abs() < 1e-6);
        assert!((bw.mean_size - 200.0).abs() < 1e-9);
        assert_eq!(bw.min_size, 100);
        assert_eq!(bw.max_size, 300);
    }

    #[test]
    fn window_drops_oldest_arrivals() {
        let mut stats = TopicStats::new(3);
        let start = Instant::now();
        feed(&mut stats, start, 1000, &[1, 1, 1, 1, 1]);

        assert_eq!(stats.received(), 5);
        assert_eq!(stats.rate().unwrap().window, 2);
        assert_eq!(stats.last_message(), Some(&MessageValue::Int(4)));
    }

    #[test]
    fn undecodable_arrival_keeps_previous_message() {
        let mut stats = TopicStats::default();
        let now = Instant::now();
        stats.record(now, 1, Some(MessageValue::Int(1)));
        stats.record(now, 1, None);
        assert_eq!(stats.last_message(), Some(&MessageValue::Int(1)));
    }
}
