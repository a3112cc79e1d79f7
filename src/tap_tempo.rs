// Copyright (c) 2024 Mike Tsao

//! Estimating a tempo from a sequence of taps.

use crate::types::Tempo;
use bounded_vec_deque::BoundedVecDeque;
use log::debug;

/// Derives a BPM from tap timestamps. Intervals more than one standard
/// deviation from the mean are ignored, so a single sloppy tap doesn't throw
/// off the estimate.
///
/// After each tap that yields an estimate, a commit is proposed for five
/// beats later. If no further tap arrives by then,
/// [poll_commit()](Self::poll_commit) hands back the BPM and the tap history
/// starts over.
#[derive(Debug)]
pub struct TapTempoEstimator {
    intervals: BoundedVecDeque<u64>,
    last_tap_ns: Option<u64>,
    estimate: Option<u32>,
    confidence: f32,
    last_outlier_count: usize,
    pending_commit: Option<(u64, u32)>,
}
impl Default for TapTempoEstimator {
    fn default() -> Self {
        Self {
            intervals: BoundedVecDeque::new(Self::HISTORY_CAPACITY),
            last_tap_ns: None,
            estimate: None,
            confidence: 0.0,
            last_outlier_count: 0,
            pending_commit: None,
        }
    }
}
impl TapTempoEstimator {
    /// The number of recent intervals kept.
    pub const HISTORY_CAPACITY: usize = 64;

    /// How many beats at the estimated tempo to wait before committing it.
    pub const COMMIT_AFTER_BEATS: u64 = 5;

    const NANOS_PER_MINUTE: f64 = 60_000_000_000.0;

    /// Records a tap and returns the current estimate, if there is one. The
    /// first tap of a sequence never produces an estimate. A timestamp at or
    /// before the previous tap starts a new sequence.
    pub fn on_tap(&mut self, timestamp_ns: u64) -> Option<u32> {
        let Some(last_tap_ns) = self.last_tap_ns.replace(timestamp_ns) else {
            return None;
        };
        if timestamp_ns <= last_tap_ns {
            debug!("tap at {timestamp_ns} isn't after {last_tap_ns}; starting over");
            self.restart_sequence();
            return None;
        }
        self.intervals.push_back(timestamp_ns - last_tap_ns);

        let (mean, outlier_count, latest_is_outlier) = self.filtered_mean();
        self.last_outlier_count = outlier_count;
        let bpm = (Self::NANOS_PER_MINUTE / mean).round();
        let bpm = if bpm >= Tempo::MIN_VALUE as f64 && bpm <= Tempo::MAX_VALUE as f64 {
            Some(bpm as u32)
        } else {
            debug!("tap estimate of {bpm} BPM is out of range");
            None
        };

        self.update_confidence(bpm, latest_is_outlier);
        self.estimate = bpm;
        self.pending_commit = bpm.map(|bpm| {
            (
                timestamp_ns + Self::COMMIT_AFTER_BEATS * 60_000_000_000 / bpm as u64,
                bpm,
            )
        });
        bpm
    }

    // Returns the mean of the intervals within one standard deviation of the
    // overall mean, how many intervals fell outside, and whether the newest
    // one did.
    fn filtered_mean(&self) -> (f64, usize, bool) {
        let count = self.intervals.len() as f64;
        let mean = self.intervals.iter().map(|i| *i as f64).sum::<f64>() / count;
        let variance = self
            .intervals
            .iter()
            .map(|i| (*i as f64 - mean).powi(2))
            .sum::<f64>()
            / count;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            return (mean, 0, false);
        }

        let is_inlier = |interval: u64| ((interval as f64 - mean) / std_dev).abs() < 1.0;
        let (sum, kept) = self
            .intervals
            .iter()
            .filter(|i| is_inlier(**i))
            .fold((0.0, 0usize), |(sum, kept), i| (sum + *i as f64, kept + 1));
        let latest_is_outlier = self.intervals.back().is_some_and(|i| !is_inlier(*i));
        let outlier_count = self.intervals.len() - kept;
        if kept == 0 {
            (mean, outlier_count, latest_is_outlier)
        } else {
            (sum / kept as f64, outlier_count, latest_is_outlier)
        }
    }

    fn update_confidence(&mut self, bpm: Option<u32>, latest_is_outlier: bool) {
        if let (Some(previous), Some(current)) = (self.estimate, bpm) {
            let jump = previous.abs_diff(current);
            if jump <= 2 {
                self.confidence += 0.2;
            } else if jump > 10 {
                self.confidence -= 0.3;
            }
        }
        if latest_is_outlier {
            self.confidence -= 0.25;
        }
        self.confidence = self.confidence.clamp(0.0, 1.0);
    }

    fn restart_sequence(&mut self) {
        self.intervals.clear();
        self.estimate = None;
        self.last_outlier_count = 0;
        self.pending_commit = None;
    }

    /// The most recent estimate.
    pub fn estimate(&self) -> Option<u32> {
        self.estimate
    }

    /// How consistent the recent taps have been, from 0.0 to 1.0. This is
    /// for display only and never affects the estimate.
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// How many intervals the latest estimate ignored.
    pub fn last_outlier_count(&self) -> usize {
        self.last_outlier_count
    }

    /// When the pending commit is due, and the BPM it will commit.
    pub fn pending_commit(&self) -> Option<(u64, u32)> {
        self.pending_commit
    }

    /// Returns the pending BPM if its commit time has arrived, and clears the
    /// tap history.
    pub fn poll_commit(&mut self, now_ns: u64) -> Option<u32> {
        match self.pending_commit {
            Some((due_ns, bpm)) if due_ns <= now_ns => {
                self.reset();
                Some(bpm)
            }
            _ => None,
        }
    }

    /// Forgets everything, including any pending commit.
    pub fn reset(&mut self) {
        self.restart_sequence();
        self.last_tap_ns = None;
        self.confidence = 0.0;
    }

    /// How many intervals are in the history.
    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::{assert_gt, assert_lt};

    const MS: u64 = 1_000_000;

    fn tap_intervals(estimator: &mut TapTempoEstimator, intervals_ms: &[u64]) -> Option<u32> {
        let mut now = 1_000 * MS;
        let mut estimate = estimator.on_tap(now);
        for interval in intervals_ms {
            now += interval * MS;
            estimate = estimator.on_tap(now);
        }
        estimate
    }

    #[test]
    fn first_tap_has_no_estimate() {
        let mut estimator = TapTempoEstimator::default();
        assert_eq!(estimator.on_tap(123), None);
        assert_eq!(estimator.pending_commit(), None);
        assert_eq!(estimator.on_tap(123 + 500 * MS), Some(120));
    }

    #[test]
    fn steady_taps() {
        let mut estimator = TapTempoEstimator::default();
        assert_eq!(tap_intervals(&mut estimator, &[600; 6]), Some(100));
        assert_eq!(estimator.last_outlier_count(), 0);
        assert!(approx_eq!(f32, estimator.confidence(), 1.0, epsilon = 1e-6));
    }

    #[test]
    fn outlier_is_rejected() {
        // Mean 531.25 ms, standard deviation about 82.7 ms, so the 750 ms
        // interval has a z-score above 2.6 and is dropped.
        let mut estimator = TapTempoEstimator::default();
        let estimate = tap_intervals(&mut estimator, &[500, 500, 500, 750, 500, 500, 500, 500]);
        assert_eq!(estimate, Some(120));
        assert_eq!(estimator.last_outlier_count(), 1);
    }

    #[test]
    fn latest_outlier_lowers_confidence() {
        let mut estimator = TapTempoEstimator::default();
        let _ = tap_intervals(&mut estimator, &[500; 5]);
        let before = estimator.confidence();
        assert_gt!(before, 0.0);

        // Roughly 120 BPM still, but this interval is an outlier.
        let last = estimator.last_tap_ns.unwrap();
        assert_eq!(estimator.on_tap(last + 900 * MS), Some(120));
        assert_lt!(estimator.confidence(), before);
    }

    #[test]
    fn history_is_bounded() {
        let mut estimator = TapTempoEstimator::default();
        let _ = tap_intervals(&mut estimator, &[400; 100]);
        assert_eq!(estimator.interval_count(), TapTempoEstimator::HISTORY_CAPACITY);
        assert_eq!(estimator.estimate(), Some(150));
    }

    #[test]
    fn backward_timestamp_restarts() {
        let mut estimator = TapTempoEstimator::default();
        let _ = tap_intervals(&mut estimator, &[500; 3]);
        assert_eq!(estimator.on_tap(0), None);
        assert_eq!(estimator.interval_count(), 0);
        assert_eq!(estimator.pending_commit(), None);
        assert_eq!(estimator.on_tap(1_000 * MS), Some(60));
    }

    #[test]
    fn commit_is_debounced() {
        let mut estimator = TapTempoEstimator::default();
        assert_eq!(estimator.on_tap(0), None);
        assert_eq!(estimator.on_tap(500 * MS), Some(120));

        // Five beats at 120 BPM is 2.5 seconds.
        let (due, bpm) = estimator.pending_commit().unwrap();
        assert_eq!((due, bpm), (3_000 * MS, 120));
        assert_eq!(estimator.poll_commit(due - 1), None);

        // Another tap replaces the pending commit before it's due.
        assert_eq!(estimator.on_tap(1_000 * MS), Some(120));
        assert_eq!(estimator.poll_commit(due), None);
        let (due, _) = estimator.pending_commit().unwrap();
        assert_eq!(due, 3_500 * MS);

        assert_eq!(estimator.poll_commit(due), Some(120));
        assert_eq!(estimator.interval_count(), 0, "commit clears history");
        assert_eq!(estimator.pending_commit(), None);
        assert_eq!(estimator.poll_commit(u64::MAX), None);
        assert_eq!(estimator.on_tap(10_000 * MS), None, "a commit starts a new sequence");
    }

    #[test]
    fn out_of_range_estimates_are_withheld() {
        let mut estimator = TapTempoEstimator::default();
        assert_eq!(estimator.on_tap(0), None);
        assert_eq!(estimator.on_tap(10 * MS), None, "6000 BPM is too fast");
        assert_eq!(estimator.pending_commit(), None);
    }
}
