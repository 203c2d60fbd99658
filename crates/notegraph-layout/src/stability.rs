//! Stability detection over a sliding window of energy samples.

use std::collections::VecDeque;

/// Tracks a scalar layout "energy" (aggregate of squared positions) over a
/// sliding window of periodic samples. The layout is stable once the
/// relative variance of recent samples stays below a threshold for a
/// required number of consecutive checks.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    window: VecDeque<f32>,
    window_size: usize,
    /// Variance normalized by mean², so the check is scale-free.
    threshold: f32,
    required_checks: u32,
    consecutive: u32,
    stable: bool,
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::new(8, 1e-4, 3)
    }
}

impl StabilityTracker {
    pub fn new(window_size: usize, threshold: f32, required_checks: u32) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size: window_size.max(2),
            threshold,
            required_checks: required_checks.max(1),
            consecutive: 0,
            stable: false,
        }
    }

    /// Record one energy sample; returns true once stability is reached.
    pub fn record(&mut self, energy: f32) -> bool {
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(energy);

        if self.window.len() < self.window_size {
            return self.stable;
        }

        let mean = self.window.iter().sum::<f32>() / self.window.len() as f32;
        let variance = self
            .window
            .iter()
            .map(|e| (e - mean) * (e - mean))
            .sum::<f32>()
            / self.window.len() as f32;
        let relative = variance / (mean * mean).max(f32::EPSILON);

        if relative < self.threshold {
            self.consecutive += 1;
            if self.consecutive >= self.required_checks {
                self.stable = true;
            }
        } else {
            self.consecutive = 0;
        }

        self.stable
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }

    /// Forget everything; used on restart and graph changes.
    pub fn reset(&mut self) {
        self.window.clear();
        self.consecutive = 0;
        self.stable = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_energy_becomes_stable() {
        let mut tracker = StabilityTracker::new(4, 1e-4, 2);
        let mut stable = false;
        for _ in 0..10 {
            stable = tracker.record(500.0);
        }
        assert!(stable);
    }

    #[test]
    fn oscillating_energy_stays_unstable() {
        let mut tracker = StabilityTracker::new(4, 1e-4, 2);
        for i in 0..20 {
            let energy = if i % 2 == 0 { 100.0 } else { 900.0 };
            assert!(!tracker.record(energy));
        }
    }

    #[test]
    fn reset_clears_progress() {
        let mut tracker = StabilityTracker::new(4, 1e-4, 1);
        for _ in 0..6 {
            tracker.record(100.0);
        }
        assert!(tracker.is_stable());
        tracker.reset();
        assert!(!tracker.is_stable());
    }
}
