//! Adaptive performance control.
//!
//! Frame times feed a rolling FPS estimate; on a fixed interval the
//! controller steps a quality level up or down and hands the engine a set
//! of knobs (LOD scale, cull margin, physics budget, chunk size) to apply.
//! A severe FPS drop bypasses the interval and jumps straight to the most
//! aggressive level.

use std::collections::VecDeque;

use tracing::{info, warn};

/// Tuning for the adaptive loop.
#[derive(Debug, Clone, Copy)]
pub struct PerfConfig {
    /// FPS the adaptive loop tries to hold.
    pub target_fps: f32,
    /// FPS below which emergency mode engages immediately.
    pub low_fps: f32,
    /// Milliseconds between adaptive evaluations.
    pub adapt_interval_ms: u64,
    /// Frame samples kept in the rolling window.
    pub history: usize,
    /// Node count above which layout runs on the worker thread.
    pub offload_threshold: usize,
    /// Milliseconds between cache sweeps.
    pub sweep_interval_ms: u64,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            target_fps: 45.0,
            low_fps: 18.0,
            adapt_interval_ms: 2000,
            history: 120,
            offload_threshold: 2000,
            sweep_interval_ms: 10_000,
        }
    }
}

/// Coarse quality tier, surfaced through `PerformanceModeChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceMode {
    Quality,
    Degraded,
    Emergency,
}

impl PerformanceMode {
    pub fn label(self) -> &'static str {
        match self {
            PerformanceMode::Quality => "quality",
            PerformanceMode::Degraded => "degraded",
            PerformanceMode::Emergency => "emergency",
        }
    }
}

/// The concrete settings one quality level maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityKnobs {
    /// Factor applied to LOD zoom cutoffs (higher = less detail).
    pub lod_scale: f32,
    /// Culling margin fraction.
    pub cull_margin: f32,
    /// Physics iterations per frame.
    pub physics_budget: u32,
    /// Progressive chunk size.
    pub chunk_size: usize,
}

const MAX_LEVEL: u8 = 3;

impl QualityKnobs {
    /// Level 0 is full quality; each step trades fidelity for frame time.
    pub fn for_level(level: u8) -> Self {
        match level.min(MAX_LEVEL) {
            0 => Self {
                lod_scale: 1.0,
                cull_margin: 0.2,
                physics_budget: 4,
                chunk_size: 400,
            },
            1 => Self {
                lod_scale: 1.4,
                cull_margin: 0.12,
                physics_budget: 3,
                chunk_size: 300,
            },
            2 => Self {
                lod_scale: 1.9,
                cull_margin: 0.06,
                physics_budget: 2,
                chunk_size: 200,
            },
            _ => Self {
                lod_scale: 2.8,
                cull_margin: 0.0,
                physics_budget: 1,
                chunk_size: 100,
            },
        }
    }
}

/// Result of an adaptive evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityChange {
    pub knobs: QualityKnobs,
    /// Present when the coarse mode changed, for event emission.
    pub mode_changed: Option<PerformanceMode>,
}

/// Rolling FPS telemetry plus the adaptive quality state machine.
#[derive(Debug)]
pub struct PerformanceController {
    config: PerfConfig,
    frame_deltas_ms: VecDeque<f32>,
    last_frame_ms: Option<u64>,
    last_adapt_ms: u64,
    last_sweep_ms: u64,
    level: u8,
}

impl Default for PerformanceController {
    fn default() -> Self {
        Self::new(PerfConfig::default())
    }
}

impl PerformanceController {
    pub fn new(config: PerfConfig) -> Self {
        Self {
            config,
            frame_deltas_ms: VecDeque::with_capacity(config.history),
            last_frame_ms: None,
            last_adapt_ms: 0,
            last_sweep_ms: 0,
            level: 0,
        }
    }

    pub fn config(&self) -> PerfConfig {
        self.config
    }

    pub fn mode(&self) -> PerformanceMode {
        match self.level {
            0 => PerformanceMode::Quality,
            MAX_LEVEL.. => PerformanceMode::Emergency,
            _ => PerformanceMode::Degraded,
        }
    }

    pub fn knobs(&self) -> QualityKnobs {
        QualityKnobs::for_level(self.level)
    }

    /// Record a frame boundary.
    pub fn record_frame(&mut self, now_ms: u64) {
        if let Some(last) = self.last_frame_ms {
            let delta = now_ms.saturating_sub(last) as f32;
            if delta > 0.0 {
                if self.frame_deltas_ms.len() == self.config.history {
                    self.frame_deltas_ms.pop_front();
                }
                self.frame_deltas_ms.push_back(delta);
            }
        }
        self.last_frame_ms = Some(now_ms);
    }

    /// Rolling average FPS, or `None` without enough samples.
    pub fn fps(&self) -> Option<f32> {
        if self.frame_deltas_ms.len() < 10 {
            return None;
        }
        let mean =
            self.frame_deltas_ms.iter().sum::<f32>() / self.frame_deltas_ms.len() as f32;
        Some(1000.0 / mean.max(f32::EPSILON))
    }

    /// Step the quality level if warranted. Emergency engages immediately;
    /// ordinary adjustments wait out the adapt interval.
    pub fn maybe_adapt(&mut self, now_ms: u64) -> Option<QualityChange> {
        let fps = self.fps()?;
        let previous_mode = self.mode();

        if fps < self.config.low_fps && self.level < MAX_LEVEL {
            warn!(fps, "fps critically low, engaging emergency quality");
            self.level = MAX_LEVEL;
            self.last_adapt_ms = now_ms;
            return Some(self.change_from(previous_mode));
        }

        if now_ms.saturating_sub(self.last_adapt_ms) < self.config.adapt_interval_ms {
            return None;
        }

        let new_level = if fps < self.config.target_fps && self.level < MAX_LEVEL {
            self.level + 1
        } else if fps > self.config.target_fps * 1.25 && self.level > 0 {
            self.level - 1
        } else {
            return None;
        };

        info!(fps, from = self.level, to = new_level, "adjusting render quality");
        self.level = new_level;
        self.last_adapt_ms = now_ms;
        Some(self.change_from(previous_mode))
    }

    fn change_from(&self, previous_mode: PerformanceMode) -> QualityChange {
        let mode = self.mode();
        QualityChange {
            knobs: self.knobs(),
            mode_changed: (mode != previous_mode).then_some(mode),
        }
    }

    pub fn should_offload(&self, node_count: usize) -> bool {
        node_count > self.config.offload_threshold
    }

    /// True when the periodic cache sweep is due; arms the next one.
    pub fn should_sweep(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_sweep_ms) >= self.config.sweep_interval_ms {
            self.last_sweep_ms = now_ms;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.frame_deltas_ms.clear();
        self.last_frame_ms = None;
        self.level = 0;
    }
}

/// Reusable `Vec` buffers for per-frame temporaries.
///
/// Frames allocate and discard id lists constantly; recycling the backing
/// storage keeps steady-state allocation flat.
#[derive(Debug)]
pub struct VecPool<T> {
    free: Vec<Vec<T>>,
    max_pooled: usize,
}

impl<T> Default for VecPool<T> {
    fn default() -> Self {
        Self {
            free: Vec::new(),
            max_pooled: 16,
        }
    }
}

impl<T> VecPool<T> {
    pub fn acquire(&mut self) -> Vec<T> {
        self.free.pop().unwrap_or_default()
    }

    /// Return a buffer; contents are cleared, capacity kept.
    pub fn release(&mut self, mut buffer: Vec<T>) {
        if self.free.len() < self.max_pooled {
            buffer.clear();
            self.free.push(buffer);
        }
    }

    pub fn pooled(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_frames(controller: &mut PerformanceController, start_ms: u64, count: u64, delta: u64) -> u64 {
        let mut now = start_ms;
        for _ in 0..count {
            controller.record_frame(now);
            now += delta;
        }
        now
    }

    #[test]
    fn slow_frames_degrade_quality() {
        let mut perf = PerformanceController::new(PerfConfig::default());
        // ~30 fps against a 45 fps target, past the adapt interval.
        let now = feed_frames(&mut perf, 0, 70, 33);

        let change = perf.maybe_adapt(now).expect("should adapt");
        assert_eq!(change.mode_changed, Some(PerformanceMode::Degraded));
        assert!(change.knobs.lod_scale > 1.0);
        assert!(change.knobs.chunk_size < QualityKnobs::for_level(0).chunk_size);
    }

    #[test]
    fn fast_frames_recover_quality() {
        let mut perf = PerformanceController::new(PerfConfig::default());
        let now = feed_frames(&mut perf, 0, 70, 33);
        perf.maybe_adapt(now).expect("degrade first");

        // Now consistently fast frames; after the interval quality returns.
        let now = feed_frames(&mut perf, now, 250, 10);
        let change = perf.maybe_adapt(now).expect("should recover");
        assert_eq!(change.mode_changed, Some(PerformanceMode::Quality));
        assert_eq!(change.knobs, QualityKnobs::for_level(0));
    }

    #[test]
    fn critical_fps_bypasses_interval() {
        let mut perf = PerformanceController::new(PerfConfig::default());
        // 10 fps, far below low_fps; only 300ms of history, well under the
        // 2s adapt interval.
        let now = feed_frames(&mut perf, 0, 12, 100);

        let change = perf.maybe_adapt(now).expect("emergency");
        assert_eq!(change.mode_changed, Some(PerformanceMode::Emergency));
        assert_eq!(change.knobs, QualityKnobs::for_level(MAX_LEVEL));
    }

    #[test]
    fn steady_fps_changes_nothing() {
        let mut perf = PerformanceController::new(PerfConfig::default());
        // 50 fps: above target, below the 1.25x recovery band, level 0.
        let now = feed_frames(&mut perf, 0, 120, 20);
        assert_eq!(perf.maybe_adapt(now), None);
    }

    #[test]
    fn sweep_cadence() {
        let mut perf = PerformanceController::new(PerfConfig::default());
        assert!(perf.should_sweep(10_000));
        assert!(!perf.should_sweep(15_000));
        assert!(perf.should_sweep(20_000));
    }

    #[test]
    fn vec_pool_recycles_capacity() {
        let mut pool: VecPool<u32> = VecPool::default();
        let mut buffer = pool.acquire();
        buffer.extend(0..100);
        let capacity = buffer.capacity();
        pool.release(buffer);

        let reused = pool.acquire();
        assert!(reused.is_empty());
        assert_eq!(reused.capacity(), capacity);
        assert_eq!(pool.pooled(), 0);
    }
}
