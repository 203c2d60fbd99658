//! Level-of-detail selection.

use serde::{Deserialize, Serialize};

/// Render detail tier. Ordered so `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DetailLevel {
    Low,
    Medium,
    High,
}

impl DetailLevel {
    /// Whether node labels are drawn at this tier.
    pub fn show_labels(self) -> bool {
        self == DetailLevel::High
    }

    pub fn edge_width(self) -> f32 {
        match self {
            DetailLevel::High => 1.0,
            DetailLevel::Medium => 0.7,
            DetailLevel::Low => 0.4,
        }
    }

    /// Edges shorter than this on screen are dropped entirely.
    pub fn min_edge_screen_px(self) -> f32 {
        match self {
            DetailLevel::High => 0.0,
            DetailLevel::Medium => 2.0,
            DetailLevel::Low => 4.0,
        }
    }

    fn downgraded(self) -> DetailLevel {
        match self {
            DetailLevel::High => DetailLevel::Medium,
            DetailLevel::Medium | DetailLevel::Low => DetailLevel::Low,
        }
    }
}

/// Zoom and population cutoffs for tier selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LodThresholds {
    /// Zoom at or above which at least `Medium` is used.
    pub medium_zoom: f32,
    /// Zoom at or above which `High` is used.
    pub high_zoom: f32,
    /// Visible-node count above which the tier drops one step.
    pub many_nodes: usize,
    /// Visible-node count above which the tier drops two steps.
    pub very_many_nodes: usize,
}

impl Default for LodThresholds {
    fn default() -> Self {
        Self {
            medium_zoom: 0.35,
            high_zoom: 0.8,
            many_nodes: 800,
            very_many_nodes: 3000,
        }
    }
}

impl LodThresholds {
    /// Pick a tier for the current zoom and visible population.
    ///
    /// For a fixed count the result never decreases as zoom increases.
    pub fn select(&self, zoom: f32, visible_nodes: usize) -> DetailLevel {
        let mut level = if zoom >= self.high_zoom {
            DetailLevel::High
        } else if zoom >= self.medium_zoom {
            DetailLevel::Medium
        } else {
            DetailLevel::Low
        };

        if visible_nodes > self.very_many_nodes {
            level = level.downgraded().downgraded();
        } else if visible_nodes > self.many_nodes {
            level = level.downgraded();
        }

        level
    }

    /// Scale the zoom cutoffs; factors above 1.0 demand more zoom for the
    /// same detail (used by adaptive quality).
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            medium_zoom: self.medium_zoom * factor,
            high_zoom: self.high_zoom * factor,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_in_zoom() {
        let thresholds = LodThresholds::default();
        let mut previous = DetailLevel::Low;
        for step in 0..100 {
            let zoom = step as f32 * 0.02;
            let level = thresholds.select(zoom, 100);
            assert!(level >= previous, "detail dropped at zoom {zoom}");
            previous = level;
        }
    }

    #[test]
    fn crowded_view_downgrades() {
        let thresholds = LodThresholds::default();
        assert_eq!(thresholds.select(1.0, 100), DetailLevel::High);
        assert_eq!(thresholds.select(1.0, 1000), DetailLevel::Medium);
        assert_eq!(thresholds.select(1.0, 5000), DetailLevel::Low);
    }

    #[test]
    fn scaling_demands_more_zoom() {
        let tightened = LodThresholds::default().scaled(2.0);
        assert_eq!(tightened.select(1.0, 100), DetailLevel::Medium);
    }
}
