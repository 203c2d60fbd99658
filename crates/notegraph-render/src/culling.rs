//! Throttled viewport culling.

use std::collections::HashSet;

use notegraph_core::{GraphData, Vec2, ViewportState};
use tracing::debug;

/// How culling behaves between recomputes.
#[derive(Debug, Clone, Copy)]
pub struct CullingConfig {
    /// Minimum milliseconds between recomputes.
    pub interval_ms: u64,
    /// Fraction of the viewport half-extent added as margin, so nodes just
    /// off-screen are kept and panning does not pop them in late.
    pub margin: f32,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 120,
            margin: 0.2,
        }
    }
}

/// Computes which nodes and edges fall inside the (expanded) viewport.
///
/// Recomputation is throttled by wall-clock interval rather than camera
/// deltas; callers that know the world changed call [`invalidate`].
///
/// [`invalidate`]: ViewportCuller::invalidate
#[derive(Debug, Default)]
pub struct ViewportCuller {
    config: CullingConfig,
    last_run_ms: Option<u64>,
    visible_nodes: HashSet<String>,
    visible_edges: HashSet<String>,
}

impl ViewportCuller {
    pub fn new(config: CullingConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> CullingConfig {
        self.config
    }

    /// Replace the margin fraction (adaptive quality shrinks it under load).
    pub fn set_margin(&mut self, margin: f32) {
        self.config.margin = margin.clamp(0.0, 1.0);
    }

    pub fn set_interval_ms(&mut self, interval_ms: u64) {
        self.config.interval_ms = interval_ms;
    }

    /// Force the next `update` call to recompute regardless of throttle.
    pub fn invalidate(&mut self) {
        self.last_run_ms = None;
    }

    /// Recompute visibility if the throttle interval has elapsed. Returns
    /// true when a recompute happened.
    pub fn update(&mut self, now_ms: u64, viewport: &ViewportState, graph: &GraphData) -> bool {
        if let Some(last) = self.last_run_ms {
            if now_ms.saturating_sub(last) < self.config.interval_ms {
                return false;
            }
        }
        self.last_run_ms = Some(now_ms);

        let half = viewport.half_extent() * (1.0 + self.config.margin);
        let center = viewport.center();
        let min = center - half;
        let max = center + half;

        self.visible_nodes.clear();
        for node in graph.nodes() {
            if box_intersects(node.position, node.size, min, max) {
                self.visible_nodes.insert(node.id.clone());
            }
        }

        // An edge is drawn when either endpoint is on screen; a fully
        // off-screen edge crossing the viewport is rare enough to ignore.
        self.visible_edges.clear();
        for edge in graph.edges() {
            if self.visible_nodes.contains(&edge.source)
                || self.visible_nodes.contains(&edge.target)
            {
                self.visible_edges.insert(edge.id.clone());
            }
        }

        debug!(
            nodes = self.visible_nodes.len(),
            edges = self.visible_edges.len(),
            "viewport culling recomputed"
        );
        true
    }

    pub fn is_node_visible(&self, id: &str) -> bool {
        self.visible_nodes.contains(id)
    }

    pub fn is_edge_visible(&self, id: &str) -> bool {
        self.visible_edges.contains(id)
    }

    pub fn visible_nodes(&self) -> &HashSet<String> {
        &self.visible_nodes
    }

    pub fn visible_edges(&self) -> &HashSet<String> {
        &self.visible_edges
    }
}

fn box_intersects(position: Vec2, size: f32, min: Vec2, max: Vec2) -> bool {
    position.x + size >= min.x
        && position.x - size <= max.x
        && position.y + size >= min.y
        && position.y - size <= max.y
}
