//! Render preparation for note graphs.
//!
//! Nothing in this crate draws pixels. [`RenderPipeline`] turns graph state
//! plus a camera into a [`RenderFrame`]: culled, detail-tiered, optionally
//! chunked draw specs that any surface (canvas, GPU, SVG) can consume.

mod cache;
mod culling;
mod lod;
mod progressive;
mod visuals;

pub use cache::{CacheConfig, RenderCache};
pub use culling::{CullingConfig, ViewportCuller};
pub use lod::{DetailLevel, LodThresholds};
pub use progressive::{ProgressiveConfig, ProgressiveRenderer};
pub use visuals::{
    resolve_edge_visuals, resolve_node_visuals, EdgeRenderContext, EdgeVisuals, EmphasisState,
    NodeRenderContext, NodeShape, NodeVisuals, Rgba,
};

use std::collections::HashSet;

use notegraph_core::{GraphData, Vec2, ViewportState};

/// Display labels longer than this are truncated with an ellipsis.
const MAX_LABEL_CHARS: usize = 32;

/// Hover/selection emphasis input for a frame.
#[derive(Debug, Clone, Default)]
pub struct HighlightSet {
    pub focus: Option<String>,
    pub neighbors: HashSet<String>,
}

impl HighlightSet {
    pub fn is_active(&self) -> bool {
        self.focus.is_some()
    }

    fn emphasis_for(&self, id: &str) -> EmphasisState {
        match &self.focus {
            None => EmphasisState::Normal,
            Some(focus) if focus == id || self.neighbors.contains(id) => {
                EmphasisState::Highlighted
            }
            Some(_) => EmphasisState::Dimmed,
        }
    }
}

/// Everything a surface needs to draw one node.
#[derive(Debug, Clone)]
pub struct NodeDrawSpec {
    pub id: String,
    pub position: Vec2,
    pub visuals: NodeVisuals,
    /// Present only when the detail tier shows labels.
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EdgeDrawSpec {
    pub id: String,
    pub from: Vec2,
    pub to: Vec2,
    pub visuals: EdgeVisuals,
}

/// One frame's worth of prepared draw data.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    pub nodes: Vec<NodeDrawSpec>,
    pub edges: Vec<EdgeDrawSpec>,
    pub detail: DetailLevel,
    /// False while progressive chunking is still filling the frame in.
    pub complete: bool,
}

/// Stateful frame preparation: throttled culling, LOD selection,
/// progressive chunking, and a TTL'd label cache.
pub struct RenderPipeline {
    lod: LodThresholds,
    culler: ViewportCuller,
    progressive: ProgressiveRenderer,
    labels: RenderCache<String, String>,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new(
            LodThresholds::default(),
            CullingConfig::default(),
            ProgressiveConfig::default(),
            CacheConfig::default(),
        )
    }
}

impl RenderPipeline {
    pub fn new(
        lod: LodThresholds,
        culling: CullingConfig,
        progressive: ProgressiveConfig,
        label_cache: CacheConfig,
    ) -> Self {
        Self {
            lod,
            culler: ViewportCuller::new(culling),
            progressive: ProgressiveRenderer::new(progressive),
            labels: RenderCache::with_config(label_cache),
        }
    }

    pub fn lod(&self) -> &LodThresholds {
        &self.lod
    }

    pub fn set_lod(&mut self, lod: LodThresholds) {
        self.lod = lod;
    }

    pub fn culler_mut(&mut self) -> &mut ViewportCuller {
        &mut self.culler
    }

    pub fn progressive_mut(&mut self) -> &mut ProgressiveRenderer {
        &mut self.progressive
    }

    /// Drop expired cache entries; called periodically, not per frame.
    pub fn sweep_caches(&mut self, now_ms: u64) {
        self.labels.sweep(now_ms);
    }

    /// Forget cached state after graph mutations.
    pub fn invalidate(&mut self) {
        self.culler.invalidate();
        self.progressive.reset();
        self.labels.clear();
    }

    /// Prepare one frame.
    pub fn prepare_frame(
        &mut self,
        graph: &GraphData,
        viewport: &ViewportState,
        now_ms: u64,
        highlight: &HighlightSet,
    ) -> RenderFrame {
        let recomputed = self.culler.update(now_ms, viewport, graph);
        let visible_count = self.culler.visible_nodes().len();
        let detail = self.lod.select(viewport.zoom, visible_count);

        let chunking = self.progressive.should_chunk(visible_count);
        let node_ids: Vec<String> = if chunking {
            if recomputed {
                let visible: Vec<String> =
                    self.culler.visible_nodes().iter().cloned().collect();
                self.progressive.rebuild_queue(graph, &visible, viewport.center(), |id| {
                    highlight.emphasis_for(id) == EmphasisState::Highlighted
                });
            }
            self.progressive.next_chunk().to_vec()
        } else {
            self.culler.visible_nodes().iter().cloned().collect()
        };

        let mut nodes = Vec::with_capacity(node_ids.len());
        for id in &node_ids {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let visuals = resolve_node_visuals(NodeRenderContext {
                kind: node.kind,
                size: node.size,
                zoom: viewport.zoom,
                emphasis: highlight.emphasis_for(id),
                color_override: node.color.as_deref(),
                detail,
            });
            let label = visuals
                .show_label
                .then(|| self.display_label(id, &node.label, now_ms));
            nodes.push(NodeDrawSpec {
                id: id.clone(),
                position: node.position,
                visuals,
                label,
            });
        }

        let drawn: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
        let min_screen = detail.min_edge_screen_px();
        let mut edges = Vec::new();
        for edge in graph.edges() {
            if !self.culler.is_edge_visible(&edge.id) {
                continue;
            }
            // While chunking, only edges between already-admitted nodes draw.
            if chunking
                && !(drawn.contains(edge.source.as_str()) || drawn.contains(edge.target.as_str()))
            {
                continue;
            }
            let (Some(from), Some(to)) = (graph.node(&edge.source), graph.node(&edge.target))
            else {
                continue;
            };
            if from.position.distance(to.position) * viewport.zoom < min_screen {
                continue;
            }

            let emphasis = match &highlight.focus {
                Some(focus) if *focus == edge.source || *focus == edge.target => {
                    EmphasisState::Highlighted
                }
                Some(_) => EmphasisState::Dimmed,
                None => EmphasisState::Normal,
            };
            edges.push(EdgeDrawSpec {
                id: edge.id.clone(),
                from: from.position,
                to: to.position,
                visuals: resolve_edge_visuals(EdgeRenderContext { emphasis, detail }),
            });
        }

        RenderFrame {
            nodes,
            edges,
            detail,
            complete: !chunking || self.progressive.is_drained(),
        }
    }

    fn display_label(&mut self, id: &str, label: &str, now_ms: u64) -> String {
        if let Some(cached) = self.labels.get(&id.to_owned(), now_ms) {
            return cached.clone();
        }
        let truncated = if label.chars().count() > MAX_LABEL_CHARS {
            let mut short: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
            short.push('…');
            short
        } else {
            label.to_owned()
        };
        self.labels.insert(id.to_owned(), truncated.clone(), now_ms);
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notegraph_core::{EdgeKind, GraphEdge, GraphNode, NodeKind};

    fn small_graph() -> GraphData {
        let mut graph = GraphData::default();
        for (id, x) in [("a", 0.0), ("b", 40.0), ("far", 5000.0)] {
            let mut node = GraphNode::new(id, id, NodeKind::File);
            node.position = Vec2::new(x, 0.0);
            graph.insert_node(node).unwrap();
        }
        graph
            .insert_edge(GraphEdge::new("a", "b", EdgeKind::Wiki))
            .unwrap();
        graph
    }

    fn viewport(zoom: f32) -> ViewportState {
        ViewportState {
            zoom,
            ..ViewportState::default()
        }
    }

    #[test]
    fn frame_excludes_culled_nodes() {
        let graph = small_graph();
        let mut pipeline = RenderPipeline::default();
        let frame =
            pipeline.prepare_frame(&graph, &viewport(1.0), 0, &HighlightSet::default());

        assert_eq!(frame.nodes.len(), 2);
        assert!(frame.nodes.iter().all(|n| n.id != "far"));
        assert_eq!(frame.edges.len(), 1);
        assert!(frame.complete);
    }

    #[test]
    fn labels_appear_only_at_high_detail() {
        let graph = small_graph();
        let mut pipeline = RenderPipeline::default();

        let high = pipeline.prepare_frame(&graph, &viewport(1.0), 0, &HighlightSet::default());
        assert!(high.nodes.iter().all(|n| n.label.is_some()));

        pipeline.invalidate();
        let low = pipeline.prepare_frame(&graph, &viewport(0.1), 0, &HighlightSet::default());
        assert_eq!(low.detail, DetailLevel::Low);
        assert!(low.nodes.iter().all(|n| n.label.is_none()));
    }

    #[test]
    fn hover_highlights_focus_and_neighbors() {
        let graph = small_graph();
        let mut pipeline = RenderPipeline::default();
        let highlight = HighlightSet {
            focus: Some("a".into()),
            neighbors: ["b".to_owned()].into(),
        };
        let frame = pipeline.prepare_frame(&graph, &viewport(1.0), 0, &highlight);

        for node in &frame.nodes {
            assert_eq!(node.visuals.opacity, 1.0, "{} should be highlighted", node.id);
        }
        assert!(frame.edges[0].visuals.width > DetailLevel::High.edge_width());
    }

    #[test]
    fn label_cache_honors_configured_ttl() {
        let graph = small_graph();
        let mut pipeline = RenderPipeline::new(
            LodThresholds::default(),
            CullingConfig::default(),
            ProgressiveConfig::default(),
            CacheConfig {
                ttl_ms: 100,
                max_entries: 8,
            },
        );

        pipeline.prepare_frame(&graph, &viewport(1.0), 0, &HighlightSet::default());
        assert!(!pipeline.labels.is_empty());

        pipeline.sweep_caches(200);
        assert!(pipeline.labels.is_empty());
    }

    #[test]
    fn long_labels_truncate() {
        let mut graph = GraphData::default();
        let long = "x".repeat(100);
        graph
            .insert_node(GraphNode::new("n", &long, NodeKind::File))
            .unwrap();

        let mut pipeline = RenderPipeline::default();
        let frame =
            pipeline.prepare_frame(&graph, &viewport(1.0), 0, &HighlightSet::default());
        let label = frame.nodes[0].label.as_ref().unwrap();
        assert_eq!(label.chars().count(), MAX_LABEL_CHARS);
        assert!(label.ends_with('…'));
    }
}
