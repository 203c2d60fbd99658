//! Progressive rendering for large visible sets.
//!
//! When too many nodes are on screen to draw in one frame, nodes are
//! ranked by visual importance and handed out in fixed-size chunks; the
//! caller draws one chunk per frame until the queue drains.

use notegraph_core::{GraphData, Vec2};

/// Tuning for chunked emission.
#[derive(Debug, Clone, Copy)]
pub struct ProgressiveConfig {
    /// Visible-node count above which chunking kicks in.
    pub activation_threshold: usize,
    /// Nodes per emitted chunk.
    pub chunk_size: usize,
    /// Weight of node degree in the priority score.
    pub degree_weight: f32,
    /// Flat bonus for highlighted nodes.
    pub highlight_bonus: f32,
}

impl Default for ProgressiveConfig {
    fn default() -> Self {
        Self {
            activation_threshold: 1500,
            chunk_size: 400,
            degree_weight: 0.5,
            highlight_bonus: 50.0,
        }
    }
}

/// Orders visible nodes by priority and deals them out chunk by chunk.
#[derive(Debug, Default)]
pub struct ProgressiveRenderer {
    config: ProgressiveConfig,
    queue: Vec<String>,
    cursor: usize,
}

impl ProgressiveRenderer {
    pub fn new(config: ProgressiveConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.config.chunk_size = chunk_size.max(1);
    }

    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    /// Whether the visible set is large enough to need chunking.
    pub fn should_chunk(&self, visible_count: usize) -> bool {
        visible_count > self.config.activation_threshold
    }

    /// Rank `visible` node ids and reset the chunk cursor.
    ///
    /// Priority: node size, plus weighted degree, plus a highlight bonus,
    /// plus closeness to the viewport center so the area under the user's
    /// attention fills in first.
    pub fn rebuild_queue<F>(
        &mut self,
        graph: &GraphData,
        visible: &[String],
        viewport_center: Vec2,
        is_highlighted: F,
    ) where
        F: Fn(&str) -> bool,
    {
        let mut scored: Vec<(f32, &String)> = visible
            .iter()
            .filter_map(|id| {
                let node = graph.node(id)?;
                let mut score = node.size + self.config.degree_weight * graph.degree(id) as f32;
                if is_highlighted(id) {
                    score += self.config.highlight_bonus;
                }
                score += 100.0 / (1.0 + node.position.distance(viewport_center));
                Some((score, id))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        self.queue = scored.into_iter().map(|(_, id)| id.clone()).collect();
        self.cursor = 0;
    }

    /// Ids drawn so far plus the next chunk. Returns the full prefix, so a
    /// frame always renders everything admitted up to now.
    pub fn next_chunk(&mut self) -> &[String] {
        self.cursor = (self.cursor + self.config.chunk_size).min(self.queue.len());
        &self.queue[..self.cursor]
    }

    pub fn is_drained(&self) -> bool {
        self.cursor >= self.queue.len()
    }

    pub fn reset(&mut self) {
        self.queue.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notegraph_core::{EdgeKind, GraphEdge, GraphNode, NodeKind};

    fn star_graph(n: usize) -> (GraphData, Vec<String>) {
        let mut graph = GraphData::default();
        graph
            .insert_node(GraphNode::new("hub", "hub", NodeKind::File))
            .unwrap();
        for i in 0..n {
            let id = format!("leaf{i}");
            graph
                .insert_node(GraphNode::new(&id, &id, NodeKind::File))
                .unwrap();
            graph
                .insert_edge(GraphEdge::new("hub", &id, EdgeKind::Wiki))
                .unwrap();
        }
        let ids = graph.nodes().map(|n| n.id.clone()).collect();
        (graph, ids)
    }

    #[test]
    fn high_degree_node_ranks_first() {
        let (graph, ids) = star_graph(10);
        let mut renderer = ProgressiveRenderer::new(ProgressiveConfig::default());
        renderer.rebuild_queue(&graph, &ids, Vec2::ZERO, |_| false);

        let first = renderer.next_chunk().first().cloned();
        assert_eq!(first.as_deref(), Some("hub"));
    }

    #[test]
    fn highlight_bonus_outranks_degree() {
        let (graph, ids) = star_graph(10);
        let mut renderer = ProgressiveRenderer::new(ProgressiveConfig::default());
        renderer.rebuild_queue(&graph, &ids, Vec2::ZERO, |id| id == "leaf3");

        let first = renderer.next_chunk().first().cloned();
        assert_eq!(first.as_deref(), Some("leaf3"));
    }

    #[test]
    fn chunks_grow_until_drained() {
        let (graph, ids) = star_graph(9);
        let mut renderer = ProgressiveRenderer::new(ProgressiveConfig {
            chunk_size: 4,
            ..ProgressiveConfig::default()
        });
        renderer.rebuild_queue(&graph, &ids, Vec2::ZERO, |_| false);

        assert_eq!(renderer.next_chunk().len(), 4);
        assert!(!renderer.is_drained());
        assert_eq!(renderer.next_chunk().len(), 8);
        assert_eq!(renderer.next_chunk().len(), 10);
        assert!(renderer.is_drained());
    }
}
