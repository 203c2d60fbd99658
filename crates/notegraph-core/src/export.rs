//! Graph export/import round-trip.
//!
//! Import rebuilds the arena through an explicit batched loop so that very
//! large graphs (10k+ nodes) never grow the stack per element.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::graph::{GraphData, GraphEdge, GraphNode};

/// Nodes processed per batch during import.
const IMPORT_BATCH: usize = 512;

/// Serializable snapshot of a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub version: u32,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Counters produced while importing a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub nodes_imported: usize,
    pub edges_imported: usize,
    pub rejected: usize,
}

impl GraphExport {
    /// Snapshot the graph. Elements are sorted by id so exports are
    /// deterministic regardless of map iteration order.
    pub fn from_graph(graph: &GraphData) -> Self {
        let mut nodes: Vec<GraphNode> = graph.nodes().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let mut edges: Vec<GraphEdge> = graph.edges().cloned().collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            version: 1,
            nodes,
            edges,
        }
    }

    /// Rebuild a graph from this snapshot.
    ///
    /// Nodes land first (in fixed-size batches), then edges; an element the
    /// arena rejects is counted and skipped rather than failing the import.
    pub fn into_graph(self) -> (GraphData, ImportStats) {
        let mut graph = GraphData::new();
        let mut stats = ImportStats::default();

        let mut queue = self.nodes;
        while !queue.is_empty() {
            let take = queue.len().min(IMPORT_BATCH);
            for node in queue.drain(..take) {
                match graph.insert_node(node) {
                    Ok(()) => stats.nodes_imported += 1,
                    Err(err) => {
                        stats.rejected += 1;
                        warn!(%err, "skipping node during import");
                    }
                }
            }
        }

        let mut queue = self.edges;
        while !queue.is_empty() {
            let take = queue.len().min(IMPORT_BATCH);
            for edge in queue.drain(..take) {
                match graph.insert_edge(edge) {
                    Ok(()) => stats.edges_imported += 1,
                    Err(err) => {
                        stats.rejected += 1;
                        warn!(%err, "skipping edge during import");
                    }
                }
            }
        }

        (graph, stats)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
