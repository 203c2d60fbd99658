//! Node, edge, and graph arena types.

use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Vec2;

/// Enumerates the kinds of nodes that can populate the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A document in the workspace.
    #[default]
    File,
    /// A directory that contains documents.
    Folder,
    /// Placeholder for an unresolved link target.
    Phantom,
    /// An inline tag shared between documents.
    Tag,
    /// An external link surfaced as its own node.
    Link,
}

impl NodeKind {
    /// Get a display label for the kind.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Folder => "folder",
            NodeKind::Phantom => "phantom",
            NodeKind::Tag => "tag",
            NodeKind::Link => "link",
        }
    }
}

/// Link syntax the edge was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Bracket-style `[[target]]` link.
    Wiki,
    /// Inline `[text](target)` link.
    Markdown,
    /// Reference-style `[text][ref]` link, and tag/folder relations.
    Reference,
}

/// Word/line statistics recorded while a document is processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentStats {
    pub bytes: usize,
    pub words: usize,
    pub lines: usize,
}

/// Metadata attached to a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Number of outgoing links originating from this node.
    pub link_count: usize,
    /// Ids of nodes that link to this one.
    pub backlink_ids: Vec<String>,
    /// True when this node stands in for an unresolved target.
    pub is_phantom: bool,
    /// Present for file nodes whose content was read.
    pub content_stats: Option<ContentStats>,
}

/// Captures a single element of the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique, stable identifier.
    pub id: String,
    /// Human readable name.
    pub label: String,
    /// Category associated with the node.
    pub kind: NodeKind,
    /// Current layout position.
    pub position: Vec2,
    /// True once `position` was assigned by the layout or a caller; unset
    /// nodes get seeded positions instead.
    #[serde(default)]
    pub placed: bool,
    /// Render size (radius basis).
    pub size: f32,
    /// Optional style override as a hex string.
    pub color: Option<String>,
    /// Derived metadata.
    pub metadata: NodeMetadata,
}

impl GraphNode {
    /// Create a node with defaults for everything but identity.
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            position: Vec2::ZERO,
            placed: false,
            size: 4.0,
            color: None,
            metadata: NodeMetadata {
                is_phantom: kind == NodeKind::Phantom,
                ..NodeMetadata::default()
            },
        }
    }
}

/// Metadata attached to an edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeMetadata {
    /// Display alias from `[[target|alias]]`.
    pub alias: Option<String>,
    /// Byte offset of the link in the source document.
    pub position: Option<usize>,
}

/// Represents a connection between two graph nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Unique identifier for this edge.
    pub id: String,
    /// Originating node id.
    pub source: String,
    /// Destination node id.
    pub target: String,
    /// Link syntax this edge came from.
    pub kind: EdgeKind,
    /// Attraction weight used by the layout.
    pub weight: f32,
    /// Link metadata.
    pub metadata: EdgeMetadata,
}

impl GraphEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            source,
            target,
            kind,
            weight: 1.0,
            metadata: EdgeMetadata::default(),
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.metadata.alias = alias;
        self
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.metadata.position = Some(position);
        self
    }
}

/// Errors raised by graph mutation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("node `{0}` already exists")]
    DuplicateNode(String),

    #[error("edge `{edge}` references missing node `{node}`")]
    MissingEndpoint { edge: String, node: String },

    #[error("edge `{0}` is a self-loop")]
    SelfLoop(String),

    #[error("an edge between `{0}` and `{1}` already exists")]
    DuplicateEdge(String, String),
}

/// The node set plus edge set, with validated insertion.
///
/// Edges are undirected and non-multi for dedup purposes: at most one edge
/// may exist between any unordered pair of nodes.
#[derive(Debug, Default, Clone)]
pub struct GraphData {
    nodes: HashMap<String, GraphNode>,
    edges: HashMap<String, GraphEdge>,
    /// Normalized (min, max) endpoint pairs for duplicate rejection.
    pairs: HashSet<(String, String)>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl GraphData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id)
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values()
    }

    /// Insert a node; rejects duplicate ids.
    pub fn insert_node(&mut self, node: GraphNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Insert or replace a node, preserving an existing position so a
    /// re-processed file does not jump across the canvas.
    pub fn upsert_node(&mut self, mut node: GraphNode) {
        if let Some(existing) = self.nodes.get(&node.id) {
            node.position = existing.position;
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Insert an edge after validating both endpoints exist, the edge is not
    /// a self-loop, and no edge already joins the pair. On success, backlink
    /// and link-count metadata on the endpoints is updated.
    pub fn insert_edge(&mut self, edge: GraphEdge) -> Result<(), GraphError> {
        if edge.source == edge.target {
            return Err(GraphError::SelfLoop(edge.id));
        }
        if !self.nodes.contains_key(&edge.source) {
            return Err(GraphError::MissingEndpoint {
                edge: edge.id,
                node: edge.source,
            });
        }
        if !self.nodes.contains_key(&edge.target) {
            return Err(GraphError::MissingEndpoint {
                edge: edge.id,
                node: edge.target,
            });
        }
        let key = pair_key(&edge.source, &edge.target);
        if self.pairs.contains(&key) {
            return Err(GraphError::DuplicateEdge(key.0, key.1));
        }

        if let Some(source) = self.nodes.get_mut(&edge.source) {
            source.metadata.link_count += 1;
        }
        if let Some(target) = self.nodes.get_mut(&edge.target) {
            target.metadata.backlink_ids.push(edge.source.clone());
        }

        self.pairs.insert(key);
        self.edges.insert(edge.id.clone(), edge);
        Ok(())
    }

    /// Remove a node and every edge touching it. Returns the removed node
    /// and the ids of removed edges.
    pub fn remove_node(&mut self, id: &str) -> Option<(GraphNode, Vec<String>)> {
        let node = self.nodes.remove(id)?;

        let touching: Vec<String> = self
            .edges
            .values()
            .filter(|e| e.source == id || e.target == id)
            .map(|e| e.id.clone())
            .collect();
        for edge_id in &touching {
            self.remove_edge(edge_id);
        }

        // Drop dangling backlink references left on other nodes.
        for other in self.nodes.values_mut() {
            other.metadata.backlink_ids.retain(|b| b != id);
        }

        Some((node, touching))
    }

    /// Remove a single edge, reverting endpoint metadata.
    pub fn remove_edge(&mut self, id: &str) -> Option<GraphEdge> {
        let edge = self.edges.remove(id)?;
        self.pairs.remove(&pair_key(&edge.source, &edge.target));
        if let Some(source) = self.nodes.get_mut(&edge.source) {
            source.metadata.link_count = source.metadata.link_count.saturating_sub(1);
        }
        if let Some(target) = self.nodes.get_mut(&edge.target) {
            if let Some(pos) = target
                .metadata
                .backlink_ids
                .iter()
                .position(|b| b == &edge.source)
            {
                target.metadata.backlink_ids.remove(pos);
            }
        }
        Some(edge)
    }

    /// Ids of nodes directly connected to `id`, in either direction.
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        let mut out = Vec::new();
        for edge in self.edges.values() {
            if edge.source == id {
                out.push(edge.target.as_str());
            } else if edge.target == id {
                out.push(edge.source.as_str());
            }
        }
        out
    }

    /// Total degree (in + out) of a node.
    pub fn degree(&self, id: &str) -> usize {
        self.edges
            .values()
            .filter(|e| e.source == id || e.target == id)
            .count()
    }

    /// Destroy all state.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.pairs.clear();
    }

    /// Convert to a petgraph `StableDiGraph` for analysis queries.
    /// Returns the graph and a mapping from node id to `NodeIndex`.
    pub fn to_petgraph(&self) -> (StableDiGraph<GraphNode, f32>, HashMap<String, NodeIndex>) {
        let mut graph = StableDiGraph::new();
        let mut id_to_index = HashMap::new();

        for node in self.nodes.values() {
            let idx = graph.add_node(node.clone());
            id_to_index.insert(node.id.clone(), idx);
        }

        for edge in self.edges.values() {
            if let (Some(&from), Some(&to)) = (
                id_to_index.get(&edge.source),
                id_to_index.get(&edge.target),
            ) {
                graph.add_edge(from, to, edge.weight);
            }
        }

        (graph, id_to_index)
    }
}
