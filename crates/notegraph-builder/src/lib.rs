//! Workspace-to-graph construction.
//!
//! `GraphBuilder` flattens a hierarchical file tree, processes files in
//! fixed-size batches (yielding between batches to stay responsive), and
//! resolves links into edges. Unresolved targets degrade to phantom nodes;
//! per-file failures are tallied and never abort a build.

mod error;
mod links;
mod resolve;
mod tree;

pub use error::ProviderError;
pub use links::{extract_links, extract_tags, is_external_target, LinkRecord};
pub use resolve::FileIndex;
pub use tree::{flatten_tree, DirectoryProvider, FileTreeEntry, FlatFile, VaultProvider};

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use notegraph_core::{ContentStats, EdgeKind, GraphData, GraphEdge, GraphNode, NodeKind};
use tracing::{debug, info, warn};

/// Progress callback: (processed, total).
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Knobs for a workspace build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Maximum tree depth to descend.
    pub max_depth: usize,
    /// Path substrings to exclude.
    pub exclude_patterns: Vec<String>,
    /// File extensions to index.
    pub extensions: Vec<String>,
    /// Files processed per batch before yielding.
    pub batch_size: usize,
    /// Byte ceiling above which a file is skipped with a warning.
    pub max_file_bytes: usize,
    /// Hard cap on graph size; extra files are dropped with a warning.
    pub max_nodes: usize,
    /// Create folder nodes with containment edges.
    pub include_folders: bool,
    /// Create tag nodes from inline `#tag` occurrences.
    pub include_tags: bool,
    /// Surface external links as their own nodes.
    pub include_external_links: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_depth: 12,
            exclude_patterns: Vec::new(),
            extensions: vec!["md".to_string(), "markdown".to_string()],
            batch_size: 64,
            max_file_bytes: 2 * 1024 * 1024,
            max_nodes: 50_000,
            include_folders: false,
            include_tags: false,
            include_external_links: false,
        }
    }
}

/// Counters describing a build or incremental update.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub skipped_files: usize,
    pub error_count: usize,
    pub phantom_count: usize,
    pub duration: Duration,
}

/// Turns a file tree plus per-file text into nodes and edges.
pub struct GraphBuilder {
    graph: GraphData,
    index: FileIndex,
    options: BuildOptions,
    /// Raw (unresolved) target text for each phantom node id.
    phantom_targets: HashMap<String, String>,
}

impl GraphBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            graph: GraphData::new(),
            index: FileIndex::new(),
            options,
            phantom_targets: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &GraphData {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut GraphData {
        &mut self.graph
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Destroy all builder state.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.index.clear();
        self.phantom_targets.clear();
    }

    /// Build the graph from scratch.
    ///
    /// All file nodes are created and indexed before any content is read so
    /// that link resolution sees the full workspace; content is then
    /// processed in batches with a cooperative yield between batches.
    pub async fn build_from_workspace(
        &mut self,
        provider: &impl VaultProvider,
        progress: Option<&ProgressFn>,
    ) -> Result<BuildStats, ProviderError> {
        let started = Instant::now();
        self.clear();

        let tree = provider.file_tree()?;
        let mut files = flatten_tree(
            &tree,
            self.options.max_depth,
            &self.options.exclude_patterns,
            &self.options.extensions,
        );
        if files.len() > self.options.max_nodes {
            warn!(
                total = files.len(),
                max = self.options.max_nodes,
                "workspace exceeds max node count, truncating"
            );
            files.truncate(self.options.max_nodes);
        }

        let mut stats = BuildStats {
            total_files: files.len(),
            ..BuildStats::default()
        };

        for file in &files {
            self.index.insert(&file.path);
            let label = stem_label(&file.name);
            self.graph
                .upsert_node(GraphNode::new(&file.path, label, NodeKind::File));
            if self.options.include_folders {
                self.add_folder_chain(&file.path, &file.parent);
            }
        }

        for batch in files.chunks(self.options.batch_size.max(1)) {
            for file in batch {
                self.process_file(provider, &file.path, &mut stats);
            }
            if let Some(report) = progress {
                report(stats.processed_files, stats.total_files);
            }
            tokio::task::yield_now().await;
        }

        self.refresh_node_sizes();
        stats.phantom_count = self.phantom_targets.len();
        stats.duration = started.elapsed();
        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            processed = stats.processed_files,
            errors = stats.error_count,
            ?stats.duration,
            "workspace build complete"
        );
        Ok(stats)
    }

    /// Re-process only the given files after change notifications.
    ///
    /// Nodes and edges tied to the changed files are dropped and recreated;
    /// edges arriving from unchanged files are re-resolved so renames heal.
    /// Never a full rebuild.
    pub fn update_changed_files(
        &mut self,
        provider: &impl VaultProvider,
        paths: &[String],
    ) -> BuildStats {
        let started = Instant::now();
        let changed: HashSet<&str> = paths.iter().map(String::as_str).collect();
        let mut stats = BuildStats {
            total_files: paths.len(),
            ..BuildStats::default()
        };

        // Snapshot inbound edges from unchanged sources so they survive the
        // drop/recreate cycle; remember the old target label for re-resolution.
        let mut preserved: Vec<(GraphEdge, String)> = Vec::new();
        for edge in self.graph.edges() {
            if changed.contains(edge.target.as_str()) && !changed.contains(edge.source.as_str()) {
                let label = self
                    .graph
                    .node(&edge.target)
                    .map(|n| n.label.clone())
                    .unwrap_or_else(|| edge.target.clone());
                preserved.push((edge.clone(), label));
            }
        }

        for path in paths {
            self.graph.remove_node(path);
            self.index.remove(path);
        }

        for path in paths {
            match provider.read_file(path) {
                Ok(_) => {
                    self.index.insert(path);
                    let name = path.rsplit('/').next().unwrap_or(path);
                    self.graph
                        .upsert_node(GraphNode::new(path, stem_label(name), NodeKind::File));
                }
                Err(ProviderError::NotFound(_)) => {
                    debug!(path, "changed file no longer exists, treated as deletion");
                }
                Err(err) => {
                    warn!(path, %err, "failed to stat changed file");
                    stats.error_count += 1;
                }
            }
        }

        for path in paths {
            if self.graph.contains_node(path) {
                self.process_file(provider, path, &mut stats);
            }
        }

        for (edge, target_label) in preserved {
            if self.graph.contains_node(&edge.target) {
                let _ = self.graph.insert_edge(edge);
            } else if let Some(resolved) = self.index.resolve(&target_label, &edge.source) {
                let rebuilt = GraphEdge::new(edge.source.clone(), resolved, edge.kind)
                    .with_alias(edge.metadata.alias.clone());
                let _ = self.graph.insert_edge(rebuilt);
            } else {
                self.connect_phantom(
                    &edge.source,
                    &target_label,
                    edge.kind,
                    edge.metadata.alias.clone(),
                    edge.metadata.position,
                );
            }
        }

        self.resolve_phantoms();
        self.refresh_node_sizes();
        stats.phantom_count = self.phantom_targets.len();
        stats.duration = started.elapsed();
        info!(
            changed = paths.len(),
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "incremental update complete"
        );
        stats
    }

    /// Read one file and create its edges. Failures are tallied, never
    /// propagated.
    fn process_file(
        &mut self,
        provider: &impl VaultProvider,
        path: &str,
        stats: &mut BuildStats,
    ) {
        let content = match provider.read_file(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path, %err, "failed to read file, skipping");
                stats.error_count += 1;
                return;
            }
        };

        if content.len() > self.options.max_file_bytes {
            warn!(
                path,
                bytes = content.len(),
                ceiling = self.options.max_file_bytes,
                "file exceeds size ceiling, skipping"
            );
            stats.skipped_files += 1;
            return;
        }

        if let Some(node) = self.graph.node_mut(path) {
            node.metadata.content_stats = Some(ContentStats {
                bytes: content.len(),
                words: content.split_whitespace().count(),
                lines: content.lines().count(),
            });
        }

        for record in extract_links(&content) {
            self.apply_link(path, &record);
        }

        if self.options.include_tags {
            for (tag, position) in extract_tags(&content) {
                let tag_id = format!("tag:{tag}");
                if !self.graph.contains_node(&tag_id) {
                    let mut node = GraphNode::new(&tag_id, format!("#{tag}"), NodeKind::Tag);
                    node.size = 3.0;
                    let _ = self.graph.insert_node(node);
                }
                let edge = GraphEdge::new(path, tag_id, EdgeKind::Reference).with_position(position);
                let _ = self.graph.insert_edge(edge);
            }
        }

        stats.processed_files += 1;
    }

    /// Create the edge for one extracted link, substituting a phantom node
    /// when the target does not resolve.
    fn apply_link(&mut self, source: &str, record: &LinkRecord) {
        if is_external_target(&record.target) {
            if self.options.include_external_links {
                let link_id = format!("link:{}", record.target.to_ascii_lowercase());
                if !self.graph.contains_node(&link_id) {
                    let mut node = GraphNode::new(&link_id, &record.target, NodeKind::Link);
                    node.size = 3.0;
                    let _ = self.graph.insert_node(node);
                }
                let edge = GraphEdge::new(source, link_id, record.kind)
                    .with_alias(record.alias.clone())
                    .with_position(record.position);
                let _ = self.graph.insert_edge(edge);
            }
            return;
        }

        match self.index.resolve(&record.target, source) {
            Some(target_id) => {
                let edge = GraphEdge::new(source, target_id, record.kind)
                    .with_alias(record.alias.clone())
                    .with_position(record.position);
                // Self-links and repeated links to the same pair are dropped
                // silently; the arena enforces both.
                let _ = self.graph.insert_edge(edge);
            }
            None => {
                self.connect_phantom(
                    source,
                    &record.target,
                    record.kind,
                    record.alias.clone(),
                    Some(record.position),
                );
            }
        }
    }

    fn connect_phantom(
        &mut self,
        source: &str,
        target: &str,
        kind: EdgeKind,
        alias: Option<String>,
        position: Option<usize>,
    ) {
        let phantom_id = format!("phantom:{}", target.to_ascii_lowercase());
        if !self.graph.contains_node(&phantom_id) {
            let mut node = GraphNode::new(&phantom_id, target, NodeKind::Phantom);
            node.size = 3.0;
            let _ = self.graph.insert_node(node);
            self.phantom_targets
                .insert(phantom_id.clone(), target.to_string());
        }
        let mut edge = GraphEdge::new(source, phantom_id, kind).with_alias(alias);
        edge.metadata.position = position;
        let _ = self.graph.insert_edge(edge);
    }

    /// Replace phantoms whose target name a real file now answers to.
    fn resolve_phantoms(&mut self) {
        let pending: Vec<(String, String)> = self
            .phantom_targets
            .iter()
            .map(|(id, target)| (id.clone(), target.clone()))
            .collect();

        for (phantom_id, target) in pending {
            if !self.graph.contains_node(&phantom_id) {
                self.phantom_targets.remove(&phantom_id);
                continue;
            }
            let Some(resolved) = self.index.resolve(&target, "") else {
                continue;
            };
            debug!(phantom = %phantom_id, file = %resolved, "phantom resolved to real file");

            // Re-point every edge touching the phantom at the real node.
            let touching: Vec<GraphEdge> = self
                .graph
                .edges()
                .filter(|e| e.source == phantom_id || e.target == phantom_id)
                .cloned()
                .collect();
            self.graph.remove_node(&phantom_id);
            self.phantom_targets.remove(&phantom_id);

            for mut edge in touching {
                if edge.source == phantom_id {
                    edge.source = resolved.clone();
                }
                if edge.target == phantom_id {
                    edge.target = resolved.clone();
                }
                edge.id = format!("{}->{}", edge.source, edge.target);
                let _ = self.graph.insert_edge(edge);
            }
        }
    }

    fn add_folder_chain(&mut self, file_path: &str, parent: &str) {
        if parent.is_empty() {
            return;
        }
        if !self.graph.contains_node(parent) {
            let name = parent.rsplit('/').next().unwrap_or(parent);
            let mut node = GraphNode::new(parent, name, NodeKind::Folder);
            node.size = 5.0;
            let _ = self.graph.insert_node(node);
        }
        let edge = GraphEdge::new(parent, file_path, EdgeKind::Reference);
        let _ = self.graph.insert_edge(edge);
    }

    /// Scale node sizes by connectivity once edges are in place.
    fn refresh_node_sizes(&mut self) {
        let degrees: Vec<(String, usize)> = self
            .graph
            .nodes()
            .map(|n| (n.id.clone(), self.graph.degree(&n.id)))
            .collect();
        for (id, degree) in degrees {
            if let Some(node) = self.graph.node_mut(&id) {
                node.size = (4.0 + (degree as f32).sqrt() * 2.0).min(16.0);
            }
        }
    }
}

fn stem_label(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// In-memory provider; paths mapped to `None` fail on read.
    struct MemoryVault {
        files: BTreeMap<String, Option<String>>,
    }

    impl MemoryVault {
        fn new(files: &[(&str, Option<&str>)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, c)| (p.to_string(), c.map(|c| c.to_string())))
                    .collect(),
            }
        }

        fn set(&mut self, path: &str, content: &str) {
            self.files.insert(path.to_string(), Some(content.to_string()));
        }

        fn delete(&mut self, path: &str) {
            self.files.remove(path);
        }
    }

    impl VaultProvider for MemoryVault {
        fn file_tree(&self) -> Result<FileTreeEntry, ProviderError> {
            let mut root = FileTreeEntry::directory("", "", Vec::new());
            let mut dirs: BTreeMap<String, Vec<FileTreeEntry>> = BTreeMap::new();
            for path in self.files.keys() {
                let name = path.rsplit('/').next().unwrap_or(path).to_string();
                dirs.entry(tree::parent_of(path))
                    .or_default()
                    .push(FileTreeEntry::file(name, path.clone()));
            }
            for (dir, children) in dirs {
                if dir.is_empty() {
                    root.children.extend(children);
                } else {
                    let name = dir.rsplit('/').next().unwrap_or(&dir).to_string();
                    root.children
                        .push(FileTreeEntry::directory(name, dir, children));
                }
            }
            Ok(root)
        }

        fn read_file(&self, path: &str) -> Result<String, ProviderError> {
            match self.files.get(path) {
                Some(Some(content)) => Ok(content.clone()),
                Some(None) => Err(ProviderError::Read {
                    path: path.to_string(),
                    message: "simulated read failure".to_string(),
                }),
                None => Err(ProviderError::NotFound(path.to_string())),
            }
        }
    }

    fn vault() -> MemoryVault {
        MemoryVault::new(&[
            ("home.md", Some("[[Projects/README]] and [[Missing Note]]")),
            ("projects/readme.md", Some("back to [[home]]")),
            ("projects/scratch.md", Some("see [guide](docs/guide.md)")),
            ("docs/guide.md", Some("plain text")),
        ])
    }

    #[tokio::test]
    async fn build_creates_nodes_edges_and_phantoms() {
        let mut builder = GraphBuilder::new(BuildOptions::default());
        let stats = builder
            .build_from_workspace(&vault(), None)
            .await
            .unwrap();

        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.processed_files, 4);
        assert_eq!(stats.error_count, 0);
        assert_eq!(stats.phantom_count, 1);

        let graph = builder.graph();
        assert!(graph.contains_node("home.md"));
        assert!(graph.contains_node("phantom:missing note"));
        let phantom = graph.node("phantom:missing note").unwrap();
        assert_eq!(phantom.kind, NodeKind::Phantom);
        assert!(phantom.metadata.is_phantom);
        // home -> readme, home -> phantom, readme<->home deduped, scratch -> guide.
        assert_eq!(graph.edge_count(), 3);
    }

    #[tokio::test]
    async fn read_errors_are_counted_not_fatal() {
        let provider = MemoryVault::new(&[
            ("ok.md", Some("[[other]]")),
            ("broken.md", None),
            ("other.md", Some("fine")),
        ]);
        let mut builder = GraphBuilder::new(BuildOptions::default());
        let stats = builder
            .build_from_workspace(&provider, None)
            .await
            .unwrap();

        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.processed_files, 2);
        assert!(stats.processed_files <= stats.total_files);
        // The failing file still has a node; it just contributed no edges.
        assert!(builder.graph().contains_node("broken.md"));
    }

    #[tokio::test]
    async fn oversized_files_are_skipped() {
        let big = "x".repeat(512);
        let provider = MemoryVault::new(&[("big.md", Some(big.as_str()))]);
        let options = BuildOptions {
            max_file_bytes: 100,
            ..BuildOptions::default()
        };
        let mut builder = GraphBuilder::new(options);
        let stats = builder
            .build_from_workspace(&provider, None)
            .await
            .unwrap();
        assert_eq!(stats.skipped_files, 1);
        assert_eq!(stats.processed_files, 0);
    }

    #[tokio::test]
    async fn progress_reported_per_batch() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_seen = Arc::clone(&calls);
        let report: Box<ProgressFn> = Box::new(move |processed, total| {
            assert!(processed <= total);
            calls_seen.fetch_add(1, Ordering::SeqCst);
        });

        let options = BuildOptions {
            batch_size: 1,
            ..BuildOptions::default()
        };
        let mut builder = GraphBuilder::new(options);
        builder
            .build_from_workspace(&vault(), Some(report.as_ref()))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn incremental_update_reprocesses_only_changed() {
        let mut provider = vault();
        let mut builder = GraphBuilder::new(BuildOptions::default());
        builder
            .build_from_workspace(&provider, None)
            .await
            .unwrap();
        let nodes_before = builder.graph().node_count();

        provider.set("projects/readme.md", "no more links here");
        let stats = builder.update_changed_files(&provider, &["projects/readme.md".to_string()]);

        assert_eq!(stats.total_files, 1);
        let graph = builder.graph();
        assert_eq!(graph.node_count(), nodes_before);
        // readme no longer links home, but home still links readme.
        assert!(graph.edge("projects/readme.md->home.md").is_none());
        assert!(graph.edge("home.md->projects/readme.md").is_some());
    }

    #[tokio::test]
    async fn new_file_resolves_existing_phantom() {
        let mut provider = vault();
        let mut builder = GraphBuilder::new(BuildOptions::default());
        builder
            .build_from_workspace(&provider, None)
            .await
            .unwrap();
        assert!(builder.graph().contains_node("phantom:missing note"));

        provider.set("Missing Note.md", "now real");
        let stats =
            builder.update_changed_files(&provider, &["Missing Note.md".to_string()]);

        assert_eq!(stats.phantom_count, 0);
        let graph = builder.graph();
        assert!(!graph.contains_node("phantom:missing note"));
        assert!(graph.contains_node("Missing Note.md"));
        assert!(graph.edge("home.md->Missing Note.md").is_some());
    }

    #[tokio::test]
    async fn deleting_a_file_degrades_inbound_links_to_phantom() {
        let mut provider = vault();
        let mut builder = GraphBuilder::new(BuildOptions::default());
        builder
            .build_from_workspace(&provider, None)
            .await
            .unwrap();

        provider.delete("projects/readme.md");
        builder.update_changed_files(&provider, &["projects/readme.md".to_string()]);

        let graph = builder.graph();
        assert!(!graph.contains_node("projects/readme.md"));
        // home.md's link now lands on a phantom instead of dangling.
        assert!(graph
            .edges()
            .any(|e| e.source == "home.md" && e.target.starts_with("phantom:")));
    }

    #[tokio::test]
    async fn tags_and_external_links_are_optional_nodes() {
        let provider = MemoryVault::new(&[(
            "note.md",
            Some("tagged #rust, see [site](https://example.com)"),
        )]);
        let options = BuildOptions {
            include_tags: true,
            include_external_links: true,
            ..BuildOptions::default()
        };
        let mut builder = GraphBuilder::new(options);
        builder
            .build_from_workspace(&provider, None)
            .await
            .unwrap();

        let graph = builder.graph();
        assert_eq!(graph.node("tag:rust").unwrap().kind, NodeKind::Tag);
        assert_eq!(
            graph.node("link:https://example.com").unwrap().kind,
            NodeKind::Link
        );
    }
}
