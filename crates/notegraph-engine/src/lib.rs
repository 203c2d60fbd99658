//! The engine facade tying graph building, layout, rendering, interaction,
//! and adaptive performance into one tick-driven unit.
//!
//! A hosting surface feeds the engine pointer events and camera updates,
//! calls [`GraphEngine::tick`] once per frame with a timestamp from its
//! [`TickSource`], and draws the returned frame. Everything inside the tick
//! is non-blocking; large layouts run on a worker thread and stream partial
//! positions back.

mod interaction;
mod perf;
mod scheduler;
mod settings;

pub use interaction::{InteractionConfig, InteractionController, InteractionOutcome};
pub use perf::{
    PerfConfig, PerformanceController, PerformanceMode, QualityChange, QualityKnobs, VecPool,
};
pub use scheduler::{ManualTicks, TickSource};
pub use settings::{
    DisplaySettings, FilterSettings, JsonFileStore, SettingsManager, SettingsStore,
    WorkspaceSettings,
};

use std::collections::{HashMap, HashSet};

use notegraph_builder::{BuildOptions, BuildStats, GraphBuilder, ProgressFn, VaultProvider};
use notegraph_core::{
    EventLog, GraphData, GraphEdge, GraphEvent, GraphNode, Vec2, ViewportState,
};
use notegraph_layout::{
    DragConfig, DragSimulation, LayoutBackend, LayoutEdgeSpec, LayoutEngine, LayoutNode,
    LayoutPhase, LayoutRequest, LayoutResponse, LayoutSnapshot, ThreadBackend,
};
use notegraph_render::{HighlightSet, LodThresholds, RenderFrame, RenderPipeline};
use tracing::{info, warn};

/// Fixed physics timestep for drag ticks.
const DRAG_DT: f32 = 0.016;

/// Iteration ceiling for offloaded layout jobs.
const WORKER_MAX_ITERATIONS: u64 = 50_000;

/// Graph-space distance within which a press counts as hitting an edge.
const EDGE_HIT_TOLERANCE: f32 = 6.0;

/// Top-level coordinator owning all subsystem state.
pub struct GraphEngine {
    builder: GraphBuilder,
    layout: LayoutEngine,
    pipeline: RenderPipeline,
    perf: PerformanceController,
    interaction: InteractionController,
    events: EventLog,
    settings: SettingsManager,

    worker: Option<ThreadBackend>,
    active_job: Option<u64>,
    next_job: u64,
    offloaded: bool,

    drag: Option<DragSimulation>,
    drag_target: Vec2,
    layout_ran_before_drag: bool,

    /// Edge under the pointer at press time, when no node was hit.
    pressed_edge: Option<String>,
    press_origin: Vec2,
    pointer_last: Vec2,

    viewport: ViewportState,
    highlight: HighlightSet,
    layout_index: HashMap<String, usize>,
    physics_budget: u32,
    scratch: VecPool<Vec2>,
    disposed: bool,
}

impl GraphEngine {
    /// Construct an engine with settings loaded from `store`.
    pub fn new(store: Box<dyn SettingsStore + Send>) -> Self {
        Self::with_perf_config(store, PerfConfig::default())
    }

    /// Like [`new`](Self::new) with explicit performance tuning.
    pub fn with_perf_config(store: Box<dyn SettingsStore + Send>, perf: PerfConfig) -> Self {
        let settings = SettingsManager::load(store);
        let force = settings.settings().force;
        let filters = settings.settings().filters.clone();

        let options = BuildOptions {
            include_folders: filters.include_folders,
            include_tags: filters.include_tags,
            exclude_patterns: filters.exclude_patterns,
            ..BuildOptions::default()
        };

        Self {
            builder: GraphBuilder::new(options),
            layout: LayoutEngine::new(force),
            pipeline: RenderPipeline::default(),
            perf: PerformanceController::new(perf),
            interaction: InteractionController::new(InteractionConfig::default()),
            events: EventLog::default(),
            settings,
            worker: None,
            active_job: None,
            next_job: 1,
            offloaded: false,
            drag: None,
            drag_target: Vec2::ZERO,
            layout_ran_before_drag: false,
            pressed_edge: None,
            press_origin: Vec2::ZERO,
            pointer_last: Vec2::ZERO,
            viewport: ViewportState::default(),
            highlight: HighlightSet::default(),
            layout_index: HashMap::new(),
            physics_budget: QualityKnobs::for_level(0).physics_budget,
            scratch: VecPool::default(),
            disposed: false,
        }
    }

    pub fn graph(&self) -> &GraphData {
        self.builder.graph()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn settings(&self) -> &WorkspaceSettings {
        self.settings.settings()
    }

    pub fn layout_phase(&self) -> LayoutPhase {
        self.layout.phase()
    }

    pub fn performance_mode(&self) -> PerformanceMode {
        self.perf.mode()
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    /// Build the whole graph from a workspace provider.
    pub async fn build_from_workspace(
        &mut self,
        provider: &impl VaultProvider,
        progress: Option<&ProgressFn>,
    ) -> anyhow::Result<BuildStats> {
        let (nodes_before, edges_before) = self.known_ids();
        let stats = self.builder.build_from_workspace(provider, progress).await?;
        self.emit_additions(&nodes_before, &edges_before);
        self.sync_layout(true);
        self.pipeline.invalidate();
        Ok(stats)
    }

    /// Re-process only the named files after change notifications.
    pub fn update_changed_files(
        &mut self,
        provider: &impl VaultProvider,
        paths: &[String],
    ) -> BuildStats {
        let (nodes_before, edges_before) = self.known_ids();
        let stats = self.builder.update_changed_files(provider, paths);
        self.emit_additions(&nodes_before, &edges_before);
        self.sync_layout(true);
        self.pipeline.invalidate();
        stats
    }

    /// Ids currently in the graph, for addition diffing around build calls.
    fn known_ids(&self) -> (HashSet<String>, HashSet<String>) {
        let graph = self.builder.graph();
        (
            graph.nodes().map(|n| n.id.clone()).collect(),
            graph.edges().map(|e| e.id.clone()).collect(),
        )
    }

    /// Emit `NodeAdded`/`EdgeAdded` for everything a build introduced.
    fn emit_additions(&mut self, nodes_before: &HashSet<String>, edges_before: &HashSet<String>) {
        let added_nodes: Vec<String> = self
            .builder
            .graph()
            .nodes()
            .map(|n| n.id.clone())
            .filter(|id| !nodes_before.contains(id))
            .collect();
        let added_edges: Vec<String> = self
            .builder
            .graph()
            .edges()
            .map(|e| e.id.clone())
            .filter(|id| !edges_before.contains(id))
            .collect();
        for id in added_nodes {
            self.events.append(GraphEvent::NodeAdded { id });
        }
        for id in added_edges {
            self.events.append(GraphEvent::EdgeAdded { id });
        }
    }

    /// Insert a node programmatically, emitting `NodeAdded`.
    pub fn add_node(&mut self, node: GraphNode) -> anyhow::Result<()> {
        let id = node.id.clone();
        self.builder.graph_mut().insert_node(node)?;
        self.events.append(GraphEvent::NodeAdded { id });
        self.sync_layout(false);
        Ok(())
    }

    /// Insert an edge programmatically, emitting `EdgeAdded`.
    pub fn add_edge(&mut self, edge: GraphEdge) -> anyhow::Result<()> {
        let id = edge.id.clone();
        self.builder.graph_mut().insert_edge(edge)?;
        self.events.append(GraphEvent::EdgeAdded { id });
        self.sync_layout(false);
        Ok(())
    }

    /// Run one frame: drain worker results, advance physics within budget,
    /// prepare the render frame, then let the adaptive controller react.
    pub fn tick(&mut self, now_ms: u64) -> RenderFrame {
        if self.disposed {
            return RenderFrame {
                nodes: Vec::new(),
                edges: Vec::new(),
                detail: notegraph_render::DetailLevel::Low,
                complete: true,
            };
        }

        self.poll_worker();

        if self.interaction.poll_resume(now_ms) {
            self.layout.resume();
            self.events.append(GraphEvent::LayoutStarted);
        }

        if let Some(drag) = &mut self.drag {
            drag.tick(&mut self.layout, self.drag_target, DRAG_DT);
        } else if !self.offloaded && self.layout.phase() == LayoutPhase::Running {
            for _ in 0..self.physics_budget {
                if self.layout.step() != LayoutPhase::Running {
                    break;
                }
            }
            if self.layout.phase() == LayoutPhase::Stable {
                self.events.append(GraphEvent::LayoutCompleted {
                    iterations: self.layout.iteration(),
                });
            }
        }

        self.write_back_positions();

        let frame = self.pipeline.prepare_frame(
            self.builder.graph(),
            &self.viewport,
            now_ms,
            &self.highlight,
        );

        self.perf.record_frame(now_ms);
        if let Some(change) = self.perf.maybe_adapt(now_ms) {
            self.apply_quality(change);
        }
        if self.perf.should_sweep(now_ms) {
            self.pipeline.sweep_caches(now_ms);
        }
        self.settings.tick(now_ms);

        frame
    }

    /// Pointer pressed over the surface; `hit` is the node under the cursor.
    ///
    /// A press on a node locks the camera and pauses layout stepping right
    /// away, before any drag threshold is crossed. A press on empty space
    /// hit-tests edges for a later click.
    pub fn pointer_down(&mut self, hit: Option<&str>, position: Vec2) {
        self.press_origin = position;
        self.pointer_last = position;
        self.pressed_edge = None;
        match hit {
            Some(_) => {
                self.layout_ran_before_drag = self.layout.phase() == LayoutPhase::Running;
                self.layout.pause();
            }
            None => {
                self.pressed_edge = self.edge_at(position).map(str::to_owned);
            }
        }
        self.interaction.pointer_down(hit, position);
    }

    pub fn pointer_move(&mut self, position: Vec2) {
        self.pointer_last = position;
        match self.interaction.pointer_move(position) {
            Some(InteractionOutcome::DragStarted { id }) => {
                if let Some(&index) = self.layout_index.get(&id) {
                    self.drag =
                        Some(DragSimulation::begin(&self.layout, index, DragConfig::default()));
                    self.drag_target = position;
                }
                self.events.append(GraphEvent::DragStart { id });
            }
            Some(InteractionOutcome::DragMoved { id, position }) => {
                self.drag_target = position;
                self.events.append(GraphEvent::DragMove { id });
            }
            _ => {}
        }
    }

    pub fn pointer_up(&mut self, now_ms: u64) {
        match self
            .interaction
            .pointer_up(now_ms, self.layout_ran_before_drag)
        {
            Some(InteractionOutcome::DragEnded { id }) => {
                self.drag = None;
                self.events.append(GraphEvent::DragEnd { id });
            }
            Some(InteractionOutcome::Clicked { id }) => {
                // A click paused layout at press time; resume it straight
                // away, no cooldown.
                if self.layout_ran_before_drag {
                    self.layout.resume();
                    self.layout_ran_before_drag = false;
                }
                let label = self
                    .builder
                    .graph()
                    .node(&id)
                    .map(|n| n.label.clone())
                    .unwrap_or_default();
                self.events.append(GraphEvent::NodeClick { id, label });
            }
            None => {
                if let Some(edge_id) = self.pressed_edge.take() {
                    let threshold = self.interaction.config().drag_threshold_px;
                    if self.press_origin.distance(self.pointer_last) < threshold {
                        self.events.append(GraphEvent::EdgeClick { id: edge_id });
                    }
                }
            }
            _ => {}
        }
    }

    /// Hover target changed; highlights the node and direct neighbors.
    pub fn hover(&mut self, hit: Option<&str>) {
        if let Some(InteractionOutcome::HoverChanged { id }) = self.interaction.hover(hit) {
            match &id {
                Some(node_id) => {
                    self.highlight = HighlightSet {
                        focus: Some(node_id.clone()),
                        neighbors: self
                            .builder
                            .graph()
                            .neighbors(node_id)
                            .into_iter()
                            .map(str::to_owned)
                            .collect(),
                    };
                    self.events.append(GraphEvent::NodeHover {
                        id: node_id.clone(),
                        entered: true,
                    });
                }
                None => {
                    if let Some(previous) = self.highlight.focus.take() {
                        self.events.append(GraphEvent::NodeHover {
                            id: previous,
                            entered: false,
                        });
                    }
                    self.highlight = HighlightSet::default();
                }
            }
        }
    }

    /// Hit-test a graph-space position against node bounds.
    pub fn node_at(&self, position: Vec2) -> Option<&str> {
        self.builder
            .graph()
            .nodes()
            .filter(|node| node.position.distance(position) <= node.size.max(4.0))
            .min_by(|a, b| {
                let da = a.position.distance(position);
                let db = b.position.distance(position);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|node| node.id.as_str())
    }

    /// Hit-test a graph-space position against edge segments.
    pub fn edge_at(&self, position: Vec2) -> Option<&str> {
        let graph = self.builder.graph();
        let mut best: Option<(&str, f32)> = None;
        for edge in graph.edges() {
            let (Some(a), Some(b)) = (graph.node(&edge.source), graph.node(&edge.target)) else {
                continue;
            };
            let dist = segment_distance(position, a.position, b.position);
            if dist <= EDGE_HIT_TOLERANCE && best.map_or(true, |(_, d)| dist < d) {
                best = Some((edge.id.as_str(), dist));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Camera moved. Visibility refresh rides the culler throttle rather
    /// than recomputing per event.
    pub fn set_viewport(&mut self, viewport: ViewportState) {
        if self.interaction.camera_enabled() {
            self.viewport = viewport;
            self.events.append(GraphEvent::CameraUpdate { viewport });
        }
    }

    /// Mutate settings; force parameter changes reach the live simulation.
    pub fn update_settings(&mut self, now_ms: u64, apply: impl FnOnce(&mut WorkspaceSettings)) {
        self.settings.update(now_ms, apply);
        self.layout.set_params(self.settings.settings().force);
    }

    pub fn stop_layout(&mut self) {
        self.layout.stop();
        self.active_job = None;
        self.events.append(GraphEvent::LayoutStopped);
    }

    /// Drop all graph and derived state, keeping settings.
    pub fn clear(&mut self) {
        self.builder.clear();
        self.layout.set_graph(LayoutSnapshot::default());
        self.layout_index.clear();
        self.pipeline.invalidate();
        self.highlight = HighlightSet::default();
        self.drag = None;
        self.pressed_edge = None;
        self.active_job = None;
    }

    /// Tear down: flush settings, cancel pending work, shut the worker down.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.settings.flush();
        self.layout.stop();
        self.active_job = None;
        // Dropping the backend closes its channel and joins the thread.
        self.worker = None;
        self.disposed = true;
        info!("engine disposed");
    }

    /// Rebuild the layout snapshot from the current graph. Large graphs go
    /// to the worker thread; everything else steps inline per tick.
    fn sync_layout(&mut self, restart: bool) {
        let graph = self.builder.graph();
        let mut nodes: Vec<&GraphNode> = graph.nodes().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        self.layout_index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();

        let snapshot = LayoutSnapshot {
            nodes: nodes
                .iter()
                .map(|node| LayoutNode {
                    id: node.id.clone(),
                    size: node.size,
                    position: node.placed.then_some(node.position),
                })
                .collect(),
            edges: graph
                .edges()
                .filter_map(|edge| {
                    Some(LayoutEdgeSpec {
                        a: *self.layout_index.get(&edge.source)?,
                        b: *self.layout_index.get(&edge.target)?,
                        weight: 1.0,
                    })
                })
                .collect(),
        };

        let node_count = snapshot.nodes.len();
        self.offloaded = self.perf.should_offload(node_count);
        self.layout.set_graph(snapshot.clone());

        if !restart || node_count == 0 {
            return;
        }

        if self.offloaded {
            // Keep the local engine parked; the worker owns the simulation.
            let job = self.next_job;
            self.next_job += 1;
            self.active_job = Some(job);
            let request = LayoutRequest {
                id: job,
                snapshot,
                params: self.settings.settings().force,
                max_iterations: WORKER_MAX_ITERATIONS,
                progress_every: 200,
            };
            self.worker.get_or_insert_with(ThreadBackend::new).submit(request);
            self.events.append(GraphEvent::LayoutStarted);
        } else if self.layout.phase() != LayoutPhase::Stable {
            self.layout.start();
            self.events.append(GraphEvent::LayoutStarted);
        }
    }

    /// Apply streamed worker results without blocking the frame.
    fn poll_worker(&mut self) {
        let mut responses = Vec::new();
        if let Some(worker) = self.worker.as_mut() {
            while let Some(response) = worker.poll() {
                responses.push(response);
            }
        }
        for response in responses {
            if Some(response.request_id()) != self.active_job {
                continue;
            }
            match response {
                LayoutResponse::Progress { positions, .. } => {
                    self.apply_positions(&positions);
                }
                LayoutResponse::Complete {
                    positions,
                    iterations,
                    ..
                } => {
                    self.apply_positions(&positions);
                    self.active_job = None;
                    self.events
                        .append(GraphEvent::LayoutCompleted { iterations });
                }
                LayoutResponse::Failed { message, .. } => {
                    warn!(message, "worker layout failed, falling back to inline");
                    self.active_job = None;
                    self.offloaded = false;
                    self.layout.start();
                }
            }
        }
    }

    fn apply_positions(&mut self, positions: &[Vec2]) {
        for (id, &index) in &self.layout_index {
            if let Some(&position) = positions.get(index) {
                self.layout.set_position(index, position);
                if let Some(node) = self.builder.graph_mut().node_mut(id) {
                    node.position = position;
                    node.placed = true;
                }
            }
        }
    }

    /// Copy live simulation positions onto the graph nodes the renderer
    /// reads. The staging buffer is recycled between frames.
    fn write_back_positions(&mut self) {
        let mut positions = self.scratch.acquire();
        positions.extend_from_slice(self.layout.positions());
        for (id, &index) in &self.layout_index {
            if let Some(&position) = positions.get(index) {
                if let Some(node) = self.builder.graph_mut().node_mut(id) {
                    node.position = position;
                    node.placed = true;
                }
            }
        }
        self.scratch.release(positions);
    }

    fn apply_quality(&mut self, change: QualityChange) {
        let knobs = change.knobs;
        self.physics_budget = knobs.physics_budget;
        self.pipeline
            .set_lod(LodThresholds::default().scaled(knobs.lod_scale));
        self.pipeline.culler_mut().set_margin(knobs.cull_margin);
        self.pipeline
            .progressive_mut()
            .set_chunk_size(knobs.chunk_size);
        if let Some(mode) = change.mode_changed {
            self.events.append(GraphEvent::PerformanceModeChanged {
                mode: mode.label().to_owned(),
            });
        }
    }
}

impl Drop for GraphEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Distance from a point to the segment `a..b`.
fn segment_distance(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notegraph_core::{EdgeKind, NodeKind};

    struct NullStore;

    impl SettingsStore for NullStore {
        fn load(&self) -> anyhow::Result<Option<String>> {
            Ok(None)
        }

        fn save(&self, _json: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn engine() -> GraphEngine {
        GraphEngine::new(Box::new(NullStore))
    }

    fn placed_node(id: &str, x: f32) -> GraphNode {
        let mut node = GraphNode::new(id, id, NodeKind::File);
        node.position = Vec2::new(x, 0.0);
        node.placed = true;
        node
    }

    fn two_node_engine() -> GraphEngine {
        let mut eng = engine();
        eng.add_node(placed_node("a", 0.0)).unwrap();
        eng.add_node(placed_node("b", 100.0)).unwrap();
        eng.add_edge(GraphEdge::new("a", "b", EdgeKind::Wiki)).unwrap();
        eng
    }

    #[test]
    fn placed_node_at_origin_is_not_reseeded() {
        let mut eng = two_node_engine();
        eng.tick(16);
        assert_eq!(eng.graph().node("a").unwrap().position, Vec2::ZERO);
        assert_eq!(
            eng.graph().node("b").unwrap().position,
            Vec2::new(100.0, 0.0)
        );
    }

    #[test]
    fn frame_buffers_are_recycled_between_ticks() {
        let mut eng = two_node_engine();
        assert_eq!(eng.scratch.pooled(), 0);
        eng.tick(16);
        assert_eq!(eng.scratch.pooled(), 1);
        eng.tick(32);
        assert_eq!(eng.scratch.pooled(), 1);
    }

    #[test]
    fn edge_press_and_release_emits_edge_click() {
        let mut eng = two_node_engine();
        eng.pointer_down(None, Vec2::new(50.0, 2.0));
        eng.pointer_up(10);
        assert!(eng
            .events()
            .iter()
            .any(|e| matches!(e, GraphEvent::EdgeClick { id } if id == "a->b")));
    }

    #[test]
    fn edge_press_with_pan_movement_is_not_a_click() {
        let mut eng = two_node_engine();
        eng.pointer_down(None, Vec2::new(50.0, 2.0));
        eng.pointer_move(Vec2::new(80.0, 2.0));
        eng.pointer_up(10);
        assert!(!eng
            .events()
            .iter()
            .any(|e| matches!(e, GraphEvent::EdgeClick { .. })));
    }

    #[test]
    fn press_far_from_any_edge_hits_nothing() {
        let eng = two_node_engine();
        assert_eq!(eng.edge_at(Vec2::new(50.0, 40.0)), None);
        assert_eq!(eng.edge_at(Vec2::new(50.0, 2.0)), Some("a->b"));
    }
}
