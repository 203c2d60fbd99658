//! The iterative force simulation.

use notegraph_core::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::cache::{LayoutCache, LayoutKey};
use crate::params::ForceParams;
use crate::quadtree::QuadTree;
use crate::stability::StabilityTracker;

/// Iterations between energy samples.
const SAMPLE_INTERVAL: u64 = 10;

/// Distance below which two nodes count as coincident.
const MIN_DISTANCE: f32 = 0.01;

/// Lifecycle of the layout simulation.
///
/// `Idle → Running → { Stable, Paused, Stopped }`; `Stopped`/`Stable` go
/// back to `Running` on restart, `Paused` resumes after a drag ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPhase {
    Idle,
    Running,
    Stable,
    Paused,
    Stopped,
}

/// Per-node input to the simulation.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: String,
    pub size: f32,
    /// `None` means unset; the engine seeds a random position.
    pub position: Option<Vec2>,
}

/// An edge by node index.
#[derive(Debug, Clone, Copy)]
pub struct LayoutEdgeSpec {
    pub a: usize,
    pub b: usize,
    pub weight: f32,
}

/// A copy of graph data the simulation (or a worker) operates on.
#[derive(Debug, Clone, Default)]
pub struct LayoutSnapshot {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdgeSpec>,
}

/// Owns node positions and runs the force model.
pub struct LayoutEngine {
    params: ForceParams,
    phase: LayoutPhase,
    ids: Vec<String>,
    masses: Vec<f32>,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    edges: Vec<LayoutEdgeSpec>,
    adjacency: Vec<Vec<usize>>,
    forces: Vec<Vec2>,
    iteration: u64,
    stability: StabilityTracker,
    rng: StdRng,
    cache: LayoutCache,
}

impl LayoutEngine {
    pub fn new(params: ForceParams) -> Self {
        Self {
            rng: StdRng::seed_from_u64(params.seed),
            params,
            phase: LayoutPhase::Idle,
            ids: Vec::new(),
            masses: Vec::new(),
            positions: Vec::new(),
            velocities: Vec::new(),
            edges: Vec::new(),
            adjacency: Vec::new(),
            forces: Vec::new(),
            iteration: 0,
            stability: StabilityTracker::default(),
            cache: LayoutCache::new(8),
        }
    }

    /// Load a graph snapshot. A cache hit for the same shape and physics
    /// reuses the previously converged positions instead of resimulating.
    pub fn set_graph(&mut self, snapshot: LayoutSnapshot) {
        let n = snapshot.nodes.len();

        self.ids = snapshot.nodes.iter().map(|node| node.id.clone()).collect();
        self.masses = snapshot
            .nodes
            .iter()
            .map(|node| (node.size / 4.0).max(0.1))
            .collect();
        self.velocities = vec![Vec2::ZERO; n];
        self.forces = vec![Vec2::ZERO; n];
        self.edges = snapshot
            .edges
            .iter()
            .copied()
            .filter(|e| e.a < n && e.b < n && e.a != e.b)
            .collect();
        self.adjacency = vec![Vec::new(); n];
        for edge in &self.edges {
            self.adjacency[edge.a].push(edge.b);
            self.adjacency[edge.b].push(edge.a);
        }
        self.iteration = 0;
        self.stability.reset();

        let key = LayoutKey::new(n, self.edges.len(), &self.params);
        if let Some(cached) = self.cache.get(&key) {
            if cached.len() == n {
                debug!(nodes = n, "layout cache hit, reusing positions");
                self.positions = cached.clone();
                self.phase = LayoutPhase::Stable;
                return;
            }
        }

        // Spread initial positions over a disc sized to the graph.
        let radius = self.params.rest_length * (n.max(1) as f32).sqrt() * 0.5;
        self.positions = snapshot
            .nodes
            .iter()
            .map(|node| match node.position {
                Some(pos) => pos,
                None => Vec2::new(
                    self.rng.random_range(-radius..=radius),
                    self.rng.random_range(-radius..=radius),
                ),
            })
            .collect();
        self.phase = LayoutPhase::Idle;
    }

    pub fn phase(&self) -> LayoutPhase {
        self.phase
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn position_of(&self, index: usize) -> Option<Vec2> {
        self.positions.get(index).copied()
    }

    /// Overwrite a node position directly (drag interaction).
    pub fn set_position(&mut self, index: usize, position: Vec2) {
        if let Some(slot) = self.positions.get_mut(index) {
            *slot = position;
        }
    }

    /// Overwrite every position at once (worker results).
    pub fn apply_positions(&mut self, positions: &[Vec2]) {
        if positions.len() == self.positions.len() {
            self.positions.copy_from_slice(positions);
        }
    }

    pub fn adjacency(&self) -> &[Vec<usize>] {
        &self.adjacency
    }

    pub fn edges(&self) -> &[LayoutEdgeSpec] {
        &self.edges
    }

    pub fn params(&self) -> &ForceParams {
        &self.params
    }

    /// Replace the physics parameters; restarts stability tracking.
    pub fn set_params(&mut self, params: ForceParams) {
        self.params = params.clamped();
        self.stability.reset();
        if self.phase == LayoutPhase::Stable {
            self.phase = LayoutPhase::Running;
        }
    }

    /// Start or restart iteration.
    pub fn start(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        self.phase = LayoutPhase::Running;
        self.stability.reset();
    }

    /// Halt iteration before convergence.
    pub fn stop(&mut self) {
        self.phase = LayoutPhase::Stopped;
    }

    /// Pause automatic stepping (during drag).
    pub fn pause(&mut self) {
        if self.phase == LayoutPhase::Running {
            self.phase = LayoutPhase::Paused;
        }
    }

    /// Resume after a pause.
    pub fn resume(&mut self) {
        if self.phase == LayoutPhase::Paused {
            self.phase = LayoutPhase::Running;
        }
    }

    /// Aggregate of squared positions; the stability scalar.
    pub fn energy(&self) -> f32 {
        self.positions.iter().map(|p| p.length_sq()).sum()
    }

    /// Advance the simulation by one iteration.
    pub fn step(&mut self) -> LayoutPhase {
        if self.phase != LayoutPhase::Running {
            return self.phase;
        }

        self.perturb_coincident();
        self.accumulate_forces();
        self.integrate();
        self.iteration += 1;

        if self.iteration % SAMPLE_INTERVAL == 0 && self.stability.record(self.energy()) {
            info!(iterations = self.iteration, "layout converged");
            self.phase = LayoutPhase::Stable;
            let key = LayoutKey::new(self.ids.len(), self.edges.len(), &self.params);
            self.cache.store(key, self.positions.clone());
        }

        self.phase
    }

    /// Run up to `max_iterations` steps; returns how many actually ran.
    pub fn run(&mut self, max_iterations: u64) -> u64 {
        let mut ran = 0;
        while ran < max_iterations && self.step() == LayoutPhase::Running {
            ran += 1;
        }
        ran
    }

    /// Nudge exactly-coincident nodes apart so repulsion never divides by
    /// zero.
    fn perturb_coincident(&mut self) {
        use std::collections::HashMap;
        let mut seen: HashMap<(u32, u32), usize> = HashMap::new();
        for i in 0..self.positions.len() {
            let key = (self.positions[i].x.to_bits(), self.positions[i].y.to_bits());
            if seen.insert(key, i).is_some() {
                let jitter = Vec2::new(
                    self.rng.random_range(-0.5..=0.5),
                    self.rng.random_range(-0.5..=0.5),
                );
                self.positions[i] += jitter + Vec2::new(MIN_DISTANCE, MIN_DISTANCE);
            }
        }
    }

    fn accumulate_forces(&mut self) {
        let n = self.positions.len();
        for force in &mut self.forces {
            *force = Vec2::ZERO;
        }

        // Repulsion: Barnes-Hut above the threshold, exact below.
        if n > self.params.barnes_hut_threshold {
            let tree = QuadTree::build(&self.positions, &self.masses, self.params.max_tree_depth);
            for i in 0..n {
                let force = tree.repulsion_at(
                    self.positions[i],
                    self.params.theta,
                    self.params.repulsion,
                    MIN_DISTANCE,
                );
                self.forces[i] += force * self.masses[i];
            }
        } else {
            for i in 0..n {
                for j in (i + 1)..n {
                    let delta = self.positions[i] - self.positions[j];
                    let dist_sq = delta.length_sq().max(MIN_DISTANCE * MIN_DISTANCE);
                    let magnitude =
                        self.params.repulsion * self.masses[i] * self.masses[j] / dist_sq;
                    let push = delta.normalized_or_zero() * magnitude;
                    self.forces[i] += push;
                    self.forces[j] += push * -1.0;
                }
            }
        }

        // Spring attraction along each edge toward the rest length.
        for edge in &self.edges {
            let delta = self.positions[edge.b] - self.positions[edge.a];
            let dist = delta.length();
            if dist <= MIN_DISTANCE {
                continue;
            }
            let stretch = dist - self.params.rest_length;
            let pull = delta.normalized_or_zero() * (self.params.spring * stretch * edge.weight);
            self.forces[edge.a] += pull;
            self.forces[edge.b] += pull * -1.0;
        }

        // Gravity toward the origin prevents drift.
        for i in 0..n {
            self.forces[i] += self.positions[i] * -self.params.gravity;
        }
    }

    fn integrate(&mut self) {
        let dt = self.params.dt;
        for i in 0..self.positions.len() {
            let velocity = ((self.velocities[i] + self.forces[i] * dt) * self.params.damping)
                .clamped(self.params.max_velocity);
            self.velocities[i] = velocity;
            self.positions[i] += velocity * dt;
        }
    }
}

/// Run a snapshot to convergence without constructing an engine by hand.
/// Used by worker backends; the same step logic runs inline or off-thread.
pub fn simulate(
    snapshot: LayoutSnapshot,
    params: ForceParams,
    max_iterations: u64,
    mut on_progress: impl FnMut(u64, &[Vec2]),
) -> (Vec<Vec2>, u64) {
    let mut engine = LayoutEngine::new(params);
    engine.set_graph(snapshot);
    engine.start();

    let mut iterations = 0;
    while iterations < max_iterations && engine.step() == LayoutPhase::Running {
        iterations += 1;
        if iterations % 50 == 0 {
            on_progress(iterations, engine.positions());
        }
    }
    (engine.positions().to_vec(), iterations)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The fixed 5-node/4-edge star used across stability tests.
    pub(crate) fn star_snapshot() -> LayoutSnapshot {
        LayoutSnapshot {
            nodes: (0..5)
                .map(|i| LayoutNode {
                    id: format!("n{i}"),
                    size: 4.0,
                    position: None,
                })
                .collect(),
            edges: (1..5)
                .map(|i| LayoutEdgeSpec {
                    a: 0,
                    b: i,
                    weight: 1.0,
                })
                .collect(),
        }
    }

    #[test]
    fn seeded_star_reaches_stable_within_bound() {
        let mut engine = LayoutEngine::new(ForceParams::default());
        engine.set_graph(star_snapshot());
        engine.start();

        let mut phase = LayoutPhase::Running;
        for _ in 0..20_000 {
            phase = engine.step();
            if phase == LayoutPhase::Stable {
                break;
            }
        }
        assert_eq!(phase, LayoutPhase::Stable);

        // After stability, stepping is halted and positions stop moving.
        let before: Vec<Vec2> = engine.positions().to_vec();
        engine.step();
        assert_eq!(engine.positions(), before.as_slice());
    }

    #[test]
    fn same_seed_gives_same_layout() {
        let run = || {
            let mut engine = LayoutEngine::new(ForceParams::default());
            engine.set_graph(star_snapshot());
            engine.start();
            engine.run(500);
            engine.positions().to_vec()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn phase_machine_transitions() {
        let mut engine = LayoutEngine::new(ForceParams::default());
        engine.set_graph(star_snapshot());
        assert_eq!(engine.phase(), LayoutPhase::Idle);

        engine.start();
        assert_eq!(engine.phase(), LayoutPhase::Running);
        engine.pause();
        assert_eq!(engine.phase(), LayoutPhase::Paused);
        assert_eq!(engine.step(), LayoutPhase::Paused);
        engine.resume();
        assert_eq!(engine.phase(), LayoutPhase::Running);
        engine.stop();
        assert_eq!(engine.phase(), LayoutPhase::Stopped);
        engine.start();
        assert_eq!(engine.phase(), LayoutPhase::Running);
    }

    #[test]
    fn coincident_nodes_are_perturbed() {
        let snapshot = LayoutSnapshot {
            nodes: (0..2)
                .map(|i| LayoutNode {
                    id: format!("n{i}"),
                    size: 4.0,
                    position: Some(Vec2::new(5.0, 5.0)),
                })
                .collect(),
            edges: Vec::new(),
        };
        let mut engine = LayoutEngine::new(ForceParams::default());
        engine.set_graph(snapshot);
        engine.start();
        engine.step();
        let a = engine.position_of(0).unwrap();
        let b = engine.position_of(1).unwrap();
        assert!(a.distance(b) > 0.0);
        assert!(a.x.is_finite() && b.x.is_finite());
    }

    #[test]
    fn isolated_node_feels_gravity() {
        let snapshot = LayoutSnapshot {
            nodes: vec![LayoutNode {
                id: "lonely".into(),
                size: 4.0,
                position: Some(Vec2::new(200.0, 0.0)),
            }],
            edges: Vec::new(),
        };
        let mut engine = LayoutEngine::new(ForceParams::default());
        engine.set_graph(snapshot);
        engine.start();
        engine.run(100);
        // Gravity pulls the lone node toward the origin.
        assert!(engine.position_of(0).unwrap().x < 200.0);
    }

    #[test]
    fn cache_hit_skips_resimulation() {
        let mut engine = LayoutEngine::new(ForceParams::default());
        engine.set_graph(star_snapshot());
        engine.start();
        for _ in 0..20_000 {
            if engine.step() == LayoutPhase::Stable {
                break;
            }
        }
        assert_eq!(engine.phase(), LayoutPhase::Stable);
        let converged = engine.positions().to_vec();

        engine.set_graph(star_snapshot());
        assert_eq!(engine.phase(), LayoutPhase::Stable);
        assert_eq!(engine.positions(), converged.as_slice());
    }

    #[test]
    fn self_loops_filtered_from_snapshot() {
        let mut snapshot = star_snapshot();
        snapshot.edges.push(LayoutEdgeSpec {
            a: 2,
            b: 2,
            weight: 1.0,
        });
        let mut engine = LayoutEngine::new(ForceParams::default());
        engine.set_graph(snapshot);
        assert_eq!(engine.edges().len(), 4);
    }
}
