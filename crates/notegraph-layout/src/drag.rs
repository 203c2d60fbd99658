//! Physics-based drag interaction.
//!
//! The dragged node follows the pointer directly; a bounded spring network
//! propagates damped forces to nearby nodes, and edges adjacent to the
//! dragged node are capped so they never stretch past a configured maximum.

use std::collections::{HashMap, VecDeque};

use notegraph_core::Vec2;
use serde::{Deserialize, Serialize};

use crate::sim::LayoutEngine;

/// Tuning for the drag spring network.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DragConfig {
    /// Maximum graph distance (hops) a node may be from the dragged node
    /// and still feel propagated force.
    pub graph_radius: usize,
    /// Maximum Euclidean distance for the same.
    pub euclid_radius: f32,
    /// Spring constant for propagated forces.
    pub spring: f32,
    /// Multiplicative velocity damping per tick.
    pub damping: f32,
    /// Velocity magnitude cap.
    pub max_velocity: f32,
    /// Hard cap on how far an adjacent edge may stretch.
    pub max_stretch: f32,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            graph_radius: 2,
            euclid_radius: 400.0,
            spring: 0.4,
            damping: 0.82,
            max_velocity: 300.0,
            max_stretch: 180.0,
        }
    }
}

/// State for one in-progress drag.
#[derive(Debug)]
pub struct DragSimulation {
    config: DragConfig,
    dragged: usize,
    /// Affected node -> (hops from dragged, rest offset at drag start).
    affected: HashMap<usize, (usize, f32)>,
    /// Direct neighbors of the dragged node, for the stretch cap.
    neighbors: Vec<usize>,
    velocities: HashMap<usize, Vec2>,
}

impl DragSimulation {
    /// Capture the spring network around `dragged` at drag start.
    ///
    /// BFS out to `graph_radius` hops, dropping nodes beyond the Euclidean
    /// radius; the current distance to the dragged node becomes each
    /// spring's rest length.
    pub fn begin(engine: &LayoutEngine, dragged: usize, config: DragConfig) -> Self {
        let adjacency = engine.adjacency();
        let origin = engine.position_of(dragged).unwrap_or_default();

        let mut affected: HashMap<usize, (usize, f32)> = HashMap::new();
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
        queue.push_back((dragged, 0));
        affected.insert(dragged, (0, 0.0));

        while let Some((node, hops)) = queue.pop_front() {
            if hops >= config.graph_radius {
                continue;
            }
            for &next in adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]) {
                if affected.contains_key(&next) {
                    continue;
                }
                let pos = engine.position_of(next).unwrap_or_default();
                if pos.distance(origin) > config.euclid_radius {
                    continue;
                }
                affected.insert(next, (hops + 1, pos.distance(origin)));
                queue.push_back((next, hops + 1));
            }
        }

        // Every edge touching the dragged node gets the cap, whether or not
        // the other endpoint made it into the spring network.
        let neighbors = adjacency.get(dragged).cloned().unwrap_or_default();

        Self {
            config,
            dragged,
            affected,
            neighbors,
            velocities: HashMap::new(),
        }
    }

    pub fn dragged(&self) -> usize {
        self.dragged
    }

    /// Nodes pulled along by this drag, excluding the dragged node itself.
    pub fn affected_count(&self) -> usize {
        self.affected.len().saturating_sub(1)
    }

    /// Advance the drag by one tick: pin the dragged node to the pointer,
    /// propagate damped spring forces, then enforce the stretch cap on
    /// edges touching the dragged node.
    pub fn tick(&mut self, engine: &mut LayoutEngine, pointer: Vec2, dt: f32) {
        engine.set_position(self.dragged, pointer);

        for (&node, &(hops, rest)) in &self.affected {
            if node == self.dragged {
                continue;
            }
            let pos = match engine.position_of(node) {
                Some(pos) => pos,
                None => continue,
            };

            let delta = pointer - pos;
            let dist = delta.length();
            let stretch = dist - rest;
            // Force falls off with graph distance from the dragged node.
            let falloff = 1.0 / (hops as f32).max(1.0);
            let force = delta.normalized_or_zero() * (self.config.spring * stretch * falloff);

            let velocity = self.velocities.entry(node).or_insert(Vec2::ZERO);
            *velocity = ((*velocity + force * dt) * self.config.damping)
                .clamped(self.config.max_velocity);
            engine.set_position(node, pos + *velocity * dt);
        }

        // Distance cap: an edge touching the dragged node never ends a tick
        // stretched past max_stretch.
        for &neighbor in &self.neighbors {
            let pos = match engine.position_of(neighbor) {
                Some(pos) => pos,
                None => continue,
            };
            let delta = pos - pointer;
            let dist = delta.length();
            if dist > self.config.max_stretch {
                let capped = pointer + delta.normalized_or_zero() * self.config.max_stretch;
                engine.set_position(neighbor, capped);
                self.velocities.insert(neighbor, Vec2::ZERO);
            }
        }
    }
}
