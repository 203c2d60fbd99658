//! Force-model parameters.

use serde::{Deserialize, Serialize};

/// Configuration for the force simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceParams {
    /// Time step per iteration.
    pub dt: f32,
    /// Velocity damping factor (0-1), applied multiplicatively each step.
    pub damping: f32,
    /// Pairwise repulsion strength (inverse-square falloff).
    pub repulsion: f32,
    /// Spring constant for edge attraction.
    pub spring: f32,
    /// Spring rest length.
    pub rest_length: f32,
    /// Center gravity strength; keeps the graph from drifting.
    pub gravity: f32,
    /// Velocity magnitude cap.
    pub max_velocity: f32,
    /// Barnes-Hut opening criterion (0.5-1.0).
    pub theta: f32,
    /// Node count above which Barnes-Hut approximation kicks in.
    pub barnes_hut_threshold: usize,
    /// Maximum quadtree depth.
    pub max_tree_depth: usize,
    /// Seed for initial placement and jitter.
    pub seed: u64,
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            dt: 0.016,
            damping: 0.85,       // Slightly lower for smoother convergence
            repulsion: 5000.0,   // Pushes unconnected nodes apart
            spring: 0.05,        // Pulls linked notes together into clusters
            rest_length: 100.0,  // Larger rest length for clearer separation
            gravity: 0.3,        // Non-zero to keep the graph centered
            max_velocity: 120.0,
            theta: 0.8,
            barnes_hut_threshold: 128,
            max_tree_depth: 12,
            seed: 0x6e6f7465, // "note"
        }
    }
}

impl ForceParams {
    /// Clamp every field to a safe range. Persisted settings run through
    /// this before use.
    pub fn clamped(mut self) -> Self {
        self.dt = self.dt.clamp(0.001, 0.1);
        self.damping = self.damping.clamp(0.1, 0.99);
        self.repulsion = self.repulsion.clamp(0.0, 100_000.0);
        self.spring = self.spring.clamp(0.0, 10.0);
        self.rest_length = self.rest_length.clamp(1.0, 2_000.0);
        self.gravity = self.gravity.clamp(0.0, 10.0);
        self.max_velocity = self.max_velocity.clamp(1.0, 10_000.0);
        self.theta = self.theta.clamp(0.1, 2.0);
        self.max_tree_depth = self.max_tree_depth.clamp(4, 24);
        self
    }

    /// Fields that affect the simulation outcome, for cache keying.
    pub(crate) fn cache_fields(&self) -> [f32; 7] {
        [
            self.dt,
            self.damping,
            self.repulsion,
            self.spring,
            self.rest_length,
            self.gravity,
            self.max_velocity,
        ]
    }
}
