//! Core domain types shared across the entire notegraph workspace.
//!
//! The graph is modeled as an arena: nodes and edges live in flat maps keyed
//! by stable string ids. Nodes never hold references to other nodes; all
//! cross-references go through ids, which keeps serialization trivial and
//! avoids ownership cycles.

mod events;
mod export;
mod graph;

pub use events::{EventLog, GraphEvent};
pub use export::{GraphExport, ImportStats};
pub use graph::{
    ContentStats, EdgeKind, EdgeMetadata, GraphData, GraphEdge, GraphError, GraphNode,
    NodeKind, NodeMetadata,
};

use serde::{Deserialize, Serialize};

/// A 2D position or force vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    /// Unit vector in the same direction, or zero for a (near-)zero vector.
    pub fn normalized_or_zero(self) -> Vec2 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    /// Clamp the magnitude to `max`, preserving direction.
    pub fn clamped(self, max: f32) -> Vec2 {
        let len = self.length();
        if len > max && len > 0.0 {
            self * (max / len)
        } else {
            self
        }
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Camera state for the rendering surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ViewportState {
    /// Camera center X in graph space.
    pub x: f32,
    /// Camera center Y in graph space.
    pub y: f32,
    /// Zoom ratio; 1.0 = one graph unit per pixel.
    pub zoom: f32,
    /// Viewport width in pixels.
    pub width: f32,
    /// Viewport height in pixels.
    pub height: f32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl ViewportState {
    /// Half-extent of the visible area in graph space.
    pub fn half_extent(&self) -> Vec2 {
        let zoom = self.zoom.max(f32::EPSILON);
        Vec2::new(self.width / (2.0 * zoom), self.height / (2.0 * zoom))
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}
