//! Force-directed layout for note graphs.
//!
//! The simulation combines spring attraction along edges, inverse-square
//! repulsion between all nodes (Barnes-Hut approximated past a size
//! threshold), and a weak pull toward the origin. Convergence is detected
//! by watching the variance of a positional energy metric; converged
//! layouts are cached by graph shape and physics parameters.
//!
//! Interactive concerns live alongside the simulation: [`DragSimulation`]
//! runs a bounded spring network while a node is dragged, and
//! [`LayoutBackend`] moves whole-graph computation off the caller's thread.

mod cache;
mod drag;
mod params;
mod quadtree;
mod sim;
mod stability;
mod worker;

pub use cache::{LayoutCache, LayoutKey};
pub use drag::{DragConfig, DragSimulation};
pub use params::ForceParams;
pub use quadtree::QuadTree;
pub use sim::{
    simulate, LayoutEdgeSpec, LayoutEngine, LayoutNode, LayoutPhase, LayoutSnapshot,
};
pub use stability::StabilityTracker;
pub use worker::{InlineBackend, LayoutBackend, LayoutRequest, LayoutResponse, ThreadBackend};
