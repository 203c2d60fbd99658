//! Node/edge visual resolution.
//!
//! Maps graph semantics (kind, highlight state, detail tier) to concrete
//! draw attributes. Colors are plain RGBA so any surface can consume them.

use notegraph_core::NodeKind;
use serde::{Deserialize, Serialize};

use crate::lod::DetailLevel;

/// Straight-alpha RGBA color.
pub type Rgba = [u8; 4];

/// Marker geometry per node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeShape {
    Circle,
    Square,
    Diamond,
    Hexagon,
    Dot,
}

/// Highlight state driven by hover/selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmphasisState {
    #[default]
    Normal,
    /// Hovered node or its direct neighbor.
    Highlighted,
    /// Everything else while a hover highlight is active.
    Dimmed,
}

#[derive(Debug, Clone, Copy)]
pub struct NodeRenderContext<'a> {
    pub kind: NodeKind,
    pub size: f32,
    pub zoom: f32,
    pub emphasis: EmphasisState,
    /// Hex override from node data, e.g. `"#ff8800"`.
    pub color_override: Option<&'a str>,
    pub detail: DetailLevel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeVisuals {
    pub shape: NodeShape,
    pub radius: f32,
    pub fill: Rgba,
    pub opacity: f32,
    pub show_label: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeRenderContext {
    pub emphasis: EmphasisState,
    pub detail: DetailLevel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeVisuals {
    pub width: f32,
    pub color: Rgba,
    pub opacity: f32,
}

pub fn resolve_node_visuals(ctx: NodeRenderContext<'_>) -> NodeVisuals {
    // Below Medium detail every node collapses to a dot.
    let shape = if ctx.detail == DetailLevel::Low {
        NodeShape::Dot
    } else {
        node_kind_shape(ctx.kind)
    };

    let radius = (ctx.size * ctx.zoom).clamp(1.5, 24.0);

    let fill = ctx
        .color_override
        .and_then(parse_hex_color)
        .unwrap_or_else(|| node_kind_color(ctx.kind));

    let opacity = match ctx.emphasis {
        EmphasisState::Normal => 1.0,
        EmphasisState::Highlighted => 1.0,
        EmphasisState::Dimmed => 0.25,
    };

    NodeVisuals {
        shape,
        radius: if ctx.emphasis == EmphasisState::Highlighted {
            radius * 1.25
        } else {
            radius
        },
        fill,
        opacity,
        show_label: ctx.detail.show_labels() && ctx.emphasis != EmphasisState::Dimmed,
    }
}

pub fn resolve_edge_visuals(ctx: EdgeRenderContext) -> EdgeVisuals {
    let (width, color, opacity) = match ctx.emphasis {
        EmphasisState::Highlighted => (ctx.detail.edge_width() * 2.5, [0, 212, 255, 255], 1.0),
        EmphasisState::Normal => (ctx.detail.edge_width(), [100, 100, 120, 80], 1.0),
        EmphasisState::Dimmed => (ctx.detail.edge_width(), [100, 100, 120, 80], 0.15),
    };
    EdgeVisuals {
        width,
        color,
        opacity,
    }
}

fn node_kind_shape(kind: NodeKind) -> NodeShape {
    match kind {
        NodeKind::File => NodeShape::Circle,
        NodeKind::Folder => NodeShape::Square,
        NodeKind::Phantom => NodeShape::Dot,
        NodeKind::Tag => NodeShape::Diamond,
        NodeKind::Link => NodeShape::Hexagon,
    }
}

fn node_kind_color(kind: NodeKind) -> Rgba {
    match kind {
        NodeKind::File => [0, 150, 200, 255],
        NodeKind::Folder => [50, 180, 50, 255],
        NodeKind::Phantom => [130, 130, 140, 255],
        NodeKind::Tag => [200, 130, 0, 255],
        NodeKind::Link => [150, 100, 200, 255],
    }
}

fn parse_hex_color(hex: &str) -> Option<Rgba> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    Some([
        (value >> 16) as u8,
        (value >> 8) as u8,
        value as u8,
        255,
    ])
}
