//! Engine event stream primitives.

use serde::{Deserialize, Serialize};

use crate::ViewportState;

/// Events emitted by the engine for consumers (UI surfaces, tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GraphEvent {
    /// A node entered the graph.
    NodeAdded { id: String },
    /// An edge entered the graph.
    EdgeAdded { id: String },
    /// A node was clicked (no drag occurred).
    NodeClick { id: String, label: String },
    /// The pointer entered or left a node; `entered == false` restores
    /// full visibility.
    NodeHover { id: String, entered: bool },
    /// An edge was clicked.
    EdgeClick { id: String },
    /// The layout simulation started running.
    LayoutStarted,
    /// The layout simulation was stopped before converging.
    LayoutStopped,
    /// The layout reached the stable state.
    LayoutCompleted { iterations: u64 },
    /// A node drag began.
    DragStart { id: String },
    /// The dragged node followed the pointer.
    DragMove { id: String },
    /// A node drag ended.
    DragEnd { id: String },
    /// The camera moved or zoomed.
    CameraUpdate { viewport: ViewportState },
    /// The adaptive quality level changed.
    PerformanceModeChanged { mode: String },
}

/// In-memory append-only log of engine events.
#[derive(Default, Debug)]
pub struct EventLog {
    events: Vec<GraphEvent>,
}

impl EventLog {
    /// Append a new event to the log.
    pub fn append(&mut self, event: GraphEvent) {
        self.events.push(event);
    }

    /// Iterate over events in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &GraphEvent> {
        self.events.iter()
    }

    /// Inspect the current number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop all recorded events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut log = EventLog::default();
        log.append(GraphEvent::LayoutStarted);
        log.append(GraphEvent::LayoutCompleted { iterations: 42 });
        assert_eq!(log.len(), 2);
        assert!(matches!(
            log.iter().next(),
            Some(GraphEvent::LayoutStarted)
        ));
    }
}
