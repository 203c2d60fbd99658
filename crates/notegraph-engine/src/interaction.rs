//! Pointer interaction state machine.
//!
//! Translates raw pointer events into drag/click/hover semantics. The
//! controller owns no graph or layout state; it emits [`InteractionOutcome`]
//! values the engine applies (pausing layout, starting drag physics,
//! emitting events).

use notegraph_core::Vec2;

/// Interaction tuning.
#[derive(Debug, Clone, Copy)]
pub struct InteractionConfig {
    /// Pointer travel (screen px) below which a press-release counts as a
    /// click rather than a drag.
    pub drag_threshold_px: f32,
    /// Delay after a drag ends before the paused layout resumes.
    pub resume_cooldown_ms: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            drag_threshold_px: 4.0,
            resume_cooldown_ms: 300,
        }
    }
}

/// What the engine should do in response to a pointer event.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutcome {
    /// Begin drag physics for the node; layout pauses, camera pan disables.
    DragStarted { id: String },
    /// Move the dragged node to the pointer (graph-space position).
    DragMoved { id: String, position: Vec2 },
    /// Drag finished; camera re-enables, layout resumes after cooldown.
    DragEnded { id: String },
    /// Press and release without crossing the drag threshold.
    Clicked { id: String },
    /// Hover target changed; `None` restores full visibility.
    HoverChanged { id: Option<String> },
}

#[derive(Debug)]
struct PressState {
    node: Option<String>,
    start: Vec2,
    dragging: bool,
}

/// Tracks one pointer through press/move/release cycles plus hover.
#[derive(Debug, Default)]
pub struct InteractionController {
    config: InteractionConfig,
    press: Option<PressState>,
    hover: Option<String>,
    /// Set when a drag ends while the layout was running; the engine polls
    /// it each tick and resumes once the deadline passes.
    resume_deadline: Option<u64>,
}

impl InteractionController {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            press: None,
            hover: None,
            resume_deadline: None,
        }
    }

    pub fn config(&self) -> InteractionConfig {
        self.config
    }

    /// Camera pan/zoom is disabled from the moment the pointer goes down on
    /// a node, not just once a drag is underway.
    pub fn camera_enabled(&self) -> bool {
        !self.press.as_ref().is_some_and(|p| p.node.is_some())
    }

    pub fn dragged_node(&self) -> Option<&str> {
        self.press
            .as_ref()
            .filter(|p| p.dragging)
            .and_then(|p| p.node.as_deref())
    }

    pub fn hovered_node(&self) -> Option<&str> {
        self.hover.as_deref()
    }

    /// Pointer pressed; `hit` is the node under the cursor, if any.
    pub fn pointer_down(&mut self, hit: Option<&str>, position: Vec2) {
        self.press = Some(PressState {
            node: hit.map(str::to_owned),
            start: position,
            dragging: false,
        });
    }

    /// Pointer moved while possibly pressed.
    pub fn pointer_move(&mut self, position: Vec2) -> Option<InteractionOutcome> {
        let press = self.press.as_mut()?;
        let id = press.node.clone()?;

        if !press.dragging {
            if press.start.distance(position) < self.config.drag_threshold_px {
                return None;
            }
            // Threshold crossed: this press is a drag, not a click.
            press.dragging = true;
            return Some(InteractionOutcome::DragStarted { id });
        }

        Some(InteractionOutcome::DragMoved { id, position })
    }

    /// Pointer released. `layout_running` decides whether a resume
    /// cooldown is armed after a drag.
    pub fn pointer_up(&mut self, now_ms: u64, layout_running: bool) -> Option<InteractionOutcome> {
        let press = self.press.take()?;
        let id = press.node?;

        if press.dragging {
            if layout_running {
                self.resume_deadline = Some(now_ms + self.config.resume_cooldown_ms);
            }
            Some(InteractionOutcome::DragEnded { id })
        } else {
            Some(InteractionOutcome::Clicked { id })
        }
    }

    /// Hover target under the cursor changed hit-testing this frame.
    pub fn hover(&mut self, hit: Option<&str>) -> Option<InteractionOutcome> {
        if self.hover.as_deref() == hit {
            return None;
        }
        self.hover = hit.map(str::to_owned);
        Some(InteractionOutcome::HoverChanged {
            id: self.hover.clone(),
        })
    }

    /// True exactly once, when the post-drag cooldown elapses.
    pub fn poll_resume(&mut self, now_ms: u64) -> bool {
        if self.resume_deadline.is_some_and(|at| now_ms >= at) {
            self.resume_deadline = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> InteractionController {
        InteractionController::new(InteractionConfig::default())
    }

    #[test]
    fn small_movement_is_a_click() {
        let mut ctl = controller();
        ctl.pointer_down(Some("a"), Vec2::new(10.0, 10.0));
        assert_eq!(ctl.pointer_move(Vec2::new(11.0, 10.0)), None);
        assert_eq!(
            ctl.pointer_up(0, false),
            Some(InteractionOutcome::Clicked { id: "a".into() })
        );
    }

    #[test]
    fn pressing_a_node_disables_camera_before_any_movement() {
        let mut ctl = controller();
        ctl.pointer_down(Some("a"), Vec2::ZERO);
        assert!(!ctl.camera_enabled());
        ctl.pointer_up(0, false);
        assert!(ctl.camera_enabled());
    }

    #[test]
    fn crossing_threshold_starts_drag_and_suppresses_click() {
        let mut ctl = controller();
        ctl.pointer_down(Some("a"), Vec2::ZERO);

        assert_eq!(
            ctl.pointer_move(Vec2::new(10.0, 0.0)),
            Some(InteractionOutcome::DragStarted { id: "a".into() })
        );
        assert!(!ctl.camera_enabled());
        assert!(matches!(
            ctl.pointer_move(Vec2::new(20.0, 0.0)),
            Some(InteractionOutcome::DragMoved { .. })
        ));
        assert_eq!(
            ctl.pointer_up(1000, true),
            Some(InteractionOutcome::DragEnded { id: "a".into() })
        );
        assert!(ctl.camera_enabled());
    }

    #[test]
    fn resume_fires_once_after_cooldown() {
        let mut ctl = controller();
        ctl.pointer_down(Some("a"), Vec2::ZERO);
        ctl.pointer_move(Vec2::new(10.0, 0.0));
        ctl.pointer_up(1000, true);

        assert!(!ctl.poll_resume(1100));
        assert!(ctl.poll_resume(1300));
        assert!(!ctl.poll_resume(1400));
    }

    #[test]
    fn no_cooldown_when_layout_was_not_running() {
        let mut ctl = controller();
        ctl.pointer_down(Some("a"), Vec2::ZERO);
        ctl.pointer_move(Vec2::new(10.0, 0.0));
        ctl.pointer_up(1000, false);
        assert!(!ctl.poll_resume(10_000));
    }

    #[test]
    fn press_on_empty_space_never_drags_a_node() {
        let mut ctl = controller();
        ctl.pointer_down(None, Vec2::ZERO);
        assert_eq!(ctl.pointer_move(Vec2::new(50.0, 0.0)), None);
        assert!(ctl.camera_enabled());
        assert_eq!(ctl.pointer_up(0, false), None);
    }

    #[test]
    fn hover_change_emits_once() {
        let mut ctl = controller();
        assert!(ctl.hover(Some("a")).is_some());
        assert!(ctl.hover(Some("a")).is_none());
        assert_eq!(
            ctl.hover(None),
            Some(InteractionOutcome::HoverChanged { id: None })
        );
    }
}
