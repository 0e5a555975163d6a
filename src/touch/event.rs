/// Identifier shared by a widget and its renderer element
pub type ElementId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Down,
    Drag,
    Up,
}

/// A calibrated touch sample in display coordinates
///
/// `target` is filled in by the router; widgets ignore events that are not
/// addressed to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub finger_id: i32,
    pub x: i32,
    pub y: i32,
    pub phase: TouchPhase,
    pub target: Option<ElementId>,
}

impl TouchEvent {
    pub fn new(finger_id: i32, x: i32, y: i32, phase: TouchPhase) -> Self {
        Self {
            finger_id,
            x,
            y,
            phase,
            target: None,
        }
    }

    pub fn is_for(&self, uid: ElementId) -> bool {
        self.target == Some(uid)
    }
}
