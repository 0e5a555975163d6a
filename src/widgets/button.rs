use std::collections::BTreeSet;

use super::element::{ButtonElement, ToggleElement};
use super::event::WidgetEvent;
use super::geometry::Rect;
use crate::touch::event::{ElementId, TouchEvent, TouchPhase};

/// Momentary button. Pressed while any finger that went down on it is still
/// on the glass.
#[derive(Debug, Clone)]
pub struct ButtonWidget {
    uid: ElementId,
    rect: Rect,
    fingers: BTreeSet<i32>,
}

impl ButtonWidget {
    pub fn from_element(element: &ButtonElement) -> Self {
        Self {
            uid: element.id,
            rect: element.rect(),
            fingers: BTreeSet::new(),
        }
    }

    pub fn uid(&self) -> ElementId {
        self.uid
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_pressed(&self) -> bool {
        !self.fingers.is_empty()
    }

    pub fn handle_touch(&mut self, event: &TouchEvent) -> Option<WidgetEvent> {
        if !event.is_for(self.uid) {
            return None;
        }

        let was_pressed = self.is_pressed();
        match event.phase {
            TouchPhase::Down => {
                self.fingers.insert(event.finger_id);
            }
            TouchPhase::Up => {
                self.fingers.remove(&event.finger_id);
            }
            TouchPhase::Drag => {}
        }

        match (was_pressed, self.is_pressed()) {
            (false, true) => Some(WidgetEvent::Clicked { uid: self.uid }),
            (true, false) => Some(WidgetEvent::Released { uid: self.uid }),
            _ => None,
        }
    }
}

/// Latching button; every new press flips it
#[derive(Debug, Clone)]
pub struct ToggleWidget {
    button: ButtonWidget,
    on: bool,
}

impl ToggleWidget {
    pub fn from_element(element: &ToggleElement) -> Self {
        Self {
            button: ButtonWidget {
                uid: element.id,
                rect: element.rect(),
                fingers: BTreeSet::new(),
            },
            on: element.on,
        }
    }

    pub fn uid(&self) -> ElementId {
        self.button.uid
    }

    pub fn rect(&self) -> Rect {
        self.button.rect
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn set_on(&mut self, on: bool) {
        self.on = on;
    }

    pub fn handle_touch(&mut self, event: &TouchEvent) -> Option<WidgetEvent> {
        match self.button.handle_touch(event)? {
            WidgetEvent::Clicked { uid } => {
                self.on = !self.on;
                Some(WidgetEvent::Toggled { uid, on: self.on })
            }
            _ => None,
        }
    }
}
