use serde::Serialize;

use crate::touch::event::ElementId;

/// What a widget reports back after handling a touch or a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum WidgetEvent {
    Clicked { uid: ElementId },
    Released { uid: ElementId },
    Toggled { uid: ElementId, on: bool },
    FaderChanged { uid: ElementId, value: f32 },
}

impl WidgetEvent {
    pub fn uid(&self) -> ElementId {
        match self {
            WidgetEvent::Clicked { uid }
            | WidgetEvent::Released { uid }
            | WidgetEvent::Toggled { uid, .. }
            | WidgetEvent::FaderChanged { uid, .. } => *uid,
        }
    }
}
