//! The running control surface
//!
//! One cooperative loop owns every channel and the widget registry:
//!
//! ```text
//!            ┌──────────── every poll tick ─────────────┐  ┌── every frame ──┐
//! GPIO ring ─► HardwareEventBridge ─┐                   │  │ TouchInput       │
//! UI events ─► UiBridge ────────────┼─► SurfaceEvent ─► listeners ◄─ WidgetRegistry
//!                                   │                      │ advance_all      │
//!                                   └── UPDATE commands ◄──┘ (faders, toggles)
//! ```

pub mod control_loop;
pub mod surface_handle;

use crate::hardware::DomainEvent;
use crate::ui_bridge::UiEvent;
use crate::widgets::WidgetEvent;

pub use control_loop::{ControlLoop, TickReport};
pub use surface_handle::{SurfaceError, SurfaceHandle};

/// Everything the application hears about, in one channel
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Hardware(DomainEvent),
    Ui(UiEvent),
    Widget(WidgetEvent),
}

impl From<DomainEvent> for SurfaceEvent {
    fn from(event: DomainEvent) -> Self {
        SurfaceEvent::Hardware(event)
    }
}

impl From<UiEvent> for SurfaceEvent {
    fn from(event: UiEvent) -> Self {
        SurfaceEvent::Ui(event)
    }
}

impl From<WidgetEvent> for SurfaceEvent {
    fn from(event: WidgetEvent) -> Self {
        SurfaceEvent::Widget(event)
    }
}
