//! On-screen controls driven by routed touches
//!
//! ```text
//! TouchEvent ─► WidgetRegistry ─► TouchRouter (who owns the finger?)
//!                    │
//!                    └─► ButtonWidget / ToggleWidget / FaderWidget ─► WidgetEvent
//! ```
//!
//! The renderer draws; these types only keep interaction state.

pub mod button;
pub mod element;
pub mod event;
pub mod fader;
pub mod geometry;
pub mod registry;

pub use element::{ElementSpec, WidgetError};
pub use event::WidgetEvent;
pub use fader::{FaderMode, FaderWidget};
pub use geometry::{PanelSize, Rect};
pub use registry::{Widget, WidgetRegistry};
