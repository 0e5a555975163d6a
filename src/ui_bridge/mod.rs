//! Renderer bridge
//!
//! Two independent rings to the external renderer process:
//!
//! ```text
//!              UiCommand (104 B)
//! UiBridge ──► /dev/shm/tauwerk_ui_commands ──► renderer
//! UiBridge ◄── /dev/shm/tauwerk_ui_events   ◄── renderer
//!              UiEvent (16 B)
//! ```

pub mod channel;
pub mod command;
pub mod event;

pub use channel::UiBridge;
pub use command::{CommandOp, ElementKind, FaderSpec, UiCommand};
pub use event::{UiEvent, UiEventKind};
