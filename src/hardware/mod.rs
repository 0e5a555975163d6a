//! Hardware input from the GPIO driver
//!
//! 1. [`record`] - the driver's fixed 16-byte event record
//! 2. [`source`] - encoders and button groups, one decode function each
//! 3. [`bridge`] - ring consumer and listener fan-out
//!
//! ```text
//! GPIO driver ──► /dev/shm/tauwerk_gpio ──► HardwareEventBridge ──► DomainEvent
//!                 (HardwareEventRecord)      (InputSource::decode)
//! ```

pub mod bridge;
pub mod record;
pub mod source;

pub use bridge::HardwareEventBridge;
pub use source::{ButtonState, DomainEvent, InputSource};
