//! Shared memory transport
//!
//! Fixed-slot ring buffers mapped onto `/dev/shm` regions shared with the
//! external GPIO driver and the renderer process:
//!
//! 1. [`region`] - mmap'd file region with typed word/byte access
//! 2. [`ring_buffer`] - single-producer/single-consumer slot ring
//! 3. [`codec`] - native-endian field helpers for fixed-layout records
//!
//! # Layout
//!
//! ```text
//! ┌────────┬────────┬─────┬──────────┬───────────────────────────────┐
//! │ slot 0 │ slot 1 │ ... │ slot N-1 │ write │ read │ sentinel │ -  │
//! └────────┴────────┴─────┴──────────┴───────────────────────────────┘
//!                                      control block (4 × u32)
//! ```

pub mod codec;
pub mod region;
pub mod ring_buffer;

pub use codec::DecodeError;
pub use region::{ChannelError, SharedRegion};
pub use ring_buffer::RingBufferChannel;
