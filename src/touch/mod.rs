//! Touch panel input
//!
//! ```text
//! /dev/input/eventN ─► TouchDevice ─► TouchDecoder ─► Calibration ─► TouchEvent
//!   (input_event)       (non-blocking)  (slots, DOWN/DRAG/UP)  (display px)
//! ```
//!
//! Routing the resulting events to elements is [`router::TouchRouter`]'s job.

pub mod calibration;
pub mod device;
pub mod event;
pub mod protocol;
pub mod router;

use tracing::{info, warn};

use crate::config::TouchConfig;
use calibration::Calibration;
use device::{RawInputEvent, TouchDevice, TouchProtocol};
use event::TouchEvent;
use protocol::TouchDecoder;

pub use device::TouchError;
pub use event::{ElementId, TouchPhase};
pub use router::{Ownership, TouchRouter};

/// Device, decoder and calibration for one panel
///
/// When no device could be opened the input stays disabled for the session
/// and [`TouchInput::poll`] returns nothing.
#[derive(Debug)]
pub struct TouchInput {
    device: Option<TouchDevice>,
    decoder: TouchDecoder,
    calibration: Calibration,
}

impl TouchInput {
    pub fn open(config: &TouchConfig) -> Self {
        if !config.enabled {
            info!("Touch input disabled by configuration");
            return Self::disabled(config.calibration);
        }

        match TouchDevice::discover(config) {
            Ok(device) => Self::with_device(device, config.calibration),
            Err(e) => {
                warn!("Touch input disabled: {}", e);
                Self::disabled(config.calibration)
            }
        }
    }

    pub fn with_device(device: TouchDevice, calibration: Calibration) -> Self {
        Self {
            decoder: TouchDecoder::new(device.protocol()),
            device: Some(device),
            calibration,
        }
    }

    pub fn disabled(calibration: Calibration) -> Self {
        Self {
            device: None,
            decoder: TouchDecoder::new(TouchProtocol::MultiTouch),
            calibration,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.device.is_some()
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Reads what the device has queued and decodes it. A read failure
    /// disables touch input for the rest of the session.
    pub fn poll(&mut self) -> Vec<TouchEvent> {
        let Some(device) = self.device.as_mut() else {
            return Vec::new();
        };

        match device.read_events() {
            Ok(raw) => raw.into_iter().flat_map(|e| self.feed(e)).collect(),
            Err(e) => {
                warn!("Touch device {:?} failed, disabling touch input: {}", device.path(), e);
                self.device = None;
                Vec::new()
            }
        }
    }

    /// Decodes one kernel event into calibrated touches
    pub fn feed(&mut self, raw: RawInputEvent) -> Vec<TouchEvent> {
        self.decoder
            .feed(raw)
            .into_iter()
            .map(|touch| {
                let (x, y) = self.calibration.map(touch.raw_x, touch.raw_y);
                TouchEvent::new(touch.finger_id, x, y, touch.phase)
            })
            .collect()
    }
}
