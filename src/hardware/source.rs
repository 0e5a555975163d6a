use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use super::record::{HardwareEventRecord, RecordKind};
use crate::config::ControllerConfig;

// Button state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonState {
    Pressed,
    Released,
}

// Typed hardware event handed to listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    Encoder {
        id: String,
        pin_name: String,
        direction: i32,
        cumulative_value: i64,
        tick: i32,
    },
    Button {
        id: String,
        pin_name: String,
        state: ButtonState,
        tick: i32,
    },
}

// Rotary encoder: the driver already resolved the quadrature into a direction
#[derive(Debug, Clone)]
pub struct EncoderSource {
    id: String,
    pins: HashMap<i32, String>,
    value: i64,
}

impl EncoderSource {
    pub fn new(id: impl Into<String>, pin_a: i32, pin_b: i32) -> Self {
        let pins = HashMap::from([(pin_a, "a".to_string()), (pin_b, "b".to_string())]);
        Self::with_pin_map(id, pins)
    }

    pub fn with_pin_map(id: impl Into<String>, pins: HashMap<i32, String>) -> Self {
        Self {
            id: id.into(),
            pins,
            value: 0,
        }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    fn decode(&mut self, record: &HardwareEventRecord) -> Option<DomainEvent> {
        if record.kind != RecordKind::Encoder {
            return None;
        }
        let pin_name = self.pins.get(&record.pin)?.clone();

        self.value += i64::from(record.value);
        Some(DomainEvent::Encoder {
            id: self.id.clone(),
            pin_name,
            direction: record.value,
            cumulative_value: self.value,
            tick: record.timestamp,
        })
    }
}

// Group of named push buttons, reports edges only
#[derive(Debug, Clone)]
pub struct ButtonSource {
    id: String,
    pins: HashMap<i32, String>,
    states: HashMap<i32, ButtonState>,
}

impl ButtonSource {
    pub fn new(id: impl Into<String>, pins: HashMap<i32, String>) -> Self {
        let states = pins.keys().map(|pin| (*pin, ButtonState::Released)).collect();
        Self {
            id: id.into(),
            pins,
            states,
        }
    }

    pub fn state(&self, pin: i32) -> Option<ButtonState> {
        self.states.get(&pin).copied()
    }

    fn decode(&mut self, record: &HardwareEventRecord) -> Option<DomainEvent> {
        if record.kind != RecordKind::Button {
            return None;
        }
        let pin_name = self.pins.get(&record.pin)?;

        let new_state = if record.value == 1 {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        };
        let old_state = self.states.insert(record.pin, new_state);
        if old_state == Some(new_state) {
            debug!(
                "Suppressing repeated {:?} for {}:{}",
                new_state, self.id, pin_name
            );
            return None;
        }

        Some(DomainEvent::Button {
            id: self.id.clone(),
            pin_name: pin_name.clone(),
            state: new_state,
            tick: record.timestamp,
        })
    }
}

/// The closed set of hardware inputs the bridge can decode for
#[derive(Debug, Clone)]
pub enum InputSource {
    Encoder(EncoderSource),
    Buttons(ButtonSource),
}

impl InputSource {
    pub fn id(&self) -> &str {
        match self {
            InputSource::Encoder(source) => &source.id,
            InputSource::Buttons(source) => &source.id,
        }
    }

    /// `None` if the record belongs to another source or changes nothing
    pub fn decode(&mut self, record: &HardwareEventRecord) -> Option<DomainEvent> {
        match self {
            InputSource::Encoder(source) => source.decode(record),
            InputSource::Buttons(source) => source.decode(record),
        }
    }
}

impl From<&ControllerConfig> for InputSource {
    fn from(config: &ControllerConfig) -> Self {
        match config {
            ControllerConfig::Encoder { name, pins } => {
                InputSource::Encoder(EncoderSource::new(format!("{}_encoder", name), pins[0], pins[1]))
            }
            ControllerConfig::Buttons { name, pins } => {
                let by_pin = pins
                    .iter()
                    .map(|(button, pin)| (*pin, button.clone()))
                    .collect();
                InputSource::Buttons(ButtonSource::new(format!("{}_buttons", name), by_pin))
            }
        }
    }
}
