//! Fader interaction
//!
//! Three ways a finger drives the value:
//!
//! - `Jump`: the value follows the finger's position directly
//! - `Incremental`: horizontal movement nudges the value, like a relative knob
//! - `Smooth`: the finger sets a target, [`FaderWidget::advance`] glides there
//!
//! Whatever the mode, the value stays in `[min, max]` and a change smaller
//! than [`CHANGE_DEADBAND`] is not reported.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::element::FaderElement;
use super::event::WidgetEvent;
use super::geometry::{PanelSize, Rect};
use crate::touch::event::{ElementId, TouchEvent, TouchPhase};

pub const CHANGE_DEADBAND: f32 = 0.01;

/// Horizontal movement below this is treated as sensor jitter
pub const JITTER_PX: i32 = 2;

/// Pixels of travel that move an incremental fader by one `step_size`
pub const INCREMENT_TRAVEL_PX: f32 = 50.0;

pub const SMOOTH_MIN_STEP: f32 = 0.1;
pub const SMOOTH_SNAP: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaderMode {
    Jump,
    Incremental,
    #[default]
    Smooth,
}

impl fmt::Display for FaderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaderMode::Jump => "jump",
            FaderMode::Incremental => "incremental",
            FaderMode::Smooth => "smooth",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown fader mode: '{0}'")]
pub struct UnknownFaderMode(pub String);

impl FromStr for FaderMode {
    type Err = UnknownFaderMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jump" => Ok(FaderMode::Jump),
            "incremental" => Ok(FaderMode::Incremental),
            "smooth" => Ok(FaderMode::Smooth),
            other => Err(UnknownFaderMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FaderWidget {
    uid: ElementId,
    rect: Rect,
    overflow_zone: Rect,
    value: f32,
    target_value: f32,
    min: f32,
    max: f32,
    mode: FaderMode,
    step_size: f32,
    smooth_speed: f32,
    // horizontal bounds used for position mapping, inset at panel edges
    virtual_left: i32,
    virtual_right: i32,
    // finger id -> last x seen from that finger, the incremental anchor
    fingers: BTreeMap<i32, i32>,
}

impl FaderWidget {
    /// Builds the widget from a validated element description
    pub fn from_element(element: &FaderElement, panel: PanelSize) -> Self {
        let rect = element.rect();

        let mut virtual_left = rect.x;
        let mut virtual_right = rect.right();
        if rect.x == 0 {
            virtual_left += element.touch_padding;
        }
        if rect.right() >= panel.width {
            virtual_right -= element.touch_padding;
        }

        let value = element.value.clamp(element.min, element.max);
        Self {
            uid: element.id,
            rect,
            overflow_zone: rect.overflow_zone(element.overflow, panel),
            value,
            target_value: value,
            min: element.min,
            max: element.max,
            mode: element.mode,
            step_size: element.step_size,
            smooth_speed: element.smooth_speed,
            virtual_left,
            virtual_right,
            fingers: BTreeMap::new(),
        }
    }

    pub fn uid(&self) -> ElementId {
        self.uid
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Where new touches are picked up; larger than the drawn rect
    pub fn overflow_zone(&self) -> Rect {
        self.overflow_zone
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn target_value(&self) -> f32 {
        self.target_value
    }

    pub fn mode(&self) -> FaderMode {
        self.mode
    }

    pub fn is_touched(&self) -> bool {
        !self.fingers.is_empty()
    }

    pub fn is_settling(&self) -> bool {
        self.mode == FaderMode::Smooth && self.value != self.target_value
    }

    /// Sets value and target without reporting, for values that came from
    /// outside (renderer, application)
    pub fn set_value(&mut self, value: f32) {
        self.value = value.clamp(self.min, self.max);
        self.target_value = self.value;
    }

    pub fn handle_touch(&mut self, event: &TouchEvent) -> Option<WidgetEvent> {
        if !event.is_for(self.uid) {
            return None;
        }

        match event.phase {
            TouchPhase::Down => {
                self.fingers.insert(event.finger_id, event.x);
                match self.mode {
                    FaderMode::Jump => self.apply(self.value_at(event.x)),
                    FaderMode::Smooth => {
                        self.target_value = self.value_at(event.x);
                        None
                    }
                    FaderMode::Incremental => None,
                }
            }
            TouchPhase::Drag => {
                if !self.fingers.contains_key(&event.finger_id) {
                    return None;
                }
                match self.mode {
                    FaderMode::Jump => self.apply(self.value_at(event.x)),
                    FaderMode::Incremental => self.nudge(event.finger_id, event.x),
                    FaderMode::Smooth => {
                        self.target_value = self.value_at(event.x);
                        None
                    }
                }
            }
            TouchPhase::Up => {
                self.fingers.remove(&event.finger_id);
                None
            }
        }
    }

    /// One frame of smooth convergence. Must run every frame, touched or not,
    /// so the fader keeps gliding after the finger lifts.
    pub fn advance(&mut self) -> Option<WidgetEvent> {
        if !self.is_settling() {
            return None;
        }

        let difference = self.target_value - self.value;
        if difference.abs() < SMOOTH_SNAP {
            // Snap exactly, even below the deadband, so the glide terminates
            self.value = self.target_value;
            return (difference.abs() > CHANGE_DEADBAND).then(|| self.changed());
        }

        let mut step = difference * self.smooth_speed;
        if step.abs() < SMOOTH_MIN_STEP {
            step = SMOOTH_MIN_STEP.copysign(difference);
        }
        self.apply(self.value + step)
    }

    fn value_at(&self, x: i32) -> f32 {
        let x = x.clamp(self.rect.x, self.rect.right());
        let fraction = if x <= self.virtual_left {
            0.0
        } else if x >= self.virtual_right {
            1.0
        } else {
            (x - self.virtual_left) as f32 / (self.virtual_right - self.virtual_left) as f32
        };
        self.min + fraction * (self.max - self.min)
    }

    fn nudge(&mut self, finger_id: i32, x: i32) -> Option<WidgetEvent> {
        let last_x = self.fingers.insert(finger_id, x)?;

        // The anchor moves with every sample, so slow creep below the jitter
        // threshold never adds up to a change.
        let delta = x - last_x;
        if delta.abs() < JITTER_PX {
            return None;
        }

        let change = self.step_size * (delta.abs() as f32 / INCREMENT_TRAVEL_PX);
        self.apply(self.value + change.copysign(delta as f32))
    }

    fn apply(&mut self, value: f32) -> Option<WidgetEvent> {
        let value = value.clamp(self.min, self.max);
        if (value - self.value).abs() <= CHANGE_DEADBAND {
            return None;
        }
        self.value = value;
        Some(self.changed())
    }

    fn changed(&self) -> WidgetEvent {
        WidgetEvent::FaderChanged {
            uid: self.uid,
            value: self.value,
        }
    }
}
