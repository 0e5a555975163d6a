use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fader::FaderMode;
use super::geometry::Rect;
use crate::touch::event::ElementId;
use crate::ui_bridge::command::{DEFAULT_ELEMENT_COLOR, DEFAULT_LABEL_COLOR};

#[derive(Debug, Error, PartialEq)]
pub enum WidgetError {
    #[error("Element id {0} is already registered")]
    DuplicateId(ElementId),

    #[error("Element {id} is invalid: {reason}")]
    Invalid { id: ElementId, reason: String },

    #[error("No element with id {0}")]
    Unknown(ElementId),
}

/// Configured description of one on-screen element
///
/// Written to `surface.toml` as `[[elements]]` tables, distinguished by
/// `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementSpec {
    Button(ButtonElement),
    Toggle(ToggleElement),
    Fader(FaderElement),
    Label(LabelElement),
}

impl ElementSpec {
    pub fn id(&self) -> ElementId {
        match self {
            ElementSpec::Button(e) => e.id,
            ElementSpec::Toggle(e) => e.id,
            ElementSpec::Fader(e) => e.id,
            ElementSpec::Label(e) => e.id,
        }
    }

    pub fn validate(&self) -> Result<(), WidgetError> {
        let invalid = |reason: &str| {
            Err(WidgetError::Invalid {
                id: self.id(),
                reason: reason.to_string(),
            })
        };

        let rect = match self {
            ElementSpec::Button(e) => e.rect(),
            ElementSpec::Toggle(e) => e.rect(),
            ElementSpec::Fader(e) => e.rect(),
            ElementSpec::Label(_) => return Ok(()),
        };
        if rect.width <= 0 || rect.height <= 0 {
            return invalid("width and height must be positive");
        }

        if let ElementSpec::Fader(fader) = self {
            let numbers = [
                fader.min,
                fader.max,
                fader.value,
                fader.step_size,
                fader.smooth_speed,
            ];
            if numbers.iter().any(|v| !v.is_finite()) {
                return invalid("min, max, value, step_size and smooth_speed must be finite");
            }
            if fader.min >= fader.max {
                return invalid("min must be below max");
            }
            if !(fader.smooth_speed > 0.0 && fader.smooth_speed <= 1.0) {
                return invalid("smooth_speed must be in (0, 1]");
            }
            if fader.step_size <= 0.0 {
                return invalid("step_size must be positive");
            }
            if fader.touch_padding < 0 || i64::from(fader.touch_padding) * 2 >= i64::from(rect.width) {
                return invalid("touch_padding must leave part of the fader usable");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonElement {
    pub id: ElementId,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_element_color")]
    pub color: i32,
}

impl ButtonElement {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleElement {
    pub id: ElementId,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub on: bool,
    #[serde(default = "default_element_color")]
    pub color: i32,
}

impl ToggleElement {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaderElement {
    pub id: ElementId,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub min: f32,
    #[serde(default = "default_fader_max")]
    pub max: f32,
    #[serde(default)]
    pub value: f32,
    #[serde(default)]
    pub mode: FaderMode,
    #[serde(default = "default_step_size")]
    pub step_size: f32,
    #[serde(default = "default_smooth_speed")]
    pub smooth_speed: f32,
    /// Margin of the touch acquisition zone around the fader
    #[serde(default = "default_overflow")]
    pub overflow: i32,
    /// Dead strip at a panel edge, where touch panels report poorly
    #[serde(default)]
    pub touch_padding: i32,
    #[serde(default = "default_element_color")]
    pub color: i32,
}

impl FaderElement {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

impl Default for FaderElement {
    fn default() -> Self {
        Self {
            id: 0,
            x: 0,
            y: 0,
            width: 100,
            height: 40,
            label: String::new(),
            min: 0.0,
            max: default_fader_max(),
            value: 0.0,
            mode: FaderMode::default(),
            step_size: default_step_size(),
            smooth_speed: default_smooth_speed(),
            overflow: default_overflow(),
            touch_padding: 0,
            color: default_element_color(),
        }
    }
}

/// Static text, drawn by the renderer and never touched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelElement {
    pub id: ElementId,
    pub x: i32,
    pub y: i32,
    pub text: String,
    #[serde(default = "default_label_color")]
    pub color: i32,
}

fn default_element_color() -> i32 {
    DEFAULT_ELEMENT_COLOR
}

fn default_label_color() -> i32 {
    DEFAULT_LABEL_COLOR
}

fn default_fader_max() -> f32 {
    100.0
}

fn default_step_size() -> f32 {
    1.0
}

fn default_smooth_speed() -> f32 {
    0.1
}

fn default_overflow() -> i32 {
    50
}
