use serde::{Deserialize, Serialize};

/// Minimum margin of a fader's acquisition zone, in display pixels
pub const MIN_OVERFLOW: i32 = 50;

/// Display-space size of the touch panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSize {
    pub width: i32,
    pub height: i32,
}

impl Default for PanelSize {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Edges count as inside
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.x <= x && x <= self.right() && self.y <= y && y <= self.bottom()
    }

    /// The rect grown by `margin` (at least [`MIN_OVERFLOW`]) on every side
    /// and clipped to the panel
    pub fn overflow_zone(&self, margin: i32, panel: PanelSize) -> Rect {
        let margin = margin.max(MIN_OVERFLOW);
        let left = (self.x - margin).max(0);
        let top = (self.y - margin).max(0);
        let right = (self.right() + margin).min(panel.width);
        let bottom = (self.bottom() + margin).min(panel.height);
        Rect::new(left, top, (right - left).max(0), (bottom - top).max(0))
    }
}
