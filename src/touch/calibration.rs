use serde::{Deserialize, Serialize};

use crate::widgets::geometry::PanelSize;

/// Linear mapping from raw panel coordinates into display pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub raw_x_min: i32,
    pub raw_x_max: i32,
    pub raw_y_min: i32,
    pub raw_y_max: i32,
    pub display_width: i32,
    pub display_height: i32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            raw_x_min: 5,
            raw_x_max: 792,
            raw_y_min: 10,
            raw_y_max: 468,
            display_width: 800,
            display_height: 480,
        }
    }
}

impl Calibration {
    pub fn panel(&self) -> PanelSize {
        PanelSize {
            width: self.display_width,
            height: self.display_height,
        }
    }

    /// Display coordinates, always inside the panel
    pub fn map(&self, raw_x: i32, raw_y: i32) -> (i32, i32) {
        let x = scale(raw_x, self.raw_x_min, self.raw_x_max, self.display_width);
        let y = scale(raw_y, self.raw_y_min, self.raw_y_max, self.display_height);
        (
            x.clamp(0, self.display_width.saturating_sub(1).max(0)),
            y.clamp(0, self.display_height.saturating_sub(1).max(0)),
        )
    }
}

// A collapsed raw range leaves the value unscaled. Device values can be
// anything, so the arithmetic runs in i64 and the cast back saturates.
fn scale(raw: i32, raw_min: i32, raw_max: i32, dimension: i32) -> i32 {
    let range = i64::from(raw_max) - i64::from(raw_min);
    if range <= 0 {
        return raw;
    }
    let offset = i64::from(raw) - i64::from(raw_min);
    let ratio = offset as f64 / range as f64;
    (ratio * f64::from(dimension)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_raw_bounds_onto_display() {
        let calibration = Calibration::default();
        assert_eq!(calibration.map(5, 10), (0, 0));
        assert_eq!(calibration.map(792, 468), (799, 479));
        // fractional pixels truncate
        assert_eq!(calibration.map(398, 239), (399, 240));
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let calibration = Calibration::default();
        assert_eq!(calibration.map(0, 0), (0, 0));
        assert_eq!(calibration.map(2000, -40), (799, 0));
    }

    #[test]
    fn collapsed_range_passes_raw_through() {
        let calibration = Calibration {
            raw_x_min: 100,
            raw_x_max: 100,
            raw_y_min: 50,
            raw_y_max: 10,
            ..Calibration::default()
        };
        assert_eq!(calibration.map(123, 456), (123, 456));
        assert_eq!(calibration.map(5000, 5000), (799, 479));
    }

    #[test]
    fn extreme_raw_values_stay_on_the_panel() {
        let calibration = Calibration::default();
        assert_eq!(calibration.map(i32::MIN, i32::MAX), (0, 479));
        assert_eq!(calibration.map(i32::MAX, i32::MIN), (799, 0));

        let full_range = Calibration {
            raw_x_min: i32::MIN,
            raw_x_max: i32::MAX,
            raw_y_min: i32::MIN,
            raw_y_max: i32::MAX,
            ..Calibration::default()
        };
        assert_eq!(full_range.map(i32::MIN, i32::MIN), (0, 0));
        assert_eq!(full_range.map(i32::MAX, i32::MAX), (799, 479));
        assert_eq!(full_range.map(0, 0), (400, 240));
    }
}
