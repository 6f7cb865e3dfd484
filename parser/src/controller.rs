//! Closed enumerations of the abstract controller model and the axis mapping entry.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    LsX,
    LsY,
    RsX,
    RsY,
    Lt,
    Rt,
    HatX,
    HatY,
    AccelX,
    AccelY,
    AccelZ,
    GyroX,
    GyroY,
    GyroZ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    A,
    B,
    X,
    Y,
    Lb,
    Rb,
    Lt,
    Rt,
    Ls,
    Rs,
    Select,
    Start,
    Mode,
    Share,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    ExtraL1,
    ExtraR1,
    ExtraL2,
    ExtraR2,
}

/// Sensors that carry their own hardware timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampSource {
    AccelTs,
    GyroTs,
}

/// How one abstract axis lands on one device axis.
///
/// The device value is `clamp(round(value * scale + offset), low, high)`. Bounds are applied
/// low first, then high.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMapping {
    pub target: u16,
    pub scale: f64,
    pub offset: f64,
    pub bounds: Option<(i64, i64)>,
}

impl AxisMapping {
    pub fn new(target: u16, scale: f64, offset: f64, bounds: Option<(i64, i64)>) -> Self {
        Self {
            target,
            scale,
            offset,
            bounds,
        }
    }

    pub fn apply(&self, value: f64) -> i64 {
        // `as` saturates on overflow and maps NaN to 0.
        let mapped = (value * self.scale + self.offset).round() as i64;
        match self.bounds {
            Some((low, high)) => mapped.max(low).min(high),
            None => mapped,
        }
    }
}
