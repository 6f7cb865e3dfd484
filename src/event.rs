//! The abstract controller event model shared by event producers and consumers.

pub use handheld_input_parser::controller::{Axis, Button, TimestampSource};

/// Logical rumble channel. Only one exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RumbleCode {
    Main,
}

/// A rumble effect with both motor magnitudes normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rumble {
    pub code: RumbleCode,
    pub weak_magnitude: f64,
    pub strong_magnitude: f64,
}

impl Rumble {
    pub fn stop() -> Self {
        Self {
            code: RumbleCode::Main,
            weak_magnitude: 0.0,
            strong_magnitude: 0.0,
        }
    }

    /// Normalizes raw 16-bit motor magnitudes.
    pub fn from_raw(weak: u16, strong: u16) -> Self {
        Self {
            code: RumbleCode::Main,
            weak_magnitude: f64::from(weak) / f64::from(u16::MAX),
            strong_magnitude: f64::from(strong) / f64::from(u16::MAX),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// Normalized axis value, e.g. `[-1, 1]` for sticks and `[0, 1]` for triggers.
    Axis { code: Axis, value: f64 },
    Button { code: Button, value: bool },
    Rumble(Rumble),
    /// Sensor timestamp in nanoseconds.
    Timestamp { code: TimestampSource, value: i64 },
}
