//! Short versus long press classification for power buttons that report both press and
//! release.

use std::time::{Duration, Instant};

use handheld_input_parser::codes::{EV_KEY, KEY_POWER};

use crate::osdev::RawEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    Short,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Pressed(Instant),
}

#[derive(Debug)]
pub struct PressClassifier {
    threshold: Duration,
    state: State,
}

impl PressClassifier {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            state: State::Idle,
        }
    }

    #[cfg(test)]
    pub fn is_pressed(&self) -> bool {
        matches!(self.state, State::Pressed(_))
    }

    /// How long the next wait may block, at most `poll`. While a press is pending it is cut
    /// short to end when the press becomes a long press.
    pub fn next_timeout(&self, now: Instant, poll: Duration) -> Duration {
        match self.state {
            State::Idle => poll,
            State::Pressed(start) => self
                .threshold
                .saturating_sub(now.duration_since(start))
                .min(poll),
        }
    }

    pub fn on_event(&mut self, ev: &RawEvent, now: Instant) -> Option<Press> {
        if ev.event_type != EV_KEY || ev.code != KEY_POWER {
            return None;
        }
        match (ev.value, self.state) {
            (1, State::Idle) => {
                log::debug!("power button pressed");
                self.state = State::Pressed(now);
                None
            }
            (1, State::Pressed(start)) => {
                log::error!(
                    "power button pressed again while pressed for {}ms, keeping the first press",
                    now.duration_since(start).as_millis()
                );
                None
            }
            (0, State::Pressed(start)) => {
                self.state = State::Idle;
                let held = now.duration_since(start);
                log::debug!("power button released after {}ms", held.as_millis());
                Some(match held >= self.threshold {
                    true => Press::Long,
                    false => Press::Short,
                })
            }
            (0, State::Idle) => {
                log::warn!("power button released without a press");
                None
            }
            // auto-repeat
            _ => None,
        }
    }

    /// Reports a long press once the button has been held past the threshold, without waiting
    /// for the release.
    pub fn on_timeout(&mut self, now: Instant) -> Option<Press> {
        match self.state {
            State::Pressed(start) if now.duration_since(start) >= self.threshold => {
                self.state = State::Idle;
                Some(Press::Long)
            }
            _ => None,
        }
    }
}
