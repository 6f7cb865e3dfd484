use handheld_input_parser::cfg::HoldEvent;

use crate::osdev::RawEvent;

/// Matches the stream of a hold device against the event sequence it emits for a long press.
#[derive(Debug, Clone)]
pub struct HoldSequence {
    events: Vec<HoldEvent>,
    cursor: usize,
}

impl HoldSequence {
    /// `events` must not be empty.
    pub fn new(events: Vec<HoldEvent>) -> Self {
        debug_assert!(!events.is_empty());
        Self { events, cursor: 0 }
    }

    /// Advances on a match and starts over on a mismatch. Returns true when `ev` completes the
    /// sequence.
    pub fn feed(&mut self, ev: &RawEvent) -> bool {
        let Some(expected) = self.events.get(self.cursor) else {
            self.cursor = 0;
            return false;
        };
        if !expected.matches(ev.event_type, ev.code, ev.value) {
            if self.cursor > 0 {
                log::trace!("hold sequence mismatch at {}: {ev:?}", self.cursor);
            }
            self.cursor = 0;
            return false;
        }
        self.cursor += 1;
        if self.cursor == self.events.len() {
            self.cursor = 0;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handheld_input_parser::codes::*;

    fn ev(code: u16) -> RawEvent {
        RawEvent::new(EV_KEY, code, 1)
    }

    fn seq(codes: &[u16]) -> HoldSequence {
        HoldSequence::new(
            codes
                .iter()
                .map(|&code| HoldEvent {
                    event_type: EV_KEY,
                    code,
                    value: 1,
                })
                .collect(),
        )
    }

    fn triggers(s: &mut HoldSequence, codes: &[u16]) -> usize {
        codes.iter().filter(|&&c| s.feed(&ev(c))).count()
    }

    #[test]
    fn full_sequence_triggers_once() {
        let mut s = seq(&[KEY_A, KEY_B]);
        assert!(!s.feed(&ev(KEY_A)));
        assert!(s.feed(&ev(KEY_B)));
        // reset after completion
        assert!(!s.feed(&ev(KEY_B)));
    }

    #[test]
    fn mismatch_restarts_matching() {
        let mut s = seq(&[KEY_A, KEY_B]);
        assert_eq!(triggers(&mut s, &[KEY_A, KEY_C, KEY_A, KEY_B]), 1);
    }

    #[test]
    fn repeated_sequences_trigger_each_time() {
        let mut s = seq(&[KEY_A, KEY_B]);
        assert_eq!(triggers(&mut s, &[KEY_A, KEY_B, KEY_A, KEY_B]), 2);
    }

    #[test]
    fn value_must_match() {
        let mut s = seq(&[KEY_A]);
        assert!(!s.feed(&RawEvent::new(EV_KEY, KEY_A, 0)));
        assert!(s.feed(&RawEvent::new(EV_KEY, KEY_A, 1)));
    }
}
