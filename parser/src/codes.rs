//! Linux input event type and code numbers, plus name lookups for the configuration.
//!
//! Only the codes this crate matches on are constants here. Names in the configuration are
//! resolved through the `evdev` tables, so any code the kernel headers name is accepted.

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_REL: u16 = 0x02;
pub const EV_ABS: u16 = 0x03;
pub const EV_MSC: u16 = 0x04;
pub const EV_SW: u16 = 0x05;
pub const EV_LED: u16 = 0x11;
pub const EV_SND: u16 = 0x12;
pub const EV_REP: u16 = 0x14;
pub const EV_FF: u16 = 0x15;
pub const EV_PWR: u16 = 0x16;
pub const EV_FF_STATUS: u16 = 0x17;
pub const EV_UINPUT: u16 = 0x0101;

pub const SYN_REPORT: u16 = 0;

pub const MSC_SCAN: u16 = 0x04;
pub const MSC_TIMESTAMP: u16 = 0x05;

pub const UI_FF_UPLOAD: u16 = 1;
pub const UI_FF_ERASE: u16 = 2;

pub const FF_RUMBLE: u16 = 0x50;
pub const FF_GAIN: u16 = 0x60;
pub const FF_AUTOCENTER: u16 = 0x61;

pub const KEY_A: u16 = 30;
pub const KEY_B: u16 = 48;
pub const KEY_C: u16 = 46;
pub const KEY_D: u16 = 32;
pub const KEY_POWER: u16 = 116;
pub const KEY_LEFTMETA: u16 = 125;

pub const BTN_SOUTH: u16 = 0x130;
pub const BTN_EAST: u16 = 0x131;
pub const BTN_NORTH: u16 = 0x133;
pub const BTN_WEST: u16 = 0x134;
pub const BTN_TL: u16 = 0x136;
pub const BTN_TR: u16 = 0x137;
pub const BTN_SELECT: u16 = 0x13a;
pub const BTN_START: u16 = 0x13b;
pub const BTN_MODE: u16 = 0x13c;
pub const BTN_THUMBL: u16 = 0x13d;
pub const BTN_THUMBR: u16 = 0x13e;
pub const BTN_TRIGGER_HAPPY1: u16 = 0x2c0;
pub const BTN_TRIGGER_HAPPY2: u16 = 0x2c1;
pub const BTN_TRIGGER_HAPPY3: u16 = 0x2c2;
pub const BTN_TRIGGER_HAPPY4: u16 = 0x2c3;

pub const ABS_X: u16 = 0x00;
pub const ABS_Y: u16 = 0x01;
pub const ABS_Z: u16 = 0x02;
pub const ABS_RX: u16 = 0x03;
pub const ABS_RY: u16 = 0x04;
pub const ABS_RZ: u16 = 0x05;
pub const ABS_HAT0X: u16 = 0x10;
pub const ABS_HAT0Y: u16 = 0x11;

/// Largest value a uinput device name may have, in bytes, including the NUL terminator.
pub const UINPUT_MAX_NAME_SIZE: usize = 80;

pub fn str_to_event_type(s: &str) -> Option<u16> {
    Some(match s {
        "EV_SYN" => EV_SYN,
        "EV_KEY" => EV_KEY,
        "EV_REL" => EV_REL,
        "EV_ABS" => EV_ABS,
        "EV_MSC" => EV_MSC,
        "EV_SW" => EV_SW,
        "EV_LED" => EV_LED,
        "EV_SND" => EV_SND,
        "EV_REP" => EV_REP,
        "EV_FF" => EV_FF,
        "EV_PWR" => EV_PWR,
        "EV_FF_STATUS" => EV_FF_STATUS,
        _ => return None,
    })
}

/// Names the kernel headers define as aliases of another key code. `evdev` only knows the
/// canonical name of each code.
fn key_alias(s: &str) -> Option<u16> {
    Some(match s {
        "BTN_A" | "BTN_GAMEPAD" => BTN_SOUTH,
        "BTN_B" => BTN_EAST,
        "BTN_X" => BTN_NORTH,
        "BTN_Y" => BTN_WEST,
        "BTN_MISC" => 0x100,
        "BTN_MOUSE" => 0x110,
        "BTN_JOYSTICK" => 0x120,
        "BTN_DIGI" => 0x140,
        "BTN_WHEEL" => 0x150,
        "BTN_TRIGGER_HAPPY" => BTN_TRIGGER_HAPPY1,
        _ => return None,
    })
}

/// Looks up a named code. The prefix of the name selects the table, so `KEY_*` and `BTN_*` are
/// key codes, `ABS_*` are absolute axes and so on.
pub fn str_to_code(s: &str) -> Option<u16> {
    use evdev::{
        AbsoluteAxisCode, FFEffectCode, FFStatusCode, KeyCode, LedCode, MiscCode, RelativeAxisCode,
        RepeatCode, SoundCode, SwitchCode, SynchronizationCode,
    };

    if let Some(code) = key_alias(s) {
        return Some(code);
    }
    let (prefix, _) = s.split_once('_')?;
    match prefix {
        "KEY" | "BTN" => s.parse::<KeyCode>().ok().map(|c| c.0),
        "ABS" => s.parse::<AbsoluteAxisCode>().ok().map(|c| c.0),
        "REL" => s.parse::<RelativeAxisCode>().ok().map(|c| c.0),
        "MSC" => s.parse::<MiscCode>().ok().map(|c| c.0),
        "SYN" => s.parse::<SynchronizationCode>().ok().map(|c| c.0),
        "SW" => s.parse::<SwitchCode>().ok().map(|c| c.0),
        "LED" => s.parse::<LedCode>().ok().map(|c| c.0),
        "SND" => s.parse::<SoundCode>().ok().map(|c| c.0),
        "REP" => s.parse::<RepeatCode>().ok().map(|c| c.0),
        "FF" => s
            .parse::<FFEffectCode>()
            .map(|c| c.0)
            .or_else(|_| s.parse::<FFStatusCode>().map(|c| c.0))
            .ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_the_same_code() {
        assert_eq!(str_to_code("BTN_A"), str_to_code("BTN_SOUTH"));
        assert_eq!(str_to_code("BTN_Y"), Some(BTN_WEST));
        assert_eq!(str_to_code("BTN_GAMEPAD"), Some(BTN_SOUTH));
        assert_eq!(str_to_event_type("EV_KEY"), Some(EV_KEY));
        assert_eq!(str_to_code("KEY_NOPE"), None);
        assert_eq!(str_to_event_type("EV_UINPUT"), None);
    }

    #[test]
    fn any_kernel_code_name_resolves() {
        assert_eq!(str_to_code("KEY_DELETE"), Some(111));
        assert_eq!(str_to_code("KEY_F13"), Some(183));
        assert_eq!(str_to_code("KEY_VOLUMEUP"), Some(115));
        assert_eq!(str_to_code("BTN_TRIGGER_HAPPY5"), Some(0x2c4));
        assert_eq!(str_to_code("ABS_HAT1X"), Some(0x12));
        assert_eq!(str_to_code("MSC_SCAN"), Some(MSC_SCAN));
        assert_eq!(str_to_code("SYN_REPORT"), Some(SYN_REPORT));
        assert_eq!(str_to_code("FF_RUMBLE"), Some(FF_RUMBLE));
        assert_eq!(str_to_code("SW_LID"), Some(0));
    }

    #[test]
    fn prefix_selects_the_table() {
        assert_eq!(str_to_code("ABS_DELETE"), None);
        assert_eq!(str_to_code("KEY_X"), Some(45));
        assert_eq!(str_to_code("NOPREFIX"), None);
        assert_eq!(str_to_code(""), None);
    }
}
