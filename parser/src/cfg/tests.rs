use super::*;
use crate::controller::{Axis, Button};

use std::path::PathBuf;

fn sample_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../cfg_samples/handheld-input.toml")
}

#[test]
fn parse_sample() {
    let cfg = new_from_file(&sample_path()).unwrap();
    assert_eq!(cfg.power_buttons.len(), 2);
    assert_eq!(cfg.timing, Timing::default());
    assert_eq!(cfg.gamepad.buttons.get(&Button::A), Some(&BTN_SOUTH));
    assert_eq!(cfg.gamepad.axes.get(&Axis::Lt).map(|m| m.target), Some(ABS_Z));
}

#[test]
fn sample_matches_builtin_gamepad_layout() {
    let cfg = new_from_file(&sample_path()).unwrap();
    let builtin = GamepadCfg::default();
    assert_eq!(cfg.gamepad.axes, builtin.axes);
    assert_eq!(cfg.gamepad.abs, builtin.abs);
}

#[test]
fn parse_empty_uses_defaults() {
    let cfg = parse_cfg("").unwrap();
    assert!(cfg.power_buttons.is_empty());
    assert_eq!(cfg.gamepad, GamepadCfg::default());
    assert_eq!(cfg.host, HostCfg::default());
    assert_eq!(cfg.timing.long_press, Duration::from_millis(2500));
    assert_eq!(cfg.timing.gate_poll, Duration::from_millis(500));
}

#[test]
fn parse_hold_isa_resolves_names_and_numbers() {
    let cfg = parse_cfg(
        r#"
[[power_button]]
product_name = "X"
kind = "hold_isa"
phys = "LNXPWRBN"
hold_phys = "isa0060"
hold_grab = true
hold_events = [["EV_KEY", "KEY_LEFTMETA", 1], [1, 32, 1], ["EV_SYN", 0, 0]]
"#,
    )
    .unwrap();
    let pb = cfg.power_button_for("X").unwrap();
    let PowerButtonKind::HoldIsa(hold) = &pb.kind else {
        panic!("expected hold_isa, got {:?}", pb.kind);
    };
    assert!(hold.grab);
    assert_eq!(hold.phys, "isa0060");
    assert_eq!(
        hold.events,
        vec![
            HoldEvent {
                event_type: EV_KEY,
                code: KEY_LEFTMETA,
                value: 1
            },
            HoldEvent {
                event_type: EV_KEY,
                code: KEY_D,
                value: 1
            },
            HoldEvent {
                event_type: EV_SYN,
                code: SYN_REPORT,
                value: 0
            },
        ]
    );
    assert!(cfg.power_button_for("Y").is_none());
}

#[test]
fn less_common_code_names_are_accepted() {
    let cfg = parse_cfg(
        r#"
[[power_button]]
product_name = "X"
kind = "hold_isa"
phys = "LNXPWRBN"
hold_phys = "isa0060"
hold_grab = false
hold_events = [["EV_KEY", "KEY_DELETE", 1], ["EV_KEY", "KEY_F13", 1], ["EV_KEY", "KEY_VOLUMEUP", 0]]

[virtual_gamepad.buttons]
a = "BTN_TRIGGER_HAPPY5"
"#,
    )
    .unwrap();
    let PowerButtonKind::HoldIsa(hold) = &cfg.power_button_for("X").unwrap().kind else {
        panic!("expected hold_isa");
    };
    let codes: Vec<u16> = hold.events.iter().map(|e| e.code).collect();
    assert_eq!(codes, vec![111, 183, 115]);
    assert_eq!(cfg.gamepad.buttons.get(&Button::A), Some(&0x2c4));
}

#[test]
fn hold_isa_requires_hold_settings() {
    let e = parse_cfg(
        r#"
[[power_button]]
product_name = "X"
kind = "hold_isa"
phys = "LNXPWRBN"
hold_phys = "isa0060"
"#,
    )
    .unwrap_err();
    assert!(e.help_msg.contains("requires hold_phys"), "{}", e.help_msg);
}

#[test]
fn hold_isa_rejects_empty_sequence() {
    let e = parse_cfg(
        r#"
[[power_button]]
product_name = "X"
kind = "hold_isa"
phys = "LNXPWRBN"
hold_phys = "isa0060"
hold_grab = false
hold_events = []
"#,
    )
    .unwrap_err();
    assert!(e.help_msg.contains("at least one event"), "{}", e.help_msg);
}

#[test]
fn unknown_kind_is_rejected() {
    let e = parse_cfg(
        r#"
[[power_button]]
product_name = "X"
kind = "hold_forever"
phys = "LNXPWRBN"
"#,
    )
    .unwrap_err();
    assert!(e.help_msg.contains("unknown kind"), "{}", e.help_msg);
}

#[test]
fn duplicate_products_are_rejected() {
    let e = parse_cfg(
        r#"
[[power_button]]
product_name = "X"
kind = "hold_emitted"
phys = "A"

[[power_button]]
product_name = "X"
kind = "hold_emitted"
phys = "B"
"#,
    )
    .unwrap_err();
    assert!(e.help_msg.contains("more than once"), "{}", e.help_msg);
}

#[test]
fn unknown_code_name_is_rejected() {
    let e = parse_cfg(
        r#"
[virtual_gamepad.buttons]
a = "BTN_NOT_A_THING"
"#,
    )
    .unwrap_err();
    assert!(e.help_msg.contains("BTN_NOT_A_THING"), "{}", e.help_msg);
}

#[test]
fn unknown_button_name_is_rejected() {
    let e = parse_cfg(
        r#"
[virtual_gamepad.buttons]
paddle_9 = "BTN_SOUTH"
"#,
    )
    .unwrap_err();
    assert!(e.help_msg.contains("paddle_9"), "{}", e.help_msg);
}

#[test]
fn axis_without_abs_capability_is_rejected() {
    let e = parse_cfg(
        r#"
[virtual_gamepad]
abs = [{ code = "ABS_X", min = -1, max = 1 }]

[virtual_gamepad.axes]
ls_x = { code = "ABS_X" }
ls_y = { code = "ABS_Y" }
"#,
    )
    .unwrap_err();
    assert!(e.help_msg.contains("not listed"), "{}", e.help_msg);
}

#[test]
fn axis_with_inverted_bounds_is_rejected() {
    let e = parse_cfg(
        r#"
[virtual_gamepad.axes]
ls_x = { code = "ABS_X", bounds = [10, -10] }
"#,
    )
    .unwrap_err();
    assert!(e.help_msg.contains("bounds"), "{}", e.help_msg);
}

#[test]
fn long_gamepad_name_is_rejected() {
    let e = parse_cfg(&format!("[virtual_gamepad]\nname = \"{}\"\n", "x".repeat(80))).unwrap_err();
    assert!(e.help_msg.contains("bytes long"), "{}", e.help_msg);
}

#[test]
fn in_memory_errors_render_with_source() {
    let e = new_from_str("[timing]\ngate_poll_ms = \"fast\"\n").unwrap_err();
    let rendered = format!("{e:?}");
    assert!(rendered.contains("Error in configuration file"), "{rendered}");
    assert!(new_from_str("").is_ok());
}

#[test]
fn zero_long_press_is_rejected() {
    assert!(parse_cfg("[timing]\nlong_press_ms = 0\n").is_err());
}

#[test]
fn unknown_fields_are_rejected_with_span() {
    let e = parse_cfg("[timing]\nlong_press = 5\n").unwrap_err();
    assert!(e.err_span.is_some());
}

#[test]
fn capabilities_follow_flags() {
    let mut g = GamepadCfg::default();
    let caps = g.capabilities();
    assert_eq!(caps.ff, vec![FF_RUMBLE]);
    assert_eq!(caps.ff_effects_max, FF_EFFECTS_MAX);
    assert!(caps.msc.is_empty());
    assert!(caps.keys.windows(2).all(|w| w[0] < w[1]));

    g.rumble = false;
    g.output_timestamps = true;
    let caps = g.capabilities();
    assert!(caps.ff.is_empty());
    assert_eq!(caps.msc, vec![MSC_TIMESTAMP]);
}
