use serde::Deserialize;
use std::collections::BTreeMap;

use super::*;
use crate::controller::{Axis, AxisMapping, Button};

pub const DEFAULT_GAMEPAD_NAME: &str = "Handheld Virtual Controller";
pub const DEFAULT_GAMEPAD_PHYS: &str = "phys-handheld-gamepad";
pub const DEFAULT_GAMEPAD_VID: u16 = 0x5335;
pub const DEFAULT_GAMEPAD_PID: u16 = 0x0001;
pub const FF_EFFECTS_MAX: u32 = 16;

const STICK_MAX: i64 = i16::MAX as i64;
const STICK_MIN: i64 = i16::MIN as i64;
const TRIGGER_MAX: i64 = 1023;

/// Everything needed to create the virtual gamepad. Immutable once the device is created.
#[derive(Debug, Clone, PartialEq)]
pub struct GamepadCfg {
    pub name: String,
    pub vid: u16,
    pub pid: u16,
    pub version: u16,
    pub phys: String,
    pub output_timestamps: bool,
    pub rumble: bool,
    pub buttons: BTreeMap<Button, u16>,
    pub axes: BTreeMap<Axis, AxisMapping>,
    pub abs: Vec<AbsCapability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsCapability {
    pub code: u16,
    pub min: i32,
    pub max: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

impl AbsCapability {
    pub const fn new(code: u16, min: i32, max: i32, fuzz: i32, flat: i32) -> Self {
        Self {
            code,
            min,
            max,
            fuzz,
            flat,
            resolution: 0,
        }
    }
}

/// Capability set advertised by the virtual device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub keys: Vec<u16>,
    pub abs: Vec<AbsCapability>,
    pub msc: Vec<u16>,
    pub ff: Vec<u16>,
    pub ff_effects_max: u32,
}

impl GamepadCfg {
    pub fn capabilities(&self) -> Capabilities {
        let mut keys: Vec<u16> = self.buttons.values().copied().collect();
        keys.sort_unstable();
        keys.dedup();
        let msc = match self.output_timestamps {
            true => vec![MSC_TIMESTAMP],
            false => vec![],
        };
        let (ff, ff_effects_max) = match self.rumble {
            true => (vec![FF_RUMBLE], FF_EFFECTS_MAX),
            false => (vec![], 0),
        };
        Capabilities {
            keys,
            abs: self.abs.clone(),
            msc,
            ff,
            ff_effects_max,
        }
    }
}

impl Default for GamepadCfg {
    fn default() -> Self {
        let buttons = BTreeMap::from([
            (Button::A, BTN_SOUTH),
            (Button::B, BTN_EAST),
            (Button::X, BTN_NORTH),
            (Button::Y, BTN_WEST),
            (Button::Lb, BTN_TL),
            (Button::Rb, BTN_TR),
            (Button::Ls, BTN_THUMBL),
            (Button::Rs, BTN_THUMBR),
            (Button::Select, BTN_SELECT),
            (Button::Start, BTN_START),
            (Button::Mode, BTN_MODE),
            (Button::ExtraL1, BTN_TRIGGER_HAPPY1),
            (Button::ExtraR1, BTN_TRIGGER_HAPPY2),
            (Button::ExtraL2, BTN_TRIGGER_HAPPY3),
            (Button::ExtraR2, BTN_TRIGGER_HAPPY4),
        ]);
        let stick = |code| AxisMapping::new(code, STICK_MAX as f64, 0.0, Some((STICK_MIN, STICK_MAX)));
        let trigger = |code| AxisMapping::new(code, TRIGGER_MAX as f64, 0.0, Some((0, TRIGGER_MAX)));
        let hat = |code| AxisMapping::new(code, 1.0, 0.0, Some((-1, 1)));
        let axes = BTreeMap::from([
            (Axis::LsX, stick(ABS_X)),
            (Axis::LsY, stick(ABS_Y)),
            (Axis::RsX, stick(ABS_RX)),
            (Axis::RsY, stick(ABS_RY)),
            (Axis::Lt, trigger(ABS_Z)),
            (Axis::Rt, trigger(ABS_RZ)),
            (Axis::HatX, hat(ABS_HAT0X)),
            (Axis::HatY, hat(ABS_HAT0Y)),
        ]);
        let (smin, smax) = (STICK_MIN as i32, STICK_MAX as i32);
        let abs = vec![
            AbsCapability::new(ABS_X, smin, smax, 16, 128),
            AbsCapability::new(ABS_Y, smin, smax, 16, 128),
            AbsCapability::new(ABS_RX, smin, smax, 16, 128),
            AbsCapability::new(ABS_RY, smin, smax, 16, 128),
            AbsCapability::new(ABS_Z, 0, TRIGGER_MAX as i32, 0, 0),
            AbsCapability::new(ABS_RZ, 0, TRIGGER_MAX as i32, 0, 0),
            AbsCapability::new(ABS_HAT0X, -1, 1, 0, 0),
            AbsCapability::new(ABS_HAT0Y, -1, 1, 0, 0),
        ];
        Self {
            name: DEFAULT_GAMEPAD_NAME.to_owned(),
            vid: DEFAULT_GAMEPAD_VID,
            pid: DEFAULT_GAMEPAD_PID,
            version: 1,
            phys: DEFAULT_GAMEPAD_PHYS.to_owned(),
            output_timestamps: false,
            rumble: true,
            buttons,
            axes,
            abs,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawGamepad {
    name: Option<String>,
    vid: Option<u16>,
    pid: Option<u16>,
    version: Option<u16>,
    phys: Option<String>,
    output_timestamps: Option<bool>,
    rumble: Option<bool>,
    buttons: Option<BTreeMap<String, CodeRef>>,
    axes: Option<BTreeMap<String, RawAxis>>,
    abs: Option<Vec<RawAbs>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAxis {
    code: CodeRef,
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default)]
    offset: f64,
    bounds: Option<(i64, i64)>,
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAbs {
    code: CodeRef,
    min: i32,
    max: i32,
    #[serde(default)]
    fuzz: i32,
    #[serde(default)]
    flat: i32,
    #[serde(default)]
    resolution: i32,
}

/// Table keys name buttons and axes in snake_case, e.g. `ls_x` or `dpad_up`.
fn parse_name<T: serde::de::DeserializeOwned>(section: &str, key: &str) -> Result<T> {
    use serde::de::IntoDeserializer;
    let de: serde::de::value::StrDeserializer<'_, serde::de::value::Error> =
        key.into_deserializer();
    T::deserialize(de).map_err(|_| error_msg(format!("{section}: unknown name '{key}'")))
}

pub(super) fn parse_gamepad(raw: RawGamepad) -> Result<GamepadCfg> {
    let defaults = GamepadCfg::default();

    let name = raw.name.unwrap_or(defaults.name);
    if name.is_empty() || name.len() >= UINPUT_MAX_NAME_SIZE {
        return Err(error_msg(format!(
            "virtual_gamepad.name must be between 1 and {} bytes long",
            UINPUT_MAX_NAME_SIZE - 1
        )));
    }
    if name.contains('\0') {
        return Err(error_msg("virtual_gamepad.name must not contain NUL"));
    }
    let phys = raw.phys.unwrap_or(defaults.phys);
    if phys.contains('\0') {
        return Err(error_msg("virtual_gamepad.phys must not contain NUL"));
    }

    let buttons = match raw.buttons {
        Some(buttons) => buttons
            .into_iter()
            .map(|(btn, code)| {
                let btn: Button = parse_name("virtual_gamepad.buttons", &btn)?;
                Ok((btn, code.resolve_code()?))
            })
            .collect::<Result<BTreeMap<_, _>>>()?,
        None => defaults.buttons,
    };
    let axes = match raw.axes {
        Some(axes) => axes
            .into_iter()
            .map(|(axis, ax)| {
                let axis: Axis = parse_name("virtual_gamepad.axes", &axis)?;
                if let Some((low, high)) = ax.bounds {
                    if low > high {
                        return Err(error_msg(format!(
                            "virtual_gamepad.axes.{axis:?}: bounds low {low} is above high {high}"
                        )));
                    }
                }
                if !ax.scale.is_finite() || !ax.offset.is_finite() {
                    return Err(error_msg(format!(
                        "virtual_gamepad.axes.{axis:?}: scale and offset must be finite"
                    )));
                }
                let target = ax.code.resolve_code()?;
                Ok((axis, AxisMapping::new(target, ax.scale, ax.offset, ax.bounds)))
            })
            .collect::<Result<BTreeMap<_, _>>>()?,
        None => defaults.axes,
    };
    let abs = match raw.abs {
        Some(abs) => abs
            .into_iter()
            .map(|a| {
                let code = a.code.resolve_code()?;
                if a.min > a.max {
                    return Err(error_msg(format!(
                        "virtual_gamepad.abs: code {code} has min {} above max {}",
                        a.min, a.max
                    )));
                }
                Ok(AbsCapability {
                    code,
                    min: a.min,
                    max: a.max,
                    fuzz: a.fuzz,
                    flat: a.flat,
                    resolution: a.resolution,
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => defaults.abs,
    };

    for (axis, mapping) in axes.iter() {
        if !abs.iter().any(|a| a.code == mapping.target) {
            return Err(error_msg(format!(
                "virtual_gamepad.axes.{axis:?} targets absolute axis {}, which is not listed in virtual_gamepad.abs",
                mapping.target
            )));
        }
    }

    Ok(GamepadCfg {
        name,
        vid: raw.vid.unwrap_or(defaults.vid),
        pid: raw.pid.unwrap_or(defaults.pid),
        version: raw.version.unwrap_or(defaults.version),
        phys,
        output_timestamps: raw.output_timestamps.unwrap_or(defaults.output_timestamps),
        rumble: raw.rumble.unwrap_or(defaults.rumble),
        buttons,
        axes,
        abs,
    })
}
