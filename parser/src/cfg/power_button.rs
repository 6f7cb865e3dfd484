use serde::Deserialize;

use super::*;

/// One entry of the power button device table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerButtonCfg {
    /// DMI product name this entry applies to.
    pub product_name: String,
    /// Physical path prefix of the device emitting `KEY_POWER`.
    pub phys: String,
    pub kind: PowerButtonKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerButtonKind {
    /// The power button emits press and release; long presses are told apart by timing.
    HoldEmitted,
    /// The power button only emits presses. A long press is reported by a separate keyboard
    /// device as a fixed sequence of events.
    HoldIsa(HoldCfg),
}

impl PowerButtonKind {
    pub fn name(&self) -> &'static str {
        match self {
            PowerButtonKind::HoldEmitted => "hold_emitted",
            PowerButtonKind::HoldIsa(_) => "hold_isa",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldCfg {
    pub phys: String,
    /// Whether to grab the hold device exclusively.
    pub grab: bool,
    /// Never empty.
    pub events: Vec<HoldEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldEvent {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl HoldEvent {
    pub fn matches(&self, event_type: u16, code: u16, value: i32) -> bool {
        self.event_type == event_type && self.code == code && self.value == value
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawPowerButton {
    product_name: String,
    kind: String,
    phys: String,
    hold_phys: Option<String>,
    hold_grab: Option<bool>,
    hold_events: Option<Vec<(CodeRef, CodeRef, i32)>>,
}

pub(super) fn parse_power_button(raw: RawPowerButton) -> Result<PowerButtonCfg> {
    if raw.phys.is_empty() {
        return Err(error_msg(format!(
            "power_button '{}': phys must not be empty, it would match every device",
            raw.product_name
        )));
    }
    let kind = match raw.kind.as_str() {
        "hold_emitted" => {
            if raw.hold_phys.is_some() || raw.hold_events.is_some() || raw.hold_grab.is_some() {
                log::warn!(
                    "power_button '{}': hold_* settings are ignored for kind hold_emitted",
                    raw.product_name
                );
            }
            PowerButtonKind::HoldEmitted
        }
        "hold_isa" => {
            let (Some(phys), Some(events), Some(grab)) =
                (raw.hold_phys, raw.hold_events, raw.hold_grab)
            else {
                return Err(error_msg(format!(
                    "power_button '{}': kind hold_isa requires hold_phys, hold_grab and hold_events",
                    raw.product_name
                )));
            };
            if phys.is_empty() {
                return Err(error_msg(format!(
                    "power_button '{}': hold_phys must not be empty",
                    raw.product_name
                )));
            }
            if events.is_empty() {
                return Err(error_msg(format!(
                    "power_button '{}': hold_events must contain at least one event",
                    raw.product_name
                )));
            }
            let events = events
                .iter()
                .map(|(ty, code, value)| {
                    Ok(HoldEvent {
                        event_type: ty.resolve_event_type()?,
                        code: code.resolve_code()?,
                        value: *value,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            PowerButtonKind::HoldIsa(HoldCfg { phys, grab, events })
        }
        other => {
            return Err(error_msg(format!(
                "power_button '{}': unknown kind '{other}', expected hold_emitted or hold_isa",
                raw.product_name
            )));
        }
    };
    Ok(PowerButtonCfg {
        product_name: raw.product_name,
        phys: raw.phys,
        kind,
    })
}

pub(super) fn check_unique_products(pbs: &[PowerButtonCfg]) -> Result<()> {
    for (i, pb) in pbs.iter().enumerate() {
        if pbs[..i].iter().any(|prev| prev.product_name == pb.product_name) {
            return Err(error_msg(format!(
                "power_button product_name '{}' is listed more than once",
                pb.product_name
            )));
        }
    }
    Ok(())
}
