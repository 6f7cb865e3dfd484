//! Parses and validates the handheld-input TOML configuration.
//!
//! Parsing happens in two steps. The file is deserialized into loosely typed `Raw*` structures
//! that mirror the TOML, and those are then validated into [`Cfg`], where evdev names are
//! resolved to numbers and cross-field constraints are checked. Everything downstream only ever
//! sees a validated `Cfg`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codes::*;

mod error;
pub use error::*;

mod gamepad;
pub use gamepad::*;

mod power_button;
pub use power_button::*;

#[cfg(test)]
mod tests;

pub const DEFAULT_GATE_POLL_MS: u64 = 500;
pub const DEFAULT_LONG_PRESS_MS: u64 = 2500;

#[derive(Debug, Clone)]
pub struct Cfg {
    pub timing: Timing,
    pub host: HostCfg,
    pub power_buttons: Vec<PowerButtonCfg>,
    pub gamepad: GamepadCfg,
}

impl Default for Cfg {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            host: HostCfg::default(),
            power_buttons: vec![],
            gamepad: GamepadCfg::default(),
        }
    }
}

impl Cfg {
    /// Device table lookup by DMI product name.
    pub fn power_button_for(&self, product_name: &str) -> Option<&PowerButtonCfg> {
        self.power_buttons
            .iter()
            .find(|pb| pb.product_name == product_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Interval for re-checking whether the target application is running. Also the wait
    /// timeout of the watchdog while no press is pending.
    pub gate_poll: Duration,
    /// Presses held at least this long are long presses.
    pub long_press: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            gate_poll: Duration::from_millis(DEFAULT_GATE_POLL_MS),
            long_press: Duration::from_millis(DEFAULT_LONG_PRESS_MS),
        }
    }
}

/// Settings of the host application the power button actions are handed to.
///
/// `user` and `home` are left empty when not configured; the daemon fills them in from its
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCfg {
    pub user: Option<String>,
    pub home: Option<PathBuf>,
    pub steam_pid: PathBuf,
    pub steam_exe: PathBuf,
    pub gamepadui_arg: String,
    pub suspend_cmd: Vec<String>,
}

impl Default for HostCfg {
    fn default() -> Self {
        Self {
            user: None,
            home: None,
            steam_pid: PathBuf::from("~/.steam/steam.pid"),
            steam_exe: PathBuf::from("~/.steam/root/ubuntu12_32/steam"),
            gamepadui_arg: "-gamepadui".to_owned(),
            suspend_cmd: vec!["systemctl".to_owned(), "suspend".to_owned()],
        }
    }
}

/// An event type or code, written either by name or as a number.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum CodeRef {
    Num(u16),
    Name(String),
}

impl CodeRef {
    pub(crate) fn resolve_code(&self) -> Result<u16> {
        match self {
            CodeRef::Num(n) => Ok(*n),
            CodeRef::Name(s) => {
                str_to_code(s).ok_or_else(|| error_msg(format!("Unknown event code: {s}")))
            }
        }
    }

    pub(crate) fn resolve_event_type(&self) -> Result<u16> {
        match self {
            CodeRef::Num(n) => Ok(*n),
            CodeRef::Name(s) => str_to_event_type(s)
                .ok_or_else(|| error_msg(format!("Unknown event type: {s}"))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCfg {
    #[serde(default)]
    timing: RawTiming,
    #[serde(default)]
    host: RawHost,
    #[serde(default)]
    power_button: Vec<RawPowerButton>,
    virtual_gamepad: Option<RawGamepad>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTiming {
    gate_poll_ms: Option<u64>,
    long_press_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHost {
    user: Option<String>,
    home: Option<PathBuf>,
    steam_pid: Option<PathBuf>,
    steam_exe: Option<PathBuf>,
    gamepadui_arg: Option<String>,
    suspend_cmd: Option<Vec<String>>,
}

/// Read and validate a configuration file.
pub fn new_from_file(p: &Path) -> MResult<Cfg> {
    let content = std::fs::read_to_string(p).map_err(|e| {
        error_with_source(error_msg(format!(
            "Failed to read configuration file {}: {e}",
            p.display()
        )))
    })?;
    let file_name = p.to_string_lossy();
    parse_cfg(&content).map_err(|e| error_with_source(e.in_file(&file_name, &content)))
}

/// Validate configuration held in memory.
pub fn new_from_str(content: &str) -> MResult<Cfg> {
    parse_cfg(content).map_err(|e| error_with_source(e.in_file("configuration", content)))
}

pub fn parse_cfg(content: &str) -> Result<Cfg> {
    let raw: RawCfg = toml::from_str(content).map_err(|e| error_toml(&e))?;
    log::debug!(
        "parsed raw configuration with {} power button entries",
        raw.power_button.len()
    );

    let timing = parse_timing(&raw.timing)?;
    let host = parse_host(raw.host)?;
    let power_buttons = raw
        .power_button
        .into_iter()
        .map(parse_power_button)
        .collect::<Result<Vec<_>>>()?;
    check_unique_products(&power_buttons)?;
    let gamepad = match raw.virtual_gamepad {
        Some(g) => parse_gamepad(g)?,
        None => GamepadCfg::default(),
    };

    Ok(Cfg {
        timing,
        host,
        power_buttons,
        gamepad,
    })
}

fn parse_timing(raw: &RawTiming) -> Result<Timing> {
    let gate_poll_ms = raw.gate_poll_ms.unwrap_or(DEFAULT_GATE_POLL_MS);
    let long_press_ms = raw.long_press_ms.unwrap_or(DEFAULT_LONG_PRESS_MS);
    if gate_poll_ms == 0 {
        return Err(error_msg("timing.gate_poll_ms must be greater than 0"));
    }
    if long_press_ms == 0 {
        return Err(error_msg("timing.long_press_ms must be greater than 0"));
    }
    Ok(Timing {
        gate_poll: Duration::from_millis(gate_poll_ms),
        long_press: Duration::from_millis(long_press_ms),
    })
}

fn parse_host(raw: RawHost) -> Result<HostCfg> {
    let defaults = HostCfg::default();
    let suspend_cmd = raw.suspend_cmd.unwrap_or(defaults.suspend_cmd);
    if suspend_cmd.is_empty() {
        return Err(error_msg("host.suspend_cmd must name a program"));
    }
    if let Some(user) = &raw.user {
        if user.is_empty() || user.contains(char::is_whitespace) {
            return Err(error_msg(format!("host.user is not a valid user name: {user:?}")));
        }
    }
    Ok(HostCfg {
        user: raw.user,
        home: raw.home,
        steam_pid: raw.steam_pid.unwrap_or(defaults.steam_pid),
        steam_exe: raw.steam_exe.unwrap_or(defaults.steam_exe),
        gamepadui_arg: raw.gamepadui_arg.unwrap_or(defaults.gamepadui_arg),
        suspend_cmd,
    })
}
