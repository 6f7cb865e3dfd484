use std::path::PathBuf;

pub mod event;
pub mod osdev;
pub mod powerbutton;
pub mod uinput;

#[cfg(target_os = "linux")]
pub mod daemon;


/// Where the firmware reports the model of the machine.
pub const DMI_PRODUCT_NAME: &str = "/sys/devices/virtual/dmi/id/product_name";

pub fn default_cfg() -> Vec<PathBuf> {
    let mut cfgs = Vec::new();

    let default = PathBuf::from("handheld-input.toml");
    if default.is_file() {
        cfgs.push(default);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let fallback = config_dir.join("handheld-input").join("config.toml");
        if fallback.is_file() {
            cfgs.push(fallback);
        }
    }

    cfgs
}

/// DMI product name of this machine, used to pick the power button wiring.
pub fn product_name() -> Option<String> {
    match std::fs::read_to_string(DMI_PRODUCT_NAME) {
        Ok(s) => product_name_from(&s),
        Err(e) => {
            log::warn!("could not read {DMI_PRODUCT_NAME}: {e}");
            None
        }
    }
}

pub(crate) fn product_name_from(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_owned())
}
