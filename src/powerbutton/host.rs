//! What the watchdog asks of the rest of the system: whether it should be active at all, and
//! the actions behind the button.

use std::path::{Path, PathBuf};
use std::process::Command;

use handheld_input_parser::cfg::HostCfg;

// local log prefix
const LP: &str = "host:";

pub trait Host {
    /// Whether the application that handles power button presses is running in the mode that
    /// wants them. Evaluated every loop iteration.
    fn target_running(&mut self) -> bool;
    fn short_press(&mut self) -> bool;
    fn long_press(&mut self) -> bool;
    /// Fallback when a press action fails.
    fn suspend(&mut self) -> bool;
}

/// Steam in game mode. Presses are forwarded as `steam://` URLs to the running client.
#[derive(Debug, Clone)]
pub struct SteamHost {
    user: String,
    steam_pid: PathBuf,
    steam_exe: PathBuf,
    gamepadui_arg: String,
    suspend_cmd: Vec<String>,
    proc_root: PathBuf,
}

fn default_user() -> String {
    ["SUDO_USER", "USER"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|user| !user.is_empty())
        .unwrap_or_else(|| "root".to_owned())
}

/// Expands a leading `~` relative to `home`.
fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        (Ok(_), None) => {
            log::warn!("{LP} no home directory to expand {}", path.display());
            path.to_owned()
        }
        (Err(_), _) => path.to_owned(),
    }
}

impl SteamHost {
    pub fn from_cfg(cfg: &HostCfg) -> Self {
        let user = cfg.user.clone().unwrap_or_else(default_user);
        let home = cfg.home.clone().or_else(dirs::home_dir);
        Self {
            user,
            steam_pid: expand_home(&cfg.steam_pid, home.as_deref()),
            steam_exe: expand_home(&cfg.steam_exe, home.as_deref()),
            gamepadui_arg: cfg.gamepadui_arg.clone(),
            suspend_cmd: cfg.suspend_cmd.clone(),
            proc_root: PathBuf::from("/proc"),
        }
    }

    /// Where process command lines are read from, `/proc` by default.
    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }

    #[cfg(test)]
    pub fn user(&self) -> &str {
        &self.user
    }

    fn steam_cmdline(&self) -> std::io::Result<String> {
        let pid = std::fs::read_to_string(&self.steam_pid)?;
        let pid: u32 = pid.trim().parse().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, format!("bad pid {pid:?}: {e}"))
        })?;
        let cmdline = std::fs::read(self.proc_root.join(pid.to_string()).join("cmdline"))?;
        Ok(String::from_utf8_lossy(&cmdline).replace('\0', " "))
    }

    fn steam_url(&mut self, url: &str) -> bool {
        let mut cmd = Command::new("su");
        cmd.arg(&self.user).arg("-c").arg(format!(
            "{} -ifrunning {url}",
            self.steam_exe.display()
        ));
        run(cmd)
    }
}

fn run(mut cmd: Command) -> bool {
    log::info!("{LP} running {cmd:?}");
    match cmd.output() {
        Ok(output) if output.status.success() => {
            log::debug!(
                "{LP} {cmd:?} succeeded\nstdout:\n{}\nstderr:\n{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            true
        }
        Ok(output) => {
            log::error!(
                "{LP} {cmd:?} failed with {}\nstderr:\n{}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
            false
        }
        Err(e) => {
            log::error!("{LP} failed to execute {:?}: {e}", cmd.get_program());
            false
        }
    }
}

impl Host for SteamHost {
    fn target_running(&mut self) -> bool {
        match self.steam_cmdline() {
            Ok(cmdline) => cmdline.contains(&self.gamepadui_arg),
            Err(e) => {
                log::trace!("{LP} steam is not running: {e}");
                false
            }
        }
    }

    fn short_press(&mut self) -> bool {
        self.steam_url("steam://shortpowerpress")
    }

    fn long_press(&mut self) -> bool {
        self.steam_url("steam://longpowerpress")
    }

    fn suspend(&mut self) -> bool {
        let Some((program, args)) = self.suspend_cmd.split_first() else {
            log::error!("{LP} no suspend command configured");
            return false;
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        run(cmd)
    }
}
