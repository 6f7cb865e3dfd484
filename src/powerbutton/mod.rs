//! Power button handling for handhelds running Steam in game mode.
//!
//! While Steam's game mode UI is running, the power button device is grabbed so the system
//! does not act on it, and presses are forwarded to Steam as short or long presses. When Steam
//! goes away the devices are released again and the system default behaviour returns.
//!
//! Two wirings are supported. `hold_emitted` buttons report press and release, and a long
//! press is detected by how long the button is held. `hold_isa` buttons only report presses;
//! the firmware reports a long press separately through a keyboard device as a fixed sequence
//! of events, see [`HoldSequence`].

use anyhow::{Context, Result, bail};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};

use handheld_input_parser::cfg::{HoldCfg, PowerButtonCfg, PowerButtonKind, Timing};
use handheld_input_parser::codes::{EV_KEY, KEY_POWER};

use crate::osdev::{InputHandle, InputSource};

mod hold;
mod host;
mod press;

pub use hold::*;
pub use host::*;
pub use press::*;


/// Why a session with acquired devices ended.
#[derive(Debug)]
enum SessionEnd {
    Cancelled,
    TargetGone,
    DeviceLost(io::Error),
}

pub struct Watchdog<S: InputSource, H: Host> {
    cfg: PowerButtonCfg,
    timing: Timing,
    source: S,
    host: H,
    cancel: Arc<AtomicBool>,
    /// Set once devices were acquired. A device that disappears later is waited for instead of
    /// disabling the watchdog.
    acquired_before: bool,
}

impl<S: InputSource, H: Host> Watchdog<S, H> {
    pub fn new(
        cfg: PowerButtonCfg,
        timing: Timing,
        source: S,
        host: H,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            cfg,
            timing,
            source,
            host,
            cancel,
            acquired_before: false,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(SeqCst)
    }

    /// Runs until cancelled. Returns an error if the watchdog had to disable itself because
    /// its devices could not be acquired.
    pub fn run(&mut self) -> Result<()> {
        log::info!(
            "Power button watchdog for '{}' ({}) starting",
            self.cfg.product_name,
            self.cfg.kind.name()
        );
        if let PowerButtonKind::HoldIsa(hold) = &self.cfg.kind {
            if hold.events.is_empty() {
                bail!("'{}': hold sequence is empty", self.cfg.product_name);
            }
        }
        loop {
            if !self.wait_for_target() {
                break;
            }
            let session = match self.cfg.kind.clone() {
                PowerButtonKind::HoldEmitted => self.run_hold_emitted(),
                PowerButtonKind::HoldIsa(hold) => self.run_hold_isa(hold),
            };
            let end = match session {
                Ok(end) => end,
                Err(e) if self.acquired_before && is_missing(&e) => {
                    log::warn!("{e:#}, retrying");
                    self.source.sleep(self.timing.gate_poll);
                    continue;
                }
                Err(e) => {
                    log::error!("Power button watchdog disabled: {e:#}");
                    return Err(e);
                }
            };
            match end {
                SessionEnd::Cancelled => break,
                SessionEnd::TargetGone => {
                    log::info!("Steam left game mode, released power button");
                }
                SessionEnd::DeviceLost(e) => {
                    log::warn!("Lost power button device: {e}");
                }
            }
        }
        log::info!("Power button watchdog stopped");
        Ok(())
    }

    /// Polls until the target is running. Returns false if cancelled first.
    fn wait_for_target(&mut self) -> bool {
        let mut logged = false;
        loop {
            if self.cancelled() {
                return false;
            }
            if self.host.target_running() {
                return true;
            }
            if !logged {
                log::info!("Waiting for Steam game mode");
                logged = true;
            }
            self.source.sleep(self.timing.gate_poll);
        }
    }

    fn acquire(&mut self, phys: &str, grab: bool) -> Result<S::Handle> {
        let mut dev = self
            .source
            .find(phys)
            .with_context(|| format!("failed to look for device '{phys}'"))?
            .ok_or_else(|| anyhow::Error::new(DeviceMissing(phys.to_owned())))?;
        if grab {
            dev.grab()
                .with_context(|| format!("failed to grab '{}' ({})", dev.name(), dev.phys()))?;
        }
        log::info!(
            "Hooked '{}' ({}){}",
            dev.name(),
            dev.phys(),
            if grab { "" } else { " without grabbing" }
        );
        Ok(dev)
    }

    /// Checks done at the top of every loop iteration.
    fn still_wanted(&mut self) -> Option<SessionEnd> {
        if self.cancelled() {
            return Some(SessionEnd::Cancelled);
        }
        if !self.host.target_running() {
            return Some(SessionEnd::TargetGone);
        }
        None
    }

    fn run_hold_emitted(&mut self) -> Result<SessionEnd> {
        let phys = self.cfg.phys.clone();
        let mut devs = [self.acquire(&phys, true)?];
        self.acquired_before = true;
        let mut classifier = PressClassifier::new(self.timing.long_press);

        loop {
            if let Some(end) = self.still_wanted() {
                return Ok(end);
            }
            let timeout = classifier.next_timeout(self.source.now(), self.timing.gate_poll);
            let press = match self.source.wait(&devs, timeout) {
                Err(e) => return Ok(SessionEnd::DeviceLost(e)),
                Ok(None) => classifier.on_timeout(self.source.now()),
                Ok(Some(_)) => match devs[0].read_one() {
                    Err(e) => return Ok(SessionEnd::DeviceLost(e)),
                    Ok(None) => None,
                    Ok(Some(ev)) => {
                        log::trace!("power button event {ev:?}");
                        let now = self.source.now();
                        classifier
                            .on_event(&ev, now)
                            .or_else(|| classifier.on_timeout(now))
                    }
                },
            };
            if let Some(press) = press {
                self.dispatch(press);
            }
        }
    }

    fn run_hold_isa(&mut self, hold: HoldCfg) -> Result<SessionEnd> {
        let phys = self.cfg.phys.clone();
        let press_dev = self.acquire(&phys, true)?;
        let hold_dev = self.acquire(&hold.phys, hold.grab)?;
        self.acquired_before = true;
        let mut devs = [press_dev, hold_dev];
        let mut sequence = HoldSequence::new(hold.events);

        loop {
            if let Some(end) = self.still_wanted() {
                return Ok(end);
            }
            let ready = match self.source.wait(&devs, self.timing.gate_poll) {
                Err(e) => return Ok(SessionEnd::DeviceLost(e)),
                Ok(None) => continue,
                Ok(Some(i)) => i,
            };
            let ev = match devs[ready].read_one() {
                Err(e) => return Ok(SessionEnd::DeviceLost(e)),
                Ok(None) => continue,
                Ok(Some(ev)) => ev,
            };
            log::trace!("{} event {ev:?}", devs[ready].name());
            if ready == 0 {
                if ev.event_type == EV_KEY && ev.code == KEY_POWER && ev.value == 1 {
                    self.dispatch(Press::Short);
                }
            } else if sequence.feed(&ev) {
                self.dispatch(Press::Long);
            }
        }
    }

    fn dispatch(&mut self, press: Press) {
        log::info!("Power button {press:?} press");
        let ok = match press {
            Press::Short => self.host.short_press(),
            Press::Long => self.host.long_press(),
        };
        if !ok {
            log::error!("Forwarding {press:?} press failed, suspending instead");
            if !self.host.suspend() {
                log::error!("Suspend failed");
            }
        }
    }
}

#[derive(Debug)]
struct DeviceMissing(String);

impl std::fmt::Display for DeviceMissing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no device with physical path starting with '{}'", self.0)
    }
}

impl std::error::Error for DeviceMissing {}

fn is_missing(e: &anyhow::Error) -> bool {
    e.downcast_ref::<DeviceMissing>().is_some()
}
