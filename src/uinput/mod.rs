//! The virtual gamepad: abstract events in, device events out, and force feedback back.

use anyhow::{Context, Result};
use std::io;
use std::os::unix::io::RawFd;

use handheld_input_parser::cfg::GamepadCfg;
use handheld_input_parser::codes::*;

use crate::event::{Event, Rumble};
use crate::osdev::{OutputHandle, RawEvent};

pub mod ff;

#[cfg(test)]
mod tests;

/// Timestamps are rebased once they run this far (in microseconds) past the current offset, so
/// they always fit the 32-bit `MSC_TIMESTAMP` value.
pub const TIMESTAMP_WINDOW_US: i64 = 1 << 30;

pub struct VirtualDevice<H: OutputHandle> {
    cfg: GamepadCfg,
    handle: Option<H>,
    /// Subtracted from outgoing timestamps.
    ofs: i64,
    /// Last uploaded rumble effect, replayed on play requests.
    rumble: Option<Rumble>,
}

/// What an event read back from the device means to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inbound {
    /// Our own `MSC_TIMESTAMP` writes come back from the kernel.
    TimestampEcho,
    FfTransaction,
    Play,
    Stop,
    Unhandled,
}

fn classify(ev: &RawEvent) -> Inbound {
    match (ev.event_type, ev.code) {
        (EV_MSC, MSC_TIMESTAMP) => Inbound::TimestampEcho,
        (EV_UINPUT, UI_FF_UPLOAD | UI_FF_ERASE) => Inbound::FfTransaction,
        (EV_FF, FF_GAIN | FF_AUTOCENTER) => Inbound::Unhandled,
        (EV_FF, _) if ev.value != 0 => Inbound::Play,
        (EV_FF, _) => Inbound::Stop,
        _ => Inbound::Unhandled,
    }
}

/// Converts a nanosecond timestamp to microseconds relative to `ofs`, moving `ofs` forward when
/// the value runs past the 32-bit safe window.
pub fn rebase_timestamp(ofs: &mut i64, ns: i64) -> i32 {
    let us = ns.div_euclid(1000);
    if us > *ofs + TIMESTAMP_WINDOW_US {
        *ofs = us;
    }
    saturate_i32(us - *ofs)
}

fn saturate_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl<H: OutputHandle> VirtualDevice<H> {
    pub fn new(cfg: GamepadCfg) -> Self {
        Self {
            cfg,
            handle: None,
            ofs: 0,
            rumble: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// The underlying device handle while open.
    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    /// Creates the kernel device. Returns the descriptor to wait on for [`Self::produce`].
    /// Opening an already open device returns the existing descriptor.
    pub fn open(&mut self) -> Result<Vec<RawFd>> {
        if let Some(handle) = &self.handle {
            return Ok(vec![handle.raw_fd()]);
        }
        log::info!("Opening virtual device '{}'.", self.cfg.name);
        let handle = H::create(&self.cfg)
            .with_context(|| format!("failed to create virtual device '{}'", self.cfg.name))?;
        let fd = handle.raw_fd();
        self.ofs = 0;
        self.rumble = None;
        self.handle = Some(handle);
        Ok(vec![fd])
    }

    /// Destroys the kernel device. Does nothing if it was never opened or is already closed.
    /// With `flush`, queued events are written out first. Always returns true.
    pub fn close(&mut self, flush: bool) -> bool {
        if let Some(mut handle) = self.handle.take() {
            if flush {
                if let Err(e) = handle.sync() {
                    log::warn!("failed to flush '{}' before closing: {e}", self.cfg.name);
                }
            }
            log::info!("Closing virtual device '{}'.", self.cfg.name);
        }
        true
    }

    /// Writes `events` in order, followed by one `SYN_REPORT` so readers see them as a single
    /// group. Events for unmapped axes or buttons are dropped.
    pub fn consume(&mut self, events: &[Event]) -> io::Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        for ev in events {
            match *ev {
                Event::Axis { code, value } => {
                    if let Some(mapping) = self.cfg.axes.get(&code) {
                        let mapped = saturate_i32(mapping.apply(value));
                        handle.write_event(RawEvent::new(EV_ABS, mapping.target, mapped))?;
                    }
                }
                Event::Timestamp { value, .. } => {
                    if self.cfg.output_timestamps {
                        let ts = rebase_timestamp(&mut self.ofs, value);
                        handle.write_event(RawEvent::new(EV_MSC, MSC_TIMESTAMP, ts))?;
                    }
                }
                Event::Button { code, value } => {
                    if let Some(&key) = self.cfg.buttons.get(&code) {
                        handle.write_event(RawEvent::new(EV_KEY, key, i32::from(value)))?;
                    }
                }
                Event::Rumble(_) => {}
            }
        }
        handle.sync()
    }

    /// Drains everything the kernel has queued for the device, if its descriptor is in `ready`.
    ///
    /// Force feedback uploads and erases are answered on the spot; a failed one is logged and
    /// skipped. Play and stop requests turn into [`Event::Rumble`].
    pub fn produce(&mut self, ready: &[RawFd]) -> io::Result<Vec<Event>> {
        let mut out = vec![];
        let Some(handle) = self.handle.as_mut() else {
            return Ok(out);
        };
        if !ready.contains(&handle.raw_fd()) {
            return Ok(out);
        }

        // Readiness is rechecked after every read, more may have arrived meanwhile.
        while handle.has_pending()? {
            for ev in handle.read_available()? {
                match classify(&ev) {
                    Inbound::TimestampEcho => {}
                    Inbound::FfTransaction => {
                        // The client may have gone away mid-request.
                        let res = handle
                            .ff_transaction(ev, &mut |req| ff::respond(req, &mut self.rumble));
                        if let Err(e) = res {
                            log::warn!(
                                "'{}' force feedback request {} failed: {e}",
                                self.cfg.name,
                                ev.value
                            );
                        }
                    }
                    Inbound::Play => match self.rumble {
                        Some(rumble) => out.push(Event::Rumble(rumble)),
                        None => log::warn!(
                            "Rumble requested but a rumble effect has not been uploaded."
                        ),
                    },
                    Inbound::Stop => out.push(Event::Rumble(Rumble::stop())),
                    Inbound::Unhandled => {
                        log::info!("'{}' received unhandled event: {ev:?}", self.cfg.name);
                    }
                }
            }
        }
        Ok(out)
    }
}

impl<H: OutputHandle> Drop for VirtualDevice<H> {
    fn drop(&mut self) {
        self.close(false);
    }
}
