//! Contains the evdev and uinput backed device handles on Linux.

use evdev::uinput::VirtualDevice as UinputDevice;
use evdev::{
    AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, Device, FFEffectCode, FFEffectKind,
    InputEvent, InputId, KeyCode, MiscCode, UInputCode, UInputEvent, UinputAbsSetup,
};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, poll};

use std::collections::VecDeque;
use std::ffi::CString;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use handheld_input_parser::cfg::GamepadCfg;

use super::*;
use crate::uinput::ff::{FfEffect, FfEffectKind, FfRequest, FfResponse};

impl From<InputEvent> for RawEvent {
    fn from(ev: InputEvent) -> Self {
        RawEvent::new(ev.event_type().0, ev.code(), ev.value())
    }
}

/// Level triggered readiness check of a single descriptor.
fn fd_readable(fd: RawFd, timeout_ms: i32) -> io::Result<bool> {
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    match poll(&mut fds, timeout_ms) {
        Ok(n) => Ok(n > 0),
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn timeout_ms(timeout: Duration) -> i32 {
    // Round up so a pending long press is never reported a hair early.
    let ms = timeout.as_micros().div_ceil(1000);
    i32::try_from(ms).unwrap_or(i32::MAX)
}

// ------------------ uinput --------------------

pub struct UinputOutput {
    device: UinputDevice,
    pending: Vec<InputEvent>,
}

impl OutputHandle for UinputOutput {
    fn create(cfg: &GamepadCfg) -> io::Result<Self> {
        let caps = cfg.capabilities();
        let phys = CString::new(cfg.phys.as_str())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let mut builder = UinputDevice::builder()?
            .name(cfg.name.as_str())
            .input_id(InputId::new(BusType::BUS_USB, cfg.vid, cfg.pid, cfg.version))
            .with_phys(&phys)?;

        if !caps.keys.is_empty() {
            let mut keys = AttributeSet::<KeyCode>::new();
            for &k in caps.keys.iter() {
                keys.insert(KeyCode(k));
            }
            builder = builder.with_keys(&keys)?;
        }
        for abs in caps.abs.iter() {
            let info = AbsInfo::new(0, abs.min, abs.max, abs.fuzz, abs.flat, abs.resolution);
            builder = builder.with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisCode(abs.code), info))?;
        }
        if !caps.msc.is_empty() {
            let mut msc = AttributeSet::<MiscCode>::new();
            for &m in caps.msc.iter() {
                msc.insert(MiscCode(m));
            }
            builder = builder.with_msc(&msc)?;
        }
        if !caps.ff.is_empty() {
            let mut ff = AttributeSet::<FFEffectCode>::new();
            for &f in caps.ff.iter() {
                ff.insert(FFEffectCode(f));
            }
            builder = builder.with_ff(&ff)?.with_ff_effects_max(caps.ff_effects_max);
        }

        let mut device = builder.build()?;
        match device.enumerate_dev_nodes_blocking()?.next() {
            Some(Ok(devnode)) => log::info!("Created device {:#?}", devnode),
            Some(Err(e)) => log::warn!("Created device, but could not find its node: {e}"),
            None => log::warn!("Created device, but it has no node"),
        }
        Ok(Self {
            device,
            pending: vec![],
        })
    }

    fn raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }

    fn write_event(&mut self, event: RawEvent) -> io::Result<()> {
        self.pending
            .push(InputEvent::new(event.event_type, event.code, event.value));
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        // emit appends the SYN_REPORT
        let res = self.device.emit(&self.pending);
        self.pending.clear();
        res
    }

    fn has_pending(&mut self) -> io::Result<bool> {
        fd_readable(self.raw_fd(), 0)
    }

    fn read_available(&mut self) -> io::Result<Vec<RawEvent>> {
        match self.device.fetch_events() {
            Ok(events) => Ok(events.map(RawEvent::from).collect()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(vec![]),
            Err(e) => Err(e),
        }
    }

    fn ff_transaction(
        &mut self,
        request: RawEvent,
        respond: &mut dyn FnMut(&FfRequest) -> FfResponse,
    ) -> io::Result<()> {
        let code = UInputCode(request.code);
        let event = UInputEvent::new(code, request.value);
        if code == UInputCode::UI_FF_UPLOAD {
            let mut upload = self.device.process_ff_upload(event)?;
            let data = upload.effect();
            let kind = match data.kind {
                FFEffectKind::Rumble {
                    strong_magnitude,
                    weak_magnitude,
                } => FfEffectKind::Rumble {
                    strong_magnitude,
                    weak_magnitude,
                },
                other => {
                    log::debug!("uploaded effect is not rumble: {other:?}");
                    FfEffectKind::Other
                }
            };
            let effect = FfEffect {
                id: upload.effect_id() as i32,
                kind,
            };
            let response = respond(&FfRequest::Upload(effect));
            upload.set_retval(response.retval);
            // dropping `upload` completes the transaction
        } else if code == UInputCode::UI_FF_ERASE {
            let mut erase = self.device.process_ff_erase(event)?;
            let response = respond(&FfRequest::Erase {
                effect_id: erase.effect_id() as i32,
            });
            erase.set_retval(response.retval);
        } else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a force feedback request: {request:?}"),
            ));
        }
        Ok(())
    }
}

// ------------------ evdev --------------------

pub struct EvdevInput {
    device: Device,
    name: String,
    phys: String,
    path: PathBuf,
    buffered: VecDeque<RawEvent>,
}

impl InputHandle for EvdevInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn phys(&self) -> &str {
        &self.phys
    }

    fn grab(&mut self) -> io::Result<()> {
        self.device.grab()
    }

    fn read_one(&mut self) -> io::Result<Option<RawEvent>> {
        if self.buffered.is_empty() {
            match self.device.fetch_events() {
                Ok(events) => self.buffered.extend(events.map(RawEvent::from)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
        }
        Ok(self.buffered.pop_front())
    }
}

impl Drop for EvdevInput {
    fn drop(&mut self) {
        log::info!(
            "Released '{}' at {}: '{}'",
            self.name,
            self.path.display(),
            self.phys
        );
    }
}

/// Physical devices under `/dev/input`.
pub struct EvdevSource;

impl EvdevSource {
    /// Every input device that can be opened, with its node path.
    pub fn list() -> Vec<(PathBuf, Device)> {
        let mut devices: Vec<_> = evdev::enumerate().collect();
        devices.sort_by(|a, b| a.0.cmp(&b.0));
        devices
    }
}

impl InputSource for EvdevSource {
    type Handle = EvdevInput;

    fn find(&mut self, phys_prefix: &str) -> io::Result<Option<EvdevInput>> {
        for (path, device) in Self::list() {
            let Some(phys) = device.physical_path() else {
                continue;
            };
            if !phys.starts_with(phys_prefix) {
                continue;
            }
            let phys = phys.to_owned();
            let name = device.name().unwrap_or("unknown").to_owned();
            log::debug!("found '{name}' at {} for prefix '{phys_prefix}'", path.display());
            return Ok(Some(EvdevInput {
                device,
                name,
                phys,
                path,
                buffered: VecDeque::new(),
            }));
        }
        Ok(None)
    }

    fn wait(&mut self, handles: &[EvdevInput], timeout: Duration) -> io::Result<Option<usize>> {
        // Events already pulled out of the kernel do not show up as readiness.
        if let Some(i) = handles.iter().position(|h| !h.buffered.is_empty()) {
            return Ok(Some(i));
        }
        let mut fds: Vec<PollFd> = handles
            .iter()
            .map(|h| PollFd::new(h.device.as_raw_fd(), PollFlags::POLLIN))
            .collect();
        match poll(&mut fds, timeout_ms(timeout)) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(fds.iter().position(|fd| {
                fd.revents().is_some_and(|r| {
                    r.intersects(
                        PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL,
                    )
                })
            })),
            Err(Errno::EINTR) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
