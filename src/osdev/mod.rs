//! The boundary to kernel input devices.
//!
//! Everything above this module only sees [`RawEvent`]s and the handle traits below. The
//! `linux` adapter implements them on top of evdev and uinput, the `simulated` adapter replays
//! scripted event streams so the logic can be exercised without a kernel.

use std::io;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

use handheld_input_parser::cfg::GamepadCfg;

use crate::uinput::ff::{FfRequest, FfResponse};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::*;

#[cfg(any(test, feature = "simulated_io"))]
pub mod simulated;

/// One kernel input event without its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawEvent {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub const fn new(event_type: u16, code: u16, value: i32) -> Self {
        Self {
            event_type,
            code,
            value,
        }
    }
}

/// A physical input device. Dropping the handle releases the grab and closes the device.
pub trait InputHandle {
    fn name(&self) -> &str;
    fn phys(&self) -> &str;
    /// Take the device exclusively so no other reader sees its events.
    fn grab(&mut self) -> io::Result<()>;
    /// Read a single event. `Ok(None)` means nothing was available after all.
    fn read_one(&mut self) -> io::Result<Option<RawEvent>>;
}

/// Discovery of physical devices plus the blocking wait over a set of them.
pub trait InputSource {
    type Handle: InputHandle;

    /// Opens the first device whose physical path starts with `phys_prefix`.
    fn find(&mut self, phys_prefix: &str) -> io::Result<Option<Self::Handle>>;

    /// Blocks until one of `handles` has an event to read or `timeout` passes. Returns the index
    /// of the first ready handle, or `None` on timeout.
    fn wait(&mut self, handles: &[Self::Handle], timeout: Duration) -> io::Result<Option<usize>>;

    fn now(&self) -> Instant;

    fn sleep(&mut self, duration: Duration);
}

/// A virtual device created through uinput. Dropping the handle destroys the device.
pub trait OutputHandle: Sized {
    fn create(cfg: &GamepadCfg) -> io::Result<Self>;

    /// Descriptor that becomes readable when the kernel has events for the device.
    fn raw_fd(&self) -> RawFd;

    /// Queue an event. Nothing is visible to readers before the next [`OutputHandle::sync`].
    fn write_event(&mut self, event: RawEvent) -> io::Result<()>;

    /// Write the queued events followed by a `SYN_REPORT`.
    fn sync(&mut self) -> io::Result<()>;

    /// Check without blocking whether inbound events are waiting.
    fn has_pending(&mut self) -> io::Result<bool>;

    fn read_available(&mut self) -> io::Result<Vec<RawEvent>>;

    /// Run one force feedback upload or erase transaction announced by `request`, an
    /// `EV_UINPUT` event. `respond` decides the status that completes the transaction.
    fn ff_transaction(
        &mut self,
        request: RawEvent,
        respond: &mut dyn FnMut(&FfRequest) -> FfResponse,
    ) -> io::Result<()>;
}
