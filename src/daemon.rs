//! The polling cycle that drives the virtual gamepad.

use anyhow::{Context, Result};
use mio::{Events, Interest, Poll, Token, unix::SourceFd};
use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::time::Duration;

use crate::event::Event;
use crate::osdev::OutputHandle;
use crate::uinput::VirtualDevice;

/// Opens `dev` and feeds everything it produces to `sink` until `cancel` is set. `cancel` is
/// checked at least every `tick`. The device is closed on return.
pub fn run_virtual_gamepad<H: OutputHandle>(
    dev: &mut VirtualDevice<H>,
    tick: Duration,
    cancel: &Arc<AtomicBool>,
    mut sink: impl FnMut(Event),
) -> Result<()> {
    let fds = dev.open()?;
    let res = poll_loop(dev, &fds, tick, cancel, &mut sink);
    dev.close(true);
    res
}

fn poll_loop<H: OutputHandle>(
    dev: &mut VirtualDevice<H>,
    fds: &[RawFd],
    tick: Duration,
    cancel: &Arc<AtomicBool>,
    sink: &mut impl FnMut(Event),
) -> Result<()> {
    let mut poll = Poll::new()?;
    for (i, fd) in fds.iter().enumerate() {
        poll.registry()
            .register(&mut SourceFd(fd), Token(i), Interest::READABLE)?;
    }
    let mut events = Events::with_capacity(8);
    let mut ready = Vec::with_capacity(fds.len());

    while !cancel.load(SeqCst) {
        log::trace!("polling");
        if let Err(e) = poll.poll(&mut events, Some(tick)) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(e).context("failed to poll the virtual gamepad");
        }
        ready.clear();
        ready.extend(events.iter().filter_map(|ev| fds.get(ev.token().0).copied()));
        if ready.is_empty() {
            continue;
        }
        let produced = dev
            .produce(&ready)
            .with_context(|| format!("failed to read from '{}'", dev.name()))?;
        for ev in produced {
            sink(ev);
        }
    }
    Ok(())
}

/// Default sink while no rumble consumer is attached.
pub fn log_event(ev: Event) {
    match ev {
        Event::Rumble(r) => log::info!(
            "rumble weak={:.3} strong={:.3}",
            r.weak_magnitude,
            r.strong_magnitude
        ),
        other => log::debug!("virtual gamepad produced {other:?}"),
    }
}
