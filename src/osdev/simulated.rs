//! Devices that replay scripted event streams on a virtual clock instead of talking to the
//! kernel.
//!
//! Time only moves when the code under test waits or sleeps, so timing-dependent behaviour like
//! long presses runs instantly and deterministically.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering::SeqCst};
use std::time::{Duration, Instant};

use handheld_input_parser::cfg::GamepadCfg;
use handheld_input_parser::codes::*;

use super::*;
use crate::uinput::ff::{FfEffect, FfRequest, FfResponse};

static NEXT_FD: AtomicI32 = AtomicI32::new(1000);

fn next_fd() -> RawFd {
    NEXT_FD.fetch_add(1, SeqCst)
}

#[derive(Clone)]
pub struct SimClock {
    start: Instant,
    now: Rc<Cell<Instant>>,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    pub fn new() -> Self {
        let start = Instant::now();
        Self {
            start,
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn now(&self) -> Instant {
        self.now.get()
    }

    pub fn elapsed(&self) -> Duration {
        self.now.get() - self.start
    }

    /// Absolute instant `offset` after the start of the simulation.
    pub fn at(&self, offset: Duration) -> Instant {
        self.start + offset
    }

    fn advance_to(&self, t: Instant) {
        if t > self.now.get() {
            self.now.set(t);
        }
    }
}

// ------------------ uinput --------------------

/// A uinput device that records what is written and serves queued inbound events.
pub struct SimOutput {
    fd: RawFd,
    pending: Vec<RawEvent>,
    written: Vec<Vec<RawEvent>>,
    inbound: VecDeque<Vec<RawEvent>>,
    requests: HashMap<i32, FfRequest>,
    next_request: i32,
    acks: Vec<(FfRequest, FfResponse)>,
}

impl SimOutput {
    /// Event groups written so far, one per sync.
    pub fn written(&self) -> &[Vec<RawEvent>] {
        &self.written
    }

    /// Completed force feedback transactions.
    pub fn acks(&self) -> &[(FfRequest, FfResponse)] {
        &self.acks
    }

    /// Queues events to be returned together by one read.
    pub fn push_inbound(&mut self, batch: Vec<RawEvent>) {
        self.inbound.push_back(batch);
    }

    /// Registers an upload transaction and returns the `EV_UINPUT` event announcing it.
    pub fn upload_request(&mut self, effect: FfEffect) -> RawEvent {
        let id = self.register(FfRequest::Upload(effect));
        RawEvent::new(EV_UINPUT, UI_FF_UPLOAD, id)
    }

    /// Registers an erase transaction and returns the `EV_UINPUT` event announcing it.
    pub fn erase_request(&mut self, effect_id: i32) -> RawEvent {
        let id = self.register(FfRequest::Erase { effect_id });
        RawEvent::new(EV_UINPUT, UI_FF_ERASE, id)
    }

    fn register(&mut self, request: FfRequest) -> i32 {
        let id = self.next_request;
        self.next_request += 1;
        self.requests.insert(id, request);
        id
    }
}

impl OutputHandle for SimOutput {
    fn create(cfg: &GamepadCfg) -> io::Result<Self> {
        log::debug!("sim: creating virtual device '{}'", cfg.name);
        Ok(Self {
            fd: next_fd(),
            pending: vec![],
            written: vec![],
            inbound: VecDeque::new(),
            requests: HashMap::new(),
            next_request: 1,
            acks: vec![],
        })
    }

    fn raw_fd(&self) -> RawFd {
        self.fd
    }

    fn write_event(&mut self, event: RawEvent) -> io::Result<()> {
        self.pending.push(event);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.written.push(std::mem::take(&mut self.pending));
        Ok(())
    }

    fn has_pending(&mut self) -> io::Result<bool> {
        Ok(!self.inbound.is_empty())
    }

    fn read_available(&mut self) -> io::Result<Vec<RawEvent>> {
        Ok(self.inbound.pop_front().unwrap_or_default())
    }

    fn ff_transaction(
        &mut self,
        request: RawEvent,
        respond: &mut dyn FnMut(&FfRequest) -> FfResponse,
    ) -> io::Result<()> {
        let req = self.requests.remove(&request.value).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no force feedback request with id {}", request.value),
            )
        })?;
        let kind_matches = matches!(
            (request.code, &req),
            (UI_FF_UPLOAD, FfRequest::Upload(_)) | (UI_FF_ERASE, FfRequest::Erase { .. })
        );
        if !kind_matches {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("request {} is not a {:?}", request.value, req),
            ));
        }
        let response = respond(&req);
        self.acks.push((req, response));
        Ok(())
    }
}

// ------------------ evdev --------------------

enum SimItem {
    Event(RawEvent),
    Unplug,
}

struct SimDeviceState {
    name: String,
    phys: String,
    script: VecDeque<(Instant, SimItem)>,
    present: bool,
    missing: Option<(Instant, Instant)>,
    refuse_grab: bool,
    open: bool,
    grabbed: bool,
    opens: usize,
}

/// Scripting side of a simulated input device.
#[derive(Clone)]
pub struct SimDevice {
    state: Rc<RefCell<SimDeviceState>>,
    clock: SimClock,
}

impl SimDevice {
    /// Schedules `ev` to arrive `at` after the start of the simulation. Events must be
    /// scheduled in time order.
    pub fn event_at(&self, at: Duration, ev: RawEvent) -> &Self {
        self.push(at, SimItem::Event(ev));
        self
    }

    /// Schedules the open handle to fail as if the device disappeared.
    pub fn unplug_at(&self, at: Duration) -> &Self {
        self.push(at, SimItem::Unplug);
        self
    }

    fn push(&self, at: Duration, item: SimItem) {
        let t = self.clock.at(at);
        let mut st = self.state.borrow_mut();
        debug_assert!(st.script.back().is_none_or(|(last, _)| *last <= t));
        st.script.push_back((t, item));
    }

    pub fn set_present(&self, present: bool) {
        self.state.borrow_mut().present = present;
    }

    /// Hides the device from discovery between `from` and `to` after the start of the
    /// simulation.
    pub fn missing_during(&self, from: Duration, to: Duration) {
        self.state.borrow_mut().missing = Some((self.clock.at(from), self.clock.at(to)));
    }

    pub fn refuse_grab(&self) {
        self.state.borrow_mut().refuse_grab = true;
    }

    pub fn opens(&self) -> usize {
        self.state.borrow().opens
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    pub fn is_grabbed(&self) -> bool {
        self.state.borrow().grabbed
    }
}

pub struct SimInputHandle {
    state: Rc<RefCell<SimDeviceState>>,
    name: String,
    phys: String,
    clock: SimClock,
}

impl InputHandle for SimInputHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn phys(&self) -> &str {
        &self.phys
    }

    fn grab(&mut self) -> io::Result<()> {
        let mut st = self.state.borrow_mut();
        if st.refuse_grab {
            return Err(io::Error::new(
                io::ErrorKind::ResourceBusy,
                "device is grabbed by another process",
            ));
        }
        st.grabbed = true;
        Ok(())
    }

    fn read_one(&mut self) -> io::Result<Option<RawEvent>> {
        let now = self.clock.now();
        let mut st = self.state.borrow_mut();
        match st.script.front() {
            Some((t, _)) if *t <= now => {}
            _ => return Ok(None),
        }
        match st.script.pop_front() {
            Some((_, SimItem::Event(ev))) => Ok(Some(ev)),
            Some((_, SimItem::Unplug)) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("device '{}' was removed", st.name),
            )),
            None => Ok(None),
        }
    }
}

impl Drop for SimInputHandle {
    fn drop(&mut self) {
        let mut st = self.state.borrow_mut();
        st.open = false;
        st.grabbed = false;
    }
}

/// Device discovery and waiting over simulated devices.
pub struct SimInputSource {
    clock: SimClock,
    devices: Vec<SimDevice>,
    stop: Option<(Instant, Arc<AtomicBool>)>,
}

impl SimInputSource {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            devices: vec![],
            stop: None,
        }
    }

    pub fn add_device(&mut self, name: &str, phys: &str) -> SimDevice {
        let dev = SimDevice {
            state: Rc::new(RefCell::new(SimDeviceState {
                name: name.to_owned(),
                phys: phys.to_owned(),
                script: VecDeque::new(),
                present: true,
                missing: None,
                refuse_grab: false,
                open: false,
                grabbed: false,
                opens: 0,
            })),
            clock: self.clock.clone(),
        };
        self.devices.push(dev.clone());
        dev
    }

    /// Sets `cancel` once the virtual clock reaches `after`.
    pub fn cancel_at(&mut self, after: Duration, cancel: Arc<AtomicBool>) {
        self.stop = Some((self.clock.at(after), cancel));
    }

    fn advance_to(&self, t: Instant) {
        self.clock.advance_to(t);
        if let Some((stop_at, cancel)) = &self.stop {
            if self.clock.now() >= *stop_at {
                cancel.store(true, SeqCst);
            }
        }
    }
}

impl InputSource for SimInputSource {
    type Handle = SimInputHandle;

    fn find(&mut self, phys_prefix: &str) -> io::Result<Option<SimInputHandle>> {
        let now = self.clock.now();
        for dev in self.devices.iter() {
            let mut st = dev.state.borrow_mut();
            let hidden = st.missing.is_some_and(|(from, to)| from <= now && now < to);
            if !st.present || hidden || !st.phys.starts_with(phys_prefix) {
                continue;
            }
            // Nobody was reading while the device was closed.
            while st.script.front().is_some_and(|(t, _)| *t < now) {
                st.script.pop_front();
            }
            st.open = true;
            st.opens += 1;
            return Ok(Some(SimInputHandle {
                state: dev.state.clone(),
                name: st.name.clone(),
                phys: st.phys.clone(),
                clock: self.clock.clone(),
            }));
        }
        Ok(None)
    }

    fn wait(
        &mut self,
        handles: &[SimInputHandle],
        timeout: Duration,
    ) -> io::Result<Option<usize>> {
        let now = self.clock.now();
        let deadline = now + timeout;
        let mut first: Option<(Instant, usize)> = None;
        for (i, h) in handles.iter().enumerate() {
            let st = h.state.borrow();
            if let Some((t, _)) = st.script.front() {
                let t = (*t).max(now);
                if t <= deadline && first.is_none_or(|(ft, _)| t < ft) {
                    first = Some((t, i));
                }
            }
        }
        match first {
            Some((t, i)) => {
                self.advance_to(t);
                Ok(Some(i))
            }
            None => {
                self.advance_to(deadline);
                Ok(None)
            }
        }
    }

    fn now(&self) -> Instant {
        self.clock.now()
    }

    fn sleep(&mut self, duration: Duration) {
        self.advance_to(self.clock.now() + duration);
    }
}
