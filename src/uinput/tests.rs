use super::*;

use handheld_input_parser::cfg::GamepadCfg;

use crate::event::{Axis, Button, TimestampSource};
use crate::osdev::simulated::SimOutput;
use crate::tests::init_log;
use crate::uinput::ff::{FfEffect, FfEffectKind, FfRequest, FfResponse};

const SYN: RawEvent = RawEvent::new(EV_SYN, SYN_REPORT, 0);

fn open(cfg: GamepadCfg) -> (VirtualDevice<SimOutput>, Vec<RawFd>) {
    init_log();
    let mut dev = VirtualDevice::new(cfg);
    let fds = dev.open().unwrap();
    (dev, fds)
}

fn sim(dev: &mut VirtualDevice<SimOutput>) -> &mut SimOutput {
    dev.handle_mut().expect("device is open")
}

fn ts(ns: i64) -> Event {
    Event::Timestamp {
        code: TimestampSource::AccelTs,
        value: ns,
    }
}

fn rumble(weak: u16, strong: u16) -> FfEffect {
    FfEffect {
        id: 0,
        kind: FfEffectKind::Rumble {
            strong_magnitude: strong,
            weak_magnitude: weak,
        },
    }
}

fn written_timestamps(dev: &mut VirtualDevice<SimOutput>) -> Vec<i32> {
    sim(dev)
        .written()
        .iter()
        .flatten()
        .filter(|ev| ev.event_type == EV_MSC && ev.code == MSC_TIMESTAMP)
        .map(|ev| ev.value)
        .collect()
}

#[test]
fn events_are_mapped_and_written_as_one_group() {
    let (mut dev, _) = open(GamepadCfg::default());
    dev.consume(&[
        Event::Axis {
            code: Axis::LsX,
            value: 0.5,
        },
        Event::Button {
            code: Button::A,
            value: true,
        },
        Event::Axis {
            code: Axis::Rt,
            value: 2.0,
        },
    ])
    .unwrap();
    assert_eq!(
        sim(&mut dev).written(),
        &[vec![
            RawEvent::new(EV_ABS, ABS_X, 16384),
            RawEvent::new(EV_KEY, BTN_SOUTH, 1),
            RawEvent::new(EV_ABS, ABS_RZ, 1023),
        ]]
    );
}

#[test]
fn unmapped_events_are_dropped() {
    let (mut dev, _) = open(GamepadCfg::default());
    dev.consume(&[
        Event::Button {
            code: Button::DpadUp,
            value: true,
        },
        Event::Axis {
            code: Axis::GyroX,
            value: 0.3,
        },
        Event::Rumble(crate::event::Rumble::stop()),
    ])
    .unwrap();
    // the sync is still written
    assert_eq!(sim(&mut dev).written(), &[Vec::<RawEvent>::new()]);
}

#[test]
fn timestamps_only_written_when_enabled() {
    let (mut dev, _) = open(GamepadCfg::default());
    dev.consume(&[ts(5_000_000)]).unwrap();
    assert!(written_timestamps(&mut dev).is_empty());

    let cfg = GamepadCfg {
        output_timestamps: true,
        ..Default::default()
    };
    let (mut dev, _) = open(cfg);
    dev.consume(&[ts(5_000_000)]).unwrap();
    assert_eq!(written_timestamps(&mut dev), vec![5_000]);
}

#[test]
fn timestamp_offset_resets_past_window() {
    let cfg = GamepadCfg {
        output_timestamps: true,
        ..Default::default()
    };
    let (mut dev, _) = open(cfg);
    let window_ns = TIMESTAMP_WINDOW_US * 1000;
    let big = 3 * window_ns;
    for ns in [1_000, window_ns, big, big + 1_000_000, big + 2_000_000] {
        dev.consume(&[ts(ns)]).unwrap();
    }
    let out = written_timestamps(&mut dev);
    assert_eq!(out, vec![1, 1 << 30, 0, 1_000, 2_000]);
}

#[test]
fn rebase_keeps_values_in_window() {
    let mut ofs = 0;
    assert_eq!(rebase_timestamp(&mut ofs, 999), 0);
    assert_eq!(ofs, 0);
    let jump = (TIMESTAMP_WINDOW_US + 1) * 1000;
    assert_eq!(rebase_timestamp(&mut ofs, jump), 0);
    assert_eq!(ofs, TIMESTAMP_WINDOW_US + 1);
    let mut last = 0;
    for step in 1..100 {
        let v = rebase_timestamp(&mut ofs, jump + step * 7_919_000);
        assert!(v >= 0 && v > last);
        last = v;
    }
}

#[test]
fn reopening_resets_timestamp_offset() {
    let cfg = GamepadCfg {
        output_timestamps: true,
        ..Default::default()
    };
    let (mut dev, _) = open(cfg);
    let late = (TIMESTAMP_WINDOW_US + 10) * 1000;
    dev.consume(&[ts(late)]).unwrap();
    assert_eq!(written_timestamps(&mut dev), vec![0]);
    dev.close(false);
    dev.open().unwrap();
    dev.consume(&[ts(1_000)]).unwrap();
    assert_eq!(written_timestamps(&mut dev), vec![1]);
}

#[test]
fn uploaded_rumble_is_played() {
    let (mut dev, fds) = open(GamepadCfg::default());
    let out = sim(&mut dev);
    let upload = out.upload_request(rumble(32768, 65535));
    out.push_inbound(vec![upload, RawEvent::new(EV_FF, 0, 1)]);

    let events = dev.produce(&fds).unwrap();
    assert_eq!(events.len(), 1);
    let Event::Rumble(r) = events[0] else {
        panic!("expected rumble, got {events:?}");
    };
    assert!((r.weak_magnitude - 0.5).abs() < 1e-4);
    assert_eq!(r.strong_magnitude, 1.0);
    assert_eq!(sim(&mut dev).acks().len(), 1);
    assert_eq!(sim(&mut dev).acks()[0].1, FfResponse::OK);
}

#[test]
fn stop_without_upload_is_reported() {
    let (mut dev, fds) = open(GamepadCfg::default());
    sim(&mut dev).push_inbound(vec![RawEvent::new(EV_FF, 0, 0)]);
    let events = dev.produce(&fds).unwrap();
    assert_eq!(events, vec![Event::Rumble(crate::event::Rumble::stop())]);
}

#[test]
fn play_without_upload_emits_nothing() {
    let (mut dev, fds) = open(GamepadCfg::default());
    sim(&mut dev).push_inbound(vec![RawEvent::new(EV_FF, 0, 1)]);
    // Only a warning is logged. The test logger is off, so the warning itself is not asserted;
    // the request must not be answered or turned into rumble.
    assert_eq!(dev.produce(&fds).unwrap(), vec![]);
    assert!(sim(&mut dev).acks().is_empty());
    assert!(!sim(&mut dev).has_pending().unwrap());
}

#[test]
fn failed_ff_transaction_keeps_draining() {
    let (mut dev, fds) = open(GamepadCfg::default());
    let out = sim(&mut dev);
    let upload = out.upload_request(rumble(65535, 65535));
    out.push_inbound(vec![
        RawEvent::new(EV_FF, 0, 0),
        RawEvent::new(EV_UINPUT, UI_FF_UPLOAD, 999),
        upload,
        RawEvent::new(EV_FF, 0, 1),
    ]);

    let events = dev.produce(&fds).unwrap();
    assert_eq!(
        events,
        vec![
            Event::Rumble(crate::event::Rumble::stop()),
            Event::Rumble(crate::event::Rumble::from_raw(65535, 65535)),
        ]
    );
    assert_eq!(sim(&mut dev).acks().len(), 1);
    assert!(dev.is_open());
}

#[test]
fn non_rumble_upload_is_acknowledged_but_not_played() {
    let (mut dev, fds) = open(GamepadCfg::default());
    let out = sim(&mut dev);
    let upload = out.upload_request(FfEffect {
        id: 2,
        kind: FfEffectKind::Other,
    });
    out.push_inbound(vec![upload, RawEvent::new(EV_FF, 2, 1)]);
    assert_eq!(dev.produce(&fds).unwrap(), vec![]);
    assert_eq!(sim(&mut dev).acks().len(), 1);
}

#[test]
fn erase_is_acknowledged() {
    let (mut dev, fds) = open(GamepadCfg::default());
    let out = sim(&mut dev);
    let erase = out.erase_request(0);
    out.push_inbound(vec![erase]);
    assert_eq!(dev.produce(&fds).unwrap(), vec![]);
    assert_eq!(
        sim(&mut dev).acks(),
        &[(FfRequest::Erase { effect_id: 0 }, FfResponse::OK)]
    );
}

#[test]
fn echoes_and_settings_are_not_rumble() {
    let (mut dev, fds) = open(GamepadCfg::default());
    sim(&mut dev).push_inbound(vec![
        RawEvent::new(EV_MSC, MSC_TIMESTAMP, 1234),
        RawEvent::new(EV_FF, FF_GAIN, 0xffff),
        RawEvent::new(EV_FF, FF_AUTOCENTER, 0),
        SYN,
    ]);
    assert_eq!(dev.produce(&fds).unwrap(), vec![]);
}

#[test]
fn everything_pending_is_drained() {
    let (mut dev, fds) = open(GamepadCfg::default());
    let out = sim(&mut dev);
    let upload = out.upload_request(rumble(65535, 0));
    out.push_inbound(vec![upload]);
    out.push_inbound(vec![RawEvent::new(EV_FF, 0, 1)]);
    out.push_inbound(vec![RawEvent::new(EV_FF, 0, 0)]);

    let events = dev.produce(&fds).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1], Event::Rumble(crate::event::Rumble::stop()));
    assert!(!sim(&mut dev).has_pending().unwrap());
}

#[test]
fn produce_ignores_unrelated_readiness() {
    let (mut dev, fds) = open(GamepadCfg::default());
    sim(&mut dev).push_inbound(vec![RawEvent::new(EV_FF, 0, 0)]);
    assert_eq!(dev.produce(&[]).unwrap(), vec![]);
    assert_eq!(dev.produce(&[fds[0] + 1_000_000]).unwrap(), vec![]);
    // still queued for when the descriptor is reported ready
    assert_eq!(dev.produce(&fds).unwrap().len(), 1);
}

#[test]
fn open_is_idempotent_and_close_always_succeeds() {
    init_log();
    let mut dev: VirtualDevice<SimOutput> = VirtualDevice::new(GamepadCfg::default());
    assert!(dev.close(true));
    let fds = dev.open().unwrap();
    assert_eq!(dev.open().unwrap(), fds);
    assert!(dev.close(true));
    assert!(!dev.is_open());
    assert!(dev.close(false));
}

#[test]
fn closed_device_ignores_io() {
    init_log();
    let mut dev: VirtualDevice<SimOutput> = VirtualDevice::new(GamepadCfg::default());
    dev.consume(&[Event::Button {
        code: Button::A,
        value: true,
    }])
    .unwrap();
    assert_eq!(dev.produce(&[1000]).unwrap(), vec![]);
}
