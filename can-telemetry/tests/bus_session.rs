// End-to-end tests driving the session and controller over the virtual bus
use can_telemetry::transport::{BringUp, BringUpError, IpLinkBringUp, NoBringUp, VirtualBus};
use can_telemetry::{
    BusConfig, BusError, BusSession, Controller, DecodeError, Frame, MessageKind, PollOutcome,
    SessionState, SharedTelemetry,
};
use std::thread;
use std::time::{Duration, Instant};

fn vcan_config() -> BusConfig {
    BusConfig::new()
        .with_interface("vcan0")
        .with_bring_up(false)
        .with_read_timeout(Duration::from_millis(200))
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

struct FailingBringUp;

impl BringUp for FailingBringUp {
    fn bring_up(&self, _interface: &str, _bitrate: u32) -> Result<(), BringUpError> {
        Err(BringUpError::ExitStatus {
            command: "ip link set vcan0 up".to_string(),
            status: "exit status: 2".to_string(),
        })
    }
}

#[test]
fn test_read_returns_buffered_frames_in_order() {
    let (bus, handle) = VirtualBus::new();
    let mut session = BusSession::new(vcan_config(), bus, NoBringUp);
    session.initialize().unwrap();

    handle.inject_raw(0x003, &[10]).unwrap();
    handle.inject_raw(0x004, &[0, 1, 0]).unwrap();

    let first = session.read(Duration::from_millis(500)).unwrap().unwrap();
    let second = session.read(Duration::from_millis(500)).unwrap().unwrap();
    assert_eq!(first.arbitration_id(), 0x003);
    assert_eq!(second.arbitration_id(), 0x004);
    assert_eq!(second.payload(), &[0, 1, 0]);
}

#[test]
fn test_idle_read_returns_none_without_blocking_past_timeout() {
    let (bus, _handle) = VirtualBus::new();
    let mut session = BusSession::new(vcan_config(), bus, NoBringUp);
    session.initialize().unwrap();

    let started = Instant::now();
    assert_eq!(session.read(Duration::from_millis(30)), Ok(None));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(25), "returned early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(1), "blocked too long: {:?}", elapsed);
}

#[test]
fn test_bring_up_failure_faults_session() {
    let (bus, handle) = VirtualBus::new();
    let config = vcan_config().with_bring_up(true);
    let mut session = BusSession::new(config, bus, FailingBringUp);

    match session.initialize() {
        Err(BusError::InitFailed(cause)) => assert!(cause.contains("exit status: 2")),
        other => panic!("expected InitFailed, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Faulted);
    assert!(session.last_error().is_some());
    // Transport never opened after a failed bring-up
    assert_eq!(handle.open_count(), 0);
    assert_eq!(session.read(Duration::from_millis(10)), Err(BusError::NotReady));
}

#[test]
fn test_open_failure_then_explicit_retry() {
    let (bus, handle) = VirtualBus::new();
    handle.set_fail_open(true);
    let mut session = BusSession::new(vcan_config(), bus, NoBringUp);

    assert!(matches!(session.initialize(), Err(BusError::InitFailed(_))));
    assert_eq!(session.state(), SessionState::Faulted);

    handle.set_fail_open(false);
    session.initialize().unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.last_error(), None);
}

#[test]
fn test_send_reaches_bus_and_reports_rejection() {
    let (bus, handle) = VirtualBus::new();
    let mut session = BusSession::new(vcan_config(), bus, NoBringUp);
    session.initialize().unwrap();

    let frame = Frame::new(0x010, &[0xAA, 0x55]).unwrap();
    session.send(&frame, Duration::from_millis(50)).unwrap();
    assert_eq!(handle.sent_frames(), vec![frame.clone()]);

    handle.set_fail_send(true);
    assert!(matches!(
        session.send(&frame, Duration::from_millis(50)),
        Err(BusError::SendFailed(_))
    ));
    // A rejected send does not fault the session
    assert!(session.is_ready());
}

#[test]
fn test_full_queue_drops_frames() {
    let (bus, handle) = VirtualBus::new();
    let config = vcan_config().with_queue_capacity(2);
    let mut session = BusSession::new(config, bus, NoBringUp);

    for speed in 0..5u8 {
        handle.inject_raw(0x003, &[speed]).unwrap();
    }
    session.initialize().unwrap();

    wait_until(|| session.dropped_frames() == 3);
    assert_eq!(handle.pending(), 0);

    let first = session.read(Duration::from_millis(100)).unwrap().unwrap();
    let second = session.read(Duration::from_millis(100)).unwrap().unwrap();
    assert_eq!(first.payload(), &[0]);
    assert_eq!(second.payload(), &[1]);
    assert_eq!(session.read(Duration::from_millis(20)), Ok(None));
}

#[test]
fn test_transport_loss_faults_session() {
    let (bus, handle) = VirtualBus::new();
    let mut session = BusSession::new(vcan_config(), bus, NoBringUp);
    session.initialize().unwrap();

    handle.disconnect();
    assert_eq!(session.read(Duration::from_secs(1)), Err(BusError::NotReady));
    assert_eq!(session.state(), SessionState::Faulted);

    session.initialize().unwrap();
    assert!(session.is_ready());
    assert_eq!(handle.open_count(), 2);
}

#[test]
fn test_reconnect_with_interface_left_up() {
    let sysfs = tempfile::TempDir::new().unwrap();
    let iface = sysfs.path().join("cantlm-up0");
    std::fs::create_dir(&iface).unwrap();
    std::fs::write(iface.join("flags"), "0x40c1\n").unwrap();

    let (bus, handle) = VirtualBus::new();
    let config = vcan_config()
        .with_interface("cantlm-up0")
        .with_bring_up(true);
    let bring_up = IpLinkBringUp::new().with_sysfs_net(sysfs.path());
    let mut session = BusSession::new(config, bus, bring_up);
    session.initialize().unwrap();

    handle.disconnect();
    assert_eq!(session.read(Duration::from_secs(1)), Err(BusError::NotReady));
    assert_eq!(session.state(), SessionState::Faulted);

    session.initialize().unwrap();
    assert!(session.is_ready());
    assert_eq!(handle.open_count(), 2);
}

#[test]
fn test_controller_poll_decodes_vehicle_traffic() {
    let (mut controller, bus) = Controller::open_virtual(vcan_config());
    assert!(controller.is_ready());

    bus.inject_raw(0x001, &[0, 0, 0xFF, 0x38, 0, 0, 25, 3]).unwrap();
    bus.inject_raw(0x002, &[57, 30, 0x00, 0x64, 80]).unwrap();
    bus.inject_raw(0x003, &[64]).unwrap();
    bus.inject_raw(0x004, &[0, 0, 1]).unwrap();
    bus.inject_raw(0x7FF, &[1, 2, 3]).unwrap();

    let outcomes: Vec<PollOutcome> = (0..5).map(|_| controller.poll().unwrap()).collect();
    assert_eq!(
        outcomes,
        vec![
            PollOutcome::Decoded(MessageKind::BatteryStatus1),
            PollOutcome::Decoded(MessageKind::BatteryStatus2),
            PollOutcome::Decoded(MessageKind::MotorStatus),
            PollOutcome::Decoded(MessageKind::Blinkers),
            PollOutcome::Ignored(0x7FF),
        ]
    );

    let battery = controller.battery();
    assert_eq!(battery.voltage(), -20.0);
    assert_eq!(battery.highest_temperature(), 25);
    assert_eq!(battery.state_of_charge(), 28.5);
    assert_eq!(battery.avg_pack_current(), 10.0);
    assert_eq!(battery.fan_speed(), 80);
    assert_eq!(controller.motor().speed(), 64);
    assert_eq!(controller.blinkers().left(), 1);
    assert!(controller.snapshot().last_update.is_some());
}

#[test]
fn test_controller_poll_reports_rejected_frames() {
    let (mut controller, bus) = Controller::open_virtual(vcan_config());

    bus.inject_raw(0x003, &[50]).unwrap();
    bus.inject_raw(0x003, &[]).unwrap();

    assert_eq!(controller.poll(), Ok(PollOutcome::Decoded(MessageKind::MotorStatus)));
    assert_eq!(
        controller.poll(),
        Ok(PollOutcome::Rejected {
            kind: MessageKind::MotorStatus,
            error: DecodeError::ShortPayload { needed: 1, actual: 0 },
        })
    );
    assert_eq!(controller.motor().speed(), 50);
    assert_eq!(controller.motor().stats().rejected, 1);
}

#[test]
fn test_controller_poll_idle() {
    let (mut controller, _bus) = Controller::open_virtual(vcan_config());
    assert_eq!(
        controller.poll_timeout(Duration::from_millis(10)),
        Ok(PollOutcome::Idle)
    );
}

#[test]
fn test_worker_thread_publishes_snapshots() {
    let (mut controller, bus) = Controller::open_virtual(vcan_config());
    let shared = SharedTelemetry::new();

    let publisher = shared.clone();
    let worker = thread::spawn(move || {
        for _ in 0..20 {
            if let Ok(PollOutcome::Decoded(_)) = controller.poll_timeout(Duration::from_millis(50)) {
                controller.publish_to(&publisher);
            }
        }
    });

    bus.inject_raw(0x003, &[99]).unwrap();
    wait_until(|| shared.latest().motor.speed == 99);
    worker.join().unwrap();

    assert!(shared.latest().bus_ready);
}
