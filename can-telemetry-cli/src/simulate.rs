//! Simulated vehicle traffic for `--virtual` mode
//!
//! Puts a plausible stream of BMS, motor and blinker frames on a virtual bus
//! so the dashboard can be exercised without hardware.

use can_telemetry::transport::VirtualBusHandle;
use can_telemetry::{
    BatteryMessage1, BatteryMessage2, BlinkerStatus, FailsafeFlags, Frame, MessageKind,
    MotorStatus,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Period between simulated frame bursts
pub const TICK: Duration = Duration::from_millis(100);

/// Blinkers toggle every this many ticks
const BLINK_TICKS: u64 = 5;

/// Frames the simulated vehicle emits on a given tick
pub fn vehicle_frames(tick: u64) -> Vec<Frame> {
    let phase = (tick % 200) as f64 / 200.0;
    let load = (phase * std::f64::consts::TAU).sin();

    let bms1 = BatteryMessage1 {
        failsafe: FailsafeFlags {
            cell_balancing_active: tick % 100 < 20,
            ..FailsafeFlags::default()
        },
        voltage: 396.0 - 4.0 * load,
        current: 120.0 * load,
        highest_temperature: 30 + (tick / 50 % 10) as u8,
        highest_temperature_thermistor_id: (tick / 30 % 12) as u8,
    };
    let bms2 = BatteryMessage2 {
        state_of_charge: 100.0 - (tick / 10 % 200) as f64 * 0.5,
        avg_battery_temperature: 28,
        avg_pack_current: 60.0 * load,
        fan_speed: if bms1.highest_temperature > 35 { 180 } else { 60 },
    };
    let motor = MotorStatus {
        speed: (60.0 + 40.0 * load) as u8,
    };
    let blink_on = (tick / BLINK_TICKS) % 2 == 0;
    let blinkers = BlinkerStatus {
        hazard: 0,
        right: 0,
        left: blink_on as u8,
    };

    let bms1 = bms1.encode();
    let bms2 = bms2.encode();
    let motor = motor.encode();
    let blinkers = blinkers.encode();
    let payloads: [(MessageKind, &[u8]); 4] = [
        (MessageKind::BatteryStatus1, &bms1[..]),
        (MessageKind::BatteryStatus2, &bms2[..]),
        (MessageKind::MotorStatus, &motor[..]),
        (MessageKind::Blinkers, &blinkers[..]),
    ];

    payloads
        .iter()
        .filter_map(|(kind, payload)| Frame::new(kind.id(), payload).ok())
        .collect()
}

/// Start injecting simulated traffic until `stop` is set
pub fn spawn(bus: VirtualBusHandle, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut tick = 0u64;
        while !stop.load(Ordering::SeqCst) {
            for frame in vehicle_frames(tick) {
                bus.inject(frame);
            }
            tick += 1;
            thread::sleep(TICK);
        }
        log::debug!("Simulated vehicle stopped after {} ticks", tick);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_telemetry::Controller;

    #[test]
    fn test_every_message_is_emitted() {
        let frames = vehicle_frames(0);
        let ids: Vec<u16> = frames.iter().map(|f| f.arbitration_id()).collect();
        assert_eq!(ids, vec![0x001, 0x002, 0x003, 0x004]);
    }

    #[test]
    fn test_frames_decode_cleanly() {
        let (mut controller, _bus) = Controller::open_virtual(Default::default());
        for tick in [0, 7, 123, 999] {
            for frame in vehicle_frames(tick) {
                assert!(controller.dispatch(&frame).unwrap().is_some());
            }
        }
        assert!(controller.battery().voltage() > 390.0);
    }

    #[test]
    fn test_left_blinker_toggles() {
        let on = BlinkerStatus::decode(vehicle_frames(0)[3].payload()).unwrap();
        let off = BlinkerStatus::decode(vehicle_frames(BLINK_TICKS)[3].payload()).unwrap();
        assert!(on.left_on());
        assert!(!off.left_on());
    }
}
