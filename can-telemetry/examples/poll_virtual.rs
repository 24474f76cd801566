//! Poll a virtual bus and print what each frame decoded into
//!
//! Run with: cargo run --example poll_virtual

use can_telemetry::{BatteryMessage1, BusConfig, Controller, FailsafeFlags, PollOutcome};
use std::time::Duration;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let config = BusConfig::new()
        .with_interface("vcan0")
        .with_read_timeout(Duration::from_millis(50));
    let (mut controller, bus) = Controller::open_virtual(config);

    let bms = BatteryMessage1 {
        failsafe: FailsafeFlags::from_bits(0x08),
        voltage: 401.2,
        current: -35.5,
        highest_temperature: 38,
        highest_temperature_thermistor_id: 4,
    };
    bus.inject_raw(0x001, &bms.encode()).unwrap();
    bus.inject_raw(0x002, &[57, 29, 0xFF, 0x9C, 120]).unwrap();
    bus.inject_raw(0x003, &[87]).unwrap();
    bus.inject_raw(0x004, &[0, 1, 0]).unwrap();
    bus.inject_raw(0x010, &[0xDE, 0xAD]).unwrap();

    loop {
        match controller.poll() {
            Ok(PollOutcome::Idle) => break,
            Ok(outcome) => println!("{:?}", outcome),
            Err(e) => {
                eprintln!("Bus error: {}", e);
                break;
            }
        }
    }

    let battery = controller.battery();
    println!("Voltage:      {:.1} V", battery.voltage());
    println!("Current:      {:.1} A", battery.current());
    println!("SOC:          {:.1} %", battery.state_of_charge());
    println!("Avg current:  {:.1} A", battery.avg_pack_current());
    println!("Balancing:    {}", battery.failsafe().cell_balancing_active);
    println!("Speed:        {}", controller.motor().speed());
    println!("Right blinker {}", controller.blinkers().status().right_on());
}
