//! Dashboard rendering
//!
//! Turns a telemetry snapshot into one text line or one JSON object per
//! refresh.

use can_telemetry::{FailsafeFlags, TelemetrySnapshot, Timestamp};
use serde::Serialize;

/// Names of the active failsafe flags, in bit order
pub fn active_failsafes(flags: &FailsafeFlags) -> Vec<&'static str> {
    let named = [
        (flags.voltage_failsafe, "voltage"),
        (flags.current_failsafe, "current"),
        (flags.relay_failsafe, "relay"),
        (flags.charge_interlock_failsafe, "charge-interlock"),
        (flags.thermistor_table_invalid, "thermistor-table"),
        (flags.input_power_supply_failsafe, "input-power"),
    ];
    named
        .iter()
        .filter(|(active, _)| *active)
        .map(|(_, name)| *name)
        .collect()
}

fn arrow(on: bool, symbol: &'static str) -> &'static str {
    if on {
        symbol
    } else {
        " "
    }
}

/// One dashboard line
pub fn render_text(snapshot: &TelemetrySnapshot) -> String {
    let bms1 = &snapshot.battery_message1;
    let bms2 = &snapshot.battery_message2;
    let blinkers = &snapshot.blinkers;

    let status = if snapshot.bus_ready { "BUS OK" } else { "NO BUS" };
    let failsafes = active_failsafes(&bms1.failsafe);
    let failsafes = if failsafes.is_empty() {
        "none".to_string()
    } else {
        failsafes.join(",")
    };

    format!(
        "[{}] speed {:>3} | {:>6.1} V {:>6.1} A | SOC {:>5.1}% | T max {:>3} (#{}) avg {:>3} | avg {:>6.1} A | fan {:>3} | {}{}{} | balancing {} | failsafes {}",
        status,
        snapshot.motor.speed,
        bms1.voltage,
        bms1.current,
        bms2.state_of_charge,
        bms1.highest_temperature,
        bms1.highest_temperature_thermistor_id,
        bms2.avg_battery_temperature,
        bms2.avg_pack_current,
        bms2.fan_speed,
        arrow(blinkers.left_on(), "<"),
        arrow(blinkers.hazard_on(), "!"),
        arrow(blinkers.right_on(), ">"),
        if bms1.failsafe.cell_balancing_active { "on" } else { "off" },
        failsafes,
    )
}

#[derive(Serialize)]
struct JsonReport<'a> {
    timestamp: Timestamp,
    telemetry: &'a TelemetrySnapshot,
}

/// One JSON object
pub fn render_json(snapshot: &TelemetrySnapshot, now: Timestamp) -> serde_json::Result<String> {
    serde_json::to_string(&JsonReport {
        timestamp: now,
        telemetry: snapshot,
    })
}
