//! Battery management system decoder
//!
//! The BMS publishes two messages that update disjoint field groups:
//!
//! | ID    | Bytes | Content                                              |
//! |-------|-------|------------------------------------------------------|
//! | 0x001 | 0-1   | Failsafe flags (`byte0 | byte1`)                      |
//! |       | 2-3   | Pack voltage, signed big-endian, 0.1 V               |
//! |       | 4-5   | Pack current, signed big-endian, 0.1 A               |
//! |       | 6     | Highest temperature                                  |
//! |       | 7     | Thermistor id of the highest temperature             |
//! | 0x002 | 0     | State of charge, 0.5 %                               |
//! |       | 1     | Average battery temperature                          |
//! |       | 2-3   | Average pack current, signed big-endian, 0.1 A       |
//! |       | 4     | Fan speed                                            |

use super::DecodeStats;
use crate::codec::{self, require_len};
use crate::types::{DecodeError, MessageKind};
use serde::{Deserialize, Serialize};

/// BMS failsafe status bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailsafeFlags {
    /// Bit 0
    pub voltage_failsafe: bool,
    /// Bit 1
    pub current_failsafe: bool,
    /// Bit 2
    pub relay_failsafe: bool,
    /// Bit 3 (informational, not a failsafe)
    pub cell_balancing_active: bool,
    /// Bit 4
    pub charge_interlock_failsafe: bool,
    /// Bit 5
    pub thermistor_table_invalid: bool,
    /// Bit 6
    pub input_power_supply_failsafe: bool,
}

impl FailsafeFlags {
    /// Unpack the status byte
    pub fn from_bits(bits: u8) -> Self {
        Self {
            voltage_failsafe: bits & 0x01 != 0,
            current_failsafe: (bits >> 1) & 0x01 != 0,
            relay_failsafe: (bits >> 2) & 0x01 != 0,
            cell_balancing_active: (bits >> 3) & 0x01 != 0,
            charge_interlock_failsafe: (bits >> 4) & 0x01 != 0,
            thermistor_table_invalid: (bits >> 5) & 0x01 != 0,
            input_power_supply_failsafe: (bits >> 6) & 0x01 != 0,
        }
    }

    /// Pack the flags back into a status byte
    pub fn bits(&self) -> u8 {
        (self.voltage_failsafe as u8)
            | (self.current_failsafe as u8) << 1
            | (self.relay_failsafe as u8) << 2
            | (self.cell_balancing_active as u8) << 3
            | (self.charge_interlock_failsafe as u8) << 4
            | (self.thermistor_table_invalid as u8) << 5
            | (self.input_power_supply_failsafe as u8) << 6
    }

    /// True if any protective condition is active (cell balancing excluded)
    pub fn any_failsafe(&self) -> bool {
        self.bits() & !0x08 != 0
    }
}

/// Fields carried by BMS message 1 (0x001)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryMessage1 {
    pub failsafe: FailsafeFlags,
    /// Instantaneous pack voltage (V)
    pub voltage: f64,
    /// Instantaneous pack current (A)
    pub current: f64,
    pub highest_temperature: u8,
    pub highest_temperature_thermistor_id: u8,
}

impl BatteryMessage1 {
    /// Decode the field group from a raw payload
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        require_len(payload, MessageKind::BatteryStatus1.payload_len())?;

        let voltage = codec::to_signed_16(codec::combine_be16(payload[2], payload[3]));
        let current = codec::to_signed_16(codec::combine_be16(payload[4], payload[5]));

        Ok(Self {
            failsafe: FailsafeFlags::from_bits(payload[0] | payload[1]),
            voltage: codec::scale_deci(voltage),
            current: codec::scale_deci(current),
            highest_temperature: payload[6],
            highest_temperature_thermistor_id: payload[7],
        })
    }

    /// Encode the field group into an 8 byte payload
    pub fn encode(&self) -> [u8; 8] {
        let voltage = codec::split_be16(codec::encode_deci(self.voltage));
        let current = codec::split_be16(codec::encode_deci(self.current));
        [
            self.failsafe.bits(),
            0x00,
            voltage[0],
            voltage[1],
            current[0],
            current[1],
            self.highest_temperature,
            self.highest_temperature_thermistor_id,
        ]
    }
}

/// Fields carried by BMS message 2 (0x002)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryMessage2 {
    /// State of charge (%)
    pub state_of_charge: f64,
    pub avg_battery_temperature: u8,
    /// Average pack current (A)
    pub avg_pack_current: f64,
    pub fan_speed: u8,
}

impl BatteryMessage2 {
    /// Decode the field group from a raw payload
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        require_len(payload, MessageKind::BatteryStatus2.payload_len())?;

        let avg_current = codec::to_signed_16(codec::combine_be16(payload[2], payload[3]));

        Ok(Self {
            state_of_charge: codec::scale_half(payload[0]),
            avg_battery_temperature: payload[1],
            avg_pack_current: codec::scale_deci(avg_current),
            fan_speed: payload[4],
        })
    }

    /// Encode the field group into a 5 byte payload
    pub fn encode(&self) -> [u8; 5] {
        let avg_current = codec::split_be16(codec::encode_deci(self.avg_pack_current));
        [
            codec::encode_half(self.state_of_charge),
            self.avg_battery_temperature,
            avg_current[0],
            avg_current[1],
            self.fan_speed,
        ]
    }
}

/// Battery management system decoder (0x001 and 0x002)
#[derive(Debug, Clone, Default)]
pub struct BatteryDecoder {
    message1: BatteryMessage1,
    message2: BatteryMessage2,
    message1_stats: DecodeStats,
    message2_stats: DecodeStats,
}

impl BatteryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a payload by arbitration id
    ///
    /// Returns `Ok(false)` if the id does not belong to the BMS.
    pub fn decode(&mut self, arbitration_id: u16, payload: &[u8]) -> Result<bool, DecodeError> {
        match MessageKind::from_id(arbitration_id) {
            Some(MessageKind::BatteryStatus1) => self.decode_message1(payload).map(|_| true),
            Some(MessageKind::BatteryStatus2) => self.decode_message2(payload).map(|_| true),
            _ => Ok(false),
        }
    }

    /// Decode BMS message 1 (failsafes, voltage, current, highest temperature)
    pub fn decode_message1(&mut self, payload: &[u8]) -> Result<(), DecodeError> {
        self.message1 = self.message1_stats.record(BatteryMessage1::decode(payload))?;
        Ok(())
    }

    /// Decode BMS message 2 (state of charge, averages, fan speed)
    pub fn decode_message2(&mut self, payload: &[u8]) -> Result<(), DecodeError> {
        self.message2 = self.message2_stats.record(BatteryMessage2::decode(payload))?;
        Ok(())
    }

    pub fn message1(&self) -> BatteryMessage1 {
        self.message1
    }

    pub fn message2(&self) -> BatteryMessage2 {
        self.message2
    }

    pub fn message1_stats(&self) -> DecodeStats {
        self.message1_stats
    }

    pub fn message2_stats(&self) -> DecodeStats {
        self.message2_stats
    }

    pub fn failsafe(&self) -> FailsafeFlags {
        self.message1.failsafe
    }

    pub fn voltage(&self) -> f64 {
        self.message1.voltage
    }

    pub fn current(&self) -> f64 {
        self.message1.current
    }

    pub fn highest_temperature(&self) -> u8 {
        self.message1.highest_temperature
    }

    pub fn highest_temperature_thermistor_id(&self) -> u8 {
        self.message1.highest_temperature_thermistor_id
    }

    pub fn state_of_charge(&self) -> f64 {
        self.message2.state_of_charge
    }

    pub fn avg_battery_temperature(&self) -> u8 {
        self.message2.avg_battery_temperature
    }

    pub fn avg_pack_current(&self) -> f64 {
        self.message2.avg_pack_current
    }

    pub fn fan_speed(&self) -> u8 {
        self.message2.fan_speed
    }
}
