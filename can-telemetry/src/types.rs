//! Core types for the CAN telemetry library
//!
//! This module defines the frame type shared by the transport, session and
//! decoders, the message identifiers the controller routes on, and every
//! error the library can surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the library
pub type Timestamp = DateTime<Utc>;

/// Highest valid 11-bit (standard) arbitration identifier
pub const MAX_STANDARD_ID: u16 = 0x7FF;

/// Maximum payload length of a classic CAN frame
pub const MAX_PAYLOAD_LEN: usize = 8;

/// A classic CAN frame as received from (or sent to) the bus
///
/// Frames are immutable once built: the arbitration id and payload are
/// validated on construction and only exposed through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    arbitration_id: u16,
    payload: Vec<u8>,
    received_at: Timestamp,
}

impl Frame {
    /// Build a frame stamped with the current time
    pub fn new(arbitration_id: u16, payload: &[u8]) -> Result<Self, FrameError> {
        Self::with_timestamp(arbitration_id, payload, Utc::now())
    }

    /// Build a frame with an explicit receive timestamp
    pub fn with_timestamp(
        arbitration_id: u16,
        payload: &[u8],
        received_at: Timestamp,
    ) -> Result<Self, FrameError> {
        if arbitration_id > MAX_STANDARD_ID {
            return Err(FrameError::IdOutOfRange(arbitration_id as u32));
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLong(payload.len()));
        }

        Ok(Self {
            arbitration_id,
            payload: payload.to_vec(),
            received_at,
        })
    }

    /// Arbitration identifier (lower value = higher priority)
    pub fn arbitration_id(&self) -> u16 {
        self.arbitration_id
    }

    /// Payload bytes, `payload()[0]` is the first byte on the wire
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Data length code - number of payload bytes
    pub fn dlc(&self) -> usize {
        self.payload.len()
    }

    /// When the frame was received (or built, for outgoing frames)
    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X} [{}]", self.arbitration_id, self.dlc())?;
        for byte in &self.payload {
            write!(f, " {:02X}", byte)?;
        }
        Ok(())
    }
}

/// Messages understood by the controller, keyed by arbitration id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// BMS message 1: failsafes, pack voltage/current, highest temperature
    BatteryStatus1,
    /// BMS message 2: state of charge, averages, fan speed
    BatteryStatus2,
    /// Motor controller: vehicle speed
    MotorStatus,
    /// Hazard / right / left blinker flags
    Blinkers,
}

impl MessageKind {
    pub const BATTERY_STATUS_1_ID: u16 = 0x001;
    pub const BATTERY_STATUS_2_ID: u16 = 0x002;
    pub const MOTOR_STATUS_ID: u16 = 0x003;
    pub const BLINKERS_ID: u16 = 0x004;

    /// All known messages, in arbitration priority order
    pub const ALL: [MessageKind; 4] = [
        MessageKind::BatteryStatus1,
        MessageKind::BatteryStatus2,
        MessageKind::MotorStatus,
        MessageKind::Blinkers,
    ];

    /// Look up the message carried by an arbitration id
    pub fn from_id(arbitration_id: u16) -> Option<Self> {
        match arbitration_id {
            Self::BATTERY_STATUS_1_ID => Some(MessageKind::BatteryStatus1),
            Self::BATTERY_STATUS_2_ID => Some(MessageKind::BatteryStatus2),
            Self::MOTOR_STATUS_ID => Some(MessageKind::MotorStatus),
            Self::BLINKERS_ID => Some(MessageKind::Blinkers),
            _ => None,
        }
    }

    /// Arbitration id of this message
    pub fn id(self) -> u16 {
        match self {
            MessageKind::BatteryStatus1 => Self::BATTERY_STATUS_1_ID,
            MessageKind::BatteryStatus2 => Self::BATTERY_STATUS_2_ID,
            MessageKind::MotorStatus => Self::MOTOR_STATUS_ID,
            MessageKind::Blinkers => Self::BLINKERS_ID,
        }
    }

    /// Minimum payload length the decoder for this message needs
    pub fn payload_len(self) -> usize {
        match self {
            MessageKind::BatteryStatus1 => 8,
            MessageKind::BatteryStatus2 => 5,
            MessageKind::MotorStatus => 1,
            MessageKind::Blinkers => 3,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::BatteryStatus1 => write!(f, "BatteryStatus1"),
            MessageKind::BatteryStatus2 => write!(f, "BatteryStatus2"),
            MessageKind::MotorStatus => write!(f, "MotorStatus"),
            MessageKind::Blinkers => write!(f, "Blinkers"),
        }
    }
}

/// Errors raised while building a frame
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Arbitration id 0x{0:X} exceeds the 11-bit range")]
    IdOutOfRange(u32),

    #[error("Payload of {0} bytes exceeds the 8 byte CAN limit")]
    PayloadTooLong(usize),
}

/// Errors raised by the message decoders
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Payload too short: need {needed} bytes, got {actual}")]
    ShortPayload { needed: usize, actual: usize },
}

/// Errors raised by the bus session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("Bus initialization failed: {0}")]
    InitFailed(String),

    #[error("Bus session is not ready")]
    NotReady,

    #[error("Failed to send frame: {0}")]
    SendFailed(String),
}
