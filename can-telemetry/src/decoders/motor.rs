//! Motor controller decoder (0x003)

use super::DecodeStats;
use crate::codec::require_len;
use crate::types::{DecodeError, MessageKind};
use serde::{Deserialize, Serialize};

/// Fields carried by the motor controller message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorStatus {
    /// Vehicle speed, raw byte 0
    pub speed: u8,
}

impl MotorStatus {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        require_len(payload, MessageKind::MotorStatus.payload_len())?;
        Ok(Self { speed: payload[0] })
    }

    pub fn encode(&self) -> [u8; 1] {
        [self.speed]
    }
}

/// Motor controller decoder
#[derive(Debug, Clone, Default)]
pub struct MotorDecoder {
    status: MotorStatus,
    stats: DecodeStats,
}

impl MotorDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, payload: &[u8]) -> Result<(), DecodeError> {
        self.status = self.stats.record(MotorStatus::decode(payload))?;
        Ok(())
    }

    pub fn status(&self) -> MotorStatus {
        self.status
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn speed(&self) -> u8 {
        self.status.speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_speed() {
        let mut mcu = MotorDecoder::new();
        mcu.decode(&[88, 0xFF]).unwrap();
        assert_eq!(mcu.speed(), 88);
        assert!(mcu.stats().has_value());
    }

    #[test]
    fn test_empty_payload_keeps_speed() {
        let mut mcu = MotorDecoder::new();
        mcu.decode(&[42]).unwrap();

        let err = mcu.decode(&[]).unwrap_err();
        assert_eq!(err, DecodeError::ShortPayload { needed: 1, actual: 0 });
        assert_eq!(mcu.speed(), 42);
    }
}
