//! Blinker decoder (0x004)
//!
//! Byte 0 is the hazard flag, byte 1 the right blinker and byte 2 the left
//! blinker. Any nonzero value means "on"; the raw bytes are kept as sent.

use super::DecodeStats;
use crate::codec::require_len;
use crate::types::{DecodeError, MessageKind};
use serde::{Deserialize, Serialize};

/// Fields carried by the blinker message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlinkerStatus {
    pub hazard: u8,
    pub right: u8,
    pub left: u8,
}

impl BlinkerStatus {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        require_len(payload, MessageKind::Blinkers.payload_len())?;
        Ok(Self {
            hazard: payload[0],
            right: payload[1],
            left: payload[2],
        })
    }

    pub fn encode(&self) -> [u8; 3] {
        [self.hazard, self.right, self.left]
    }

    pub fn hazard_on(&self) -> bool {
        self.hazard != 0
    }

    pub fn right_on(&self) -> bool {
        self.right != 0
    }

    pub fn left_on(&self) -> bool {
        self.left != 0
    }
}

/// Blinker decoder
#[derive(Debug, Clone, Default)]
pub struct BlinkerDecoder {
    status: BlinkerStatus,
    stats: DecodeStats,
}

impl BlinkerDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update all three flags from one frame
    pub fn decode(&mut self, payload: &[u8]) -> Result<(), DecodeError> {
        self.status = self.stats.record(BlinkerStatus::decode(payload))?;
        Ok(())
    }

    pub fn status(&self) -> BlinkerStatus {
        self.status
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn hazard(&self) -> u8 {
        self.status.hazard
    }

    pub fn right(&self) -> u8 {
        self.status.right
    }

    pub fn left(&self) -> u8 {
        self.status.left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_flags() {
        let mut blinkers = BlinkerDecoder::new();
        blinkers.decode(&[0, 1, 0]).unwrap();

        assert_eq!(blinkers.hazard(), 0);
        assert_eq!(blinkers.right(), 1);
        assert_eq!(blinkers.left(), 0);
        assert!(blinkers.status().right_on());
        assert!(!blinkers.status().left_on());
    }

    #[test]
    fn test_nonzero_means_on() {
        let status = BlinkerStatus::decode(&[0x80, 0, 0xFF]).unwrap();
        assert!(status.hazard_on());
        assert!(status.left_on());
        assert_eq!(status.hazard, 0x80);
    }

    #[test]
    fn test_partial_frame_is_all_or_nothing() {
        let mut blinkers = BlinkerDecoder::new();
        blinkers.decode(&[1, 1, 1]).unwrap();

        assert!(blinkers.decode(&[0, 0]).is_err());
        assert_eq!(blinkers.status(), BlinkerStatus { hazard: 1, right: 1, left: 1 });
    }
}
