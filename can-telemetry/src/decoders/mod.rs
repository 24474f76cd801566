//! Message decoders
//!
//! One decoder per device class. Each decoder owns the last successfully
//! decoded value of its fields; a failed decode leaves them untouched.

pub mod battery;
pub mod blinker;
pub mod motor;

pub use battery::{BatteryDecoder, BatteryMessage1, BatteryMessage2, FailsafeFlags};
pub use blinker::{BlinkerDecoder, BlinkerStatus};
pub use motor::{MotorDecoder, MotorStatus};

use crate::types::DecodeError;
use serde::{Deserialize, Serialize};

/// Accept/reject counters for one message field group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStats {
    /// Frames decoded successfully
    pub accepted: u64,
    /// Frames rejected (fields left unchanged)
    pub rejected: u64,
}

impl DecodeStats {
    /// True once at least one frame has been decoded
    pub fn has_value(&self) -> bool {
        self.accepted > 0
    }

    /// Record the outcome of a decode attempt and pass it through
    pub(crate) fn record<T>(&mut self, result: Result<T, DecodeError>) -> Result<T, DecodeError> {
        match result {
            Ok(value) => {
                self.accepted += 1;
                Ok(value)
            }
            Err(e) => {
                self.rejected += 1;
                Err(e)
            }
        }
    }
}
