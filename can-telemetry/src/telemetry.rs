//! Consumer-facing telemetry snapshot
//!
//! A [`TelemetrySnapshot`] is a plain copy of every decoded field group. The
//! polling loop publishes whole snapshots into a [`SharedTelemetry`] cell and
//! readers (a UI thread, a report writer) copy them out, so nobody ever sees
//! half of a field group.

use crate::decoders::{BatteryMessage1, BatteryMessage2, BlinkerStatus, MotorStatus};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Every decoded field at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub battery_message1: BatteryMessage1,
    pub battery_message2: BatteryMessage2,
    pub motor: MotorStatus,
    pub blinkers: BlinkerStatus,
    /// Whether the bus session was ready when the snapshot was taken
    pub bus_ready: bool,
    /// Frames discarded by the session because its queue was full
    pub dropped_frames: u64,
    /// Receive time of the last frame that decoded successfully
    pub last_update: Option<Timestamp>,
}

/// Single-writer / multi-reader cell holding the latest snapshot
#[derive(Debug, Clone, Default)]
pub struct SharedTelemetry {
    inner: Arc<RwLock<TelemetrySnapshot>>,
}

impl SharedTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored snapshot
    pub fn publish(&self, snapshot: TelemetrySnapshot) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }

    /// Copy of the latest snapshot
    pub fn latest(&self) -> TelemetrySnapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
