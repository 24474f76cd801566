//! Controller facade
//!
//! The [`Controller`] owns the bus session and one decoder per device class.
//! External callers drive it by calling [`Controller::poll`] from their own
//! loop (a UI tick, a worker thread) and read decoded values through the
//! decoder accessors or [`Controller::snapshot`].

use crate::config::BusConfig;
use crate::decoders::{BatteryDecoder, BlinkerDecoder, MotorDecoder};
use crate::session::{BusSession, SessionState};
use crate::telemetry::{SharedTelemetry, TelemetrySnapshot};
use crate::transport::{BringUp, Connector, NoBringUp, VirtualBus, VirtualBusHandle};
use crate::types::{BusError, DecodeError, Frame, MessageKind, Timestamp};
use std::time::Duration;

/// What a single `poll` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No frame arrived within the read timeout
    Idle,
    /// A frame was decoded into its message's field group
    Decoded(MessageKind),
    /// A frame with an unknown arbitration id was dropped
    Ignored(u16),
    /// A known frame failed to decode; its field group is unchanged
    Rejected {
        kind: MessageKind,
        error: DecodeError,
    },
}

/// One bus session plus the decoders fed from it
#[derive(Debug)]
pub struct Controller {
    session: BusSession,
    battery: BatteryDecoder,
    motor: MotorDecoder,
    blinkers: BlinkerDecoder,
    last_update: Option<Timestamp>,
}

impl Controller {
    /// Take ownership of a session and try to initialize it
    ///
    /// Initialization failure is logged, not returned: the controller stays
    /// usable in the `Faulted` state and `poll`/`send` report `NotReady`.
    pub fn new(mut session: BusSession) -> Self {
        if let Err(e) = session.initialize() {
            log::error!(
                "CAN bus {} unavailable: {}",
                session.config().interface,
                e
            );
        }

        Self {
            session,
            battery: BatteryDecoder::new(),
            motor: MotorDecoder::new(),
            blinkers: BlinkerDecoder::new(),
            last_update: None,
        }
    }

    /// Build a controller over a connector and bring-up step
    pub fn open(
        config: BusConfig,
        connector: impl Connector + 'static,
        bring_up: impl BringUp + 'static,
    ) -> Self {
        Self::new(BusSession::new(config, connector, bring_up))
    }

    /// Build a controller on an in-process virtual bus
    pub fn open_virtual(config: BusConfig) -> (Self, VirtualBusHandle) {
        let (bus, handle) = VirtualBus::new();
        (Self::open(config, bus, NoBringUp), handle)
    }

    /// Build a controller on a Linux SocketCAN interface
    #[cfg(all(target_os = "linux", feature = "socketcan"))]
    pub fn open_socketcan(config: BusConfig) -> Self {
        use crate::transport::{IpLinkBringUp, SocketCanConnector};
        Self::open(config, SocketCanConnector, IpLinkBringUp::new())
    }

    /// Read one frame (waiting up to the configured read timeout) and
    /// dispatch it
    pub fn poll(&mut self) -> Result<PollOutcome, BusError> {
        let timeout = self.session.config().read_timeout();
        self.poll_timeout(timeout)
    }

    /// Read one frame with an explicit timeout and dispatch it
    pub fn poll_timeout(&mut self, timeout: Duration) -> Result<PollOutcome, BusError> {
        let frame = match self.session.read(timeout)? {
            Some(frame) => frame,
            None => return Ok(PollOutcome::Idle),
        };

        let id = frame.arbitration_id();
        let outcome = match MessageKind::from_id(id) {
            None => {
                log::trace!("Unknown arbitration id 0x{:03X}, dropping", id);
                PollOutcome::Ignored(id)
            }
            Some(kind) => match self.decode(kind, &frame) {
                Ok(()) => PollOutcome::Decoded(kind),
                Err(error) => {
                    log::warn!("Rejected {} ({}): {}", kind, frame, error);
                    PollOutcome::Rejected { kind, error }
                }
            },
        };
        Ok(outcome)
    }

    /// Route a frame to its decoder by arbitration id
    ///
    /// Returns `Ok(None)` for identifiers no decoder handles.
    pub fn dispatch(&mut self, frame: &Frame) -> Result<Option<MessageKind>, DecodeError> {
        match MessageKind::from_id(frame.arbitration_id()) {
            Some(kind) => self.decode(kind, frame).map(|_| Some(kind)),
            None => Ok(None),
        }
    }

    fn decode(&mut self, kind: MessageKind, frame: &Frame) -> Result<(), DecodeError> {
        let payload = frame.payload();
        match kind {
            MessageKind::BatteryStatus1 => self.battery.decode_message1(payload)?,
            MessageKind::BatteryStatus2 => self.battery.decode_message2(payload)?,
            MessageKind::MotorStatus => self.motor.decode(payload)?,
            MessageKind::Blinkers => self.blinkers.decode(payload)?,
        }

        log::debug!("Decoded {} from {}", kind, frame);
        self.last_update = Some(frame.received_at());
        Ok(())
    }

    /// Transmit a frame with the configured send timeout
    pub fn send(&mut self, frame: &Frame) -> Result<(), BusError> {
        let timeout = self.session.config().send_timeout();
        self.session.send(frame, timeout)
    }

    /// Retry initialization of a faulted (or shut down) session
    pub fn reinitialize(&mut self) -> Result<(), BusError> {
        self.session.initialize()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &BusSession {
        &self.session
    }

    pub fn battery(&self) -> &BatteryDecoder {
        &self.battery
    }

    pub fn motor(&self) -> &MotorDecoder {
        &self.motor
    }

    pub fn blinkers(&self) -> &BlinkerDecoder {
        &self.blinkers
    }

    /// Copy of every decoded field
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            battery_message1: self.battery.message1(),
            battery_message2: self.battery.message2(),
            motor: self.motor.status(),
            blinkers: self.blinkers.status(),
            bus_ready: self.session.is_ready(),
            dropped_frames: self.session.dropped_frames(),
            last_update: self.last_update,
        }
    }

    /// Publish the current snapshot for readers on other threads
    pub fn publish_to(&self, shared: &SharedTelemetry) {
        shared.publish(self.snapshot());
    }

    /// Release the bus
    pub fn shutdown(&mut self) {
        self.session.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: u16, payload: &[u8]) -> Frame {
        Frame::new(id, payload).unwrap()
    }

    fn offline_controller() -> Controller {
        let (bus, handle) = VirtualBus::new();
        handle.set_fail_open(true);
        Controller::open(BusConfig::new().with_bring_up(false), bus, NoBringUp)
    }

    #[test]
    fn test_dispatch_routes_by_id() {
        let mut controller = offline_controller();

        assert_eq!(
            controller.dispatch(&frame(0x003, &[72])),
            Ok(Some(MessageKind::MotorStatus))
        );
        assert_eq!(
            controller.dispatch(&frame(0x004, &[1, 0, 1])),
            Ok(Some(MessageKind::Blinkers))
        );
        assert_eq!(controller.dispatch(&frame(0x123, &[1, 2, 3])), Ok(None));

        assert_eq!(controller.motor().speed(), 72);
        assert_eq!(controller.blinkers().hazard(), 1);
        assert_eq!(controller.blinkers().left(), 1);
    }

    #[test]
    fn test_decode_failure_is_local() {
        let mut controller = offline_controller();
        controller.dispatch(&frame(0x003, &[30])).unwrap();

        let err = controller.dispatch(&frame(0x001, &[0, 0, 1])).unwrap_err();
        assert_eq!(err, DecodeError::ShortPayload { needed: 8, actual: 3 });
        assert_eq!(controller.motor().speed(), 30);
        assert_eq!(controller.battery().voltage(), 0.0);
    }

    #[test]
    fn test_faulted_controller_stays_usable() {
        let mut controller = offline_controller();

        assert_eq!(controller.state(), SessionState::Faulted);
        assert_eq!(controller.poll(), Err(BusError::NotReady));
        assert_eq!(controller.send(&frame(0x003, &[1])), Err(BusError::NotReady));
        assert!(!controller.snapshot().bus_ready);
    }
}
