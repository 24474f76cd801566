//! CAN Telemetry Library
//!
//! Reads frames from a vehicle CAN bus, routes them by arbitration id to the
//! matching decoder and exposes the decoded physical values (pack voltage and
//! current, temperatures, state of charge, speed, blinkers) to a consumer.
//!
//! # Architecture
//!
//! - [`codec`]: byte combination, two's complement and fixed-point scaling
//! - [`decoders`]: battery (0x001/0x002), motor (0x003) and blinker (0x004)
//!   decoders with last-good-value semantics
//! - [`session`]: bus lifecycle, buffered receive, blocking send
//! - [`controller`]: owns a session and the decoders, `poll()` = read + dispatch
//! - [`transport`]: bring-up and driver collaborators (virtual bus, SocketCAN)
//!
//! The library does NOT:
//! - Render anything (a dashboard polls [`Controller::snapshot`])
//! - Schedule transmissions (a single blocking `send` is provided)
//! - Retry a failed bring-up on its own
//!
//! # Example Usage
//!
//! ```no_run
//! use can_telemetry::{BusConfig, Controller, PollOutcome};
//!
//! let (mut controller, bus) = Controller::open_virtual(BusConfig::new().with_interface("vcan0"));
//! bus.inject_raw(0x003, &[42]).unwrap();
//!
//! match controller.poll() {
//!     Ok(PollOutcome::Decoded(kind)) => println!("Decoded {}", kind),
//!     Ok(other) => println!("{:?}", other),
//!     Err(e) => eprintln!("Bus error: {}", e),
//! }
//! println!("Speed: {}", controller.motor().speed());
//! ```

// Public modules
pub mod codec;
pub mod config;
pub mod controller;
pub mod decoders;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use config::BusConfig;
pub use controller::{Controller, PollOutcome};
pub use decoders::{
    BatteryDecoder, BatteryMessage1, BatteryMessage2, BlinkerDecoder, BlinkerStatus,
    DecodeStats, FailsafeFlags, MotorDecoder, MotorStatus,
};
pub use session::{BusSession, SessionState};
pub use telemetry::{SharedTelemetry, TelemetrySnapshot};
pub use types::{BusError, DecodeError, Frame, FrameError, MessageKind, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
