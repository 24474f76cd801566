//! Transport collaborators
//!
//! The session never talks to a driver directly. It runs a [`BringUp`] step,
//! asks a [`Connector`] for a receive/transmit pair and hands the receive side
//! to its notifier thread.
//!
//! Implementations:
//! - [`VirtualBus`]: in-process bus for tests and demo mode
//! - `SocketCanConnector`: Linux SocketCAN (feature `socketcan`)
//! - [`IpLinkBringUp`] / [`NoBringUp`]: interface bring-up

use crate::types::Frame;
use std::io;
use std::time::Duration;

pub mod bring_up;
pub mod virtual_bus;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socket_can;

pub use bring_up::{BringUp, BringUpError, IpLinkBringUp, NoBringUp};
pub use virtual_bus::{VirtualBus, VirtualBusHandle};

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socket_can::SocketCanConnector;

/// Receive side of an open transport
pub trait FrameSource: Send {
    /// Wait up to `timeout` for the next frame
    ///
    /// `Ok(None)` means nothing arrived in time. An error means the transport
    /// is unusable and the caller should stop reading.
    fn recv(&mut self, timeout: Duration) -> io::Result<Option<Frame>>;
}

/// Transmit side of an open transport
pub trait FrameSink: Send {
    /// Transmit one frame, blocking at most `timeout`
    fn send(&mut self, frame: &Frame, timeout: Duration) -> io::Result<()>;
}

/// Opens transports for a named interface
pub trait Connector: Send {
    fn open(&self, interface: &str) -> io::Result<(Box<dyn FrameSource>, Box<dyn FrameSink>)>;
}
