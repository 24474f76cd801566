//! Linux SocketCAN transport
//!
//! Opens two raw CAN sockets on the interface: one owned by the session's
//! notifier thread for reading, one kept by the session for transmitting.

use super::{Connector, FrameSink, FrameSource};
use crate::types::Frame;
use socketcan::{
    CanFrame as SocketCanFrame, CanSocket, EmbeddedFrame, Frame as _, Socket, StandardId,
};
use std::io;
use std::time::Duration;

/// Connector for Linux SocketCAN interfaces
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketCanConnector;

impl SocketCanConnector {
    fn open_socket(interface: &str) -> io::Result<CanSocket> {
        CanSocket::open(interface).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("failed to open CAN socket on {}: {}", interface, e),
            )
        })
    }
}

impl Connector for SocketCanConnector {
    fn open(&self, interface: &str) -> io::Result<(Box<dyn FrameSource>, Box<dyn FrameSink>)> {
        let rx = Self::open_socket(interface)?;
        let tx = Self::open_socket(interface)?;
        log::info!("Opened SocketCAN interface {}", interface);

        Ok((
            Box::new(SocketCanSource {
                socket: rx,
                read_timeout: None,
            }),
            Box::new(SocketCanSink {
                socket: tx,
                write_timeout: None,
            }),
        ))
    }
}

struct SocketCanSource {
    socket: CanSocket,
    read_timeout: Option<Duration>,
}

impl FrameSource for SocketCanSource {
    fn recv(&mut self, timeout: Duration) -> io::Result<Option<Frame>> {
        if self.read_timeout != Some(timeout) {
            self.socket.set_read_timeout(timeout)?;
            self.read_timeout = Some(timeout);
        }

        match timeout_as_none(self.socket.read_frame())? {
            Some(frame) => to_frame(&frame),
            None => Ok(None),
        }
    }
}

/// Map a read timeout to `Ok(None)`
fn timeout_as_none<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Convert a received SocketCAN frame, skipping frames the decoders never read
fn to_frame(frame: &SocketCanFrame) -> io::Result<Option<Frame>> {
    if frame.is_extended() || frame.is_remote_frame() || frame.is_error_frame() {
        log::trace!("Skipping non-data frame 0x{:X}", frame.raw_id());
        return Ok(None);
    }

    Frame::new(frame.raw_id() as u16, frame.data())
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

struct SocketCanSink {
    socket: CanSocket,
    write_timeout: Option<Duration>,
}

impl FrameSink for SocketCanSink {
    fn send(&mut self, frame: &Frame, timeout: Duration) -> io::Result<()> {
        if self.write_timeout != Some(timeout) {
            self.socket.set_write_timeout(timeout)?;
            self.write_timeout = Some(timeout);
        }

        let id = StandardId::new(frame.arbitration_id()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid standard id 0x{:X}", frame.arbitration_id()),
            )
        })?;
        let socket_frame = SocketCanFrame::new(id, frame.payload()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "failed to build CAN frame")
        })?;

        self.socket.write_frame(&socket_frame)
    }
}
