//! In-process virtual bus
//!
//! A [`VirtualBus`] is a [`Connector`] whose traffic is driven from a
//! [`VirtualBusHandle`]: frames injected on the handle are delivered to the
//! open source, frames sent through the sink are recorded on the handle.
//! The bus can be opened again after a session shuts down.

use super::{Connector, FrameSink, FrameSource};
use crate::types::{Frame, FrameError};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Shared {
    inbound: Mutex<VecDeque<Frame>>,
    available: Condvar,
    sent: Mutex<Vec<Frame>>,
    open_count: AtomicUsize,
    fail_open: AtomicBool,
    fail_send: AtomicBool,
    disconnected: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connector side of the virtual bus
#[derive(Clone)]
pub struct VirtualBus {
    shared: Arc<Shared>,
}

/// Test/demo side of the virtual bus
#[derive(Clone)]
pub struct VirtualBusHandle {
    shared: Arc<Shared>,
}

impl VirtualBus {
    /// Create a bus and the handle that drives it
    pub fn new() -> (Self, VirtualBusHandle) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: shared.clone(),
            },
            VirtualBusHandle { shared },
        )
    }
}

impl Connector for VirtualBus {
    fn open(&self, interface: &str) -> io::Result<(Box<dyn FrameSource>, Box<dyn FrameSink>)> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("virtual interface {} is unavailable", interface),
            ));
        }

        self.shared.open_count.fetch_add(1, Ordering::SeqCst);
        self.shared.disconnected.store(false, Ordering::SeqCst);
        log::debug!("Opened virtual bus on {}", interface);

        Ok((
            Box::new(VirtualSource {
                shared: self.shared.clone(),
            }),
            Box::new(VirtualSink {
                shared: self.shared.clone(),
            }),
        ))
    }
}

struct VirtualSource {
    shared: Arc<Shared>,
}

impl FrameSource for VirtualSource {
    fn recv(&mut self, timeout: Duration) -> io::Result<Option<Frame>> {
        let deadline = Instant::now() + timeout;
        let mut queue = lock(&self.shared.inbound);

        loop {
            if self.shared.disconnected.load(Ordering::SeqCst) {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "virtual bus disconnected",
                ));
            }
            if let Some(frame) = queue.pop_front() {
                return Ok(Some(frame));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            queue = self
                .shared
                .available
                .wait_timeout(queue, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

struct VirtualSink {
    shared: Arc<Shared>,
}

impl FrameSink for VirtualSink {
    fn send(&mut self, frame: &Frame, _timeout: Duration) -> io::Result<()> {
        if self.shared.fail_send.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "virtual bus rejected the frame",
            ));
        }
        lock(&self.shared.sent).push(frame.clone());
        Ok(())
    }
}

impl VirtualBusHandle {
    /// Put a frame on the bus
    pub fn inject(&self, frame: Frame) {
        lock(&self.shared.inbound).push_back(frame);
        self.shared.available.notify_all();
    }

    /// Build and put a frame on the bus
    pub fn inject_raw(&self, arbitration_id: u16, payload: &[u8]) -> Result<(), FrameError> {
        self.inject(Frame::new(arbitration_id, payload)?);
        Ok(())
    }

    /// Frames injected but not yet picked up by a session
    pub fn pending(&self) -> usize {
        lock(&self.shared.inbound).len()
    }

    /// Every frame transmitted through the bus so far
    pub fn sent_frames(&self) -> Vec<Frame> {
        lock(&self.shared.sent).clone()
    }

    /// How many times the bus has been opened
    pub fn open_count(&self) -> usize {
        self.shared.open_count.load(Ordering::SeqCst)
    }

    /// Make subsequent `open` calls fail
    pub fn set_fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent sends fail
    pub fn set_fail_send(&self, fail: bool) {
        self.shared.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Simulate the driver going away: open sources start returning errors
    pub fn disconnect(&self) {
        self.shared.disconnected.store(true, Ordering::SeqCst);
        self.shared.available.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_and_receive() {
        let (bus, handle) = VirtualBus::new();
        let (mut source, _sink) = bus.open("vcan0").unwrap();

        handle.inject_raw(0x003, &[55]).unwrap();
        let frame = source.recv(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(frame.arbitration_id(), 0x003);
        assert_eq!(frame.payload(), &[55]);
        assert_eq!(handle.pending(), 0);
    }

    #[test]
    fn test_recv_times_out() {
        let (bus, _handle) = VirtualBus::new();
        let (mut source, _sink) = bus.open("vcan0").unwrap();

        let started = Instant::now();
        assert!(source.recv(Duration::from_millis(20)).unwrap().is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sent_frames_are_recorded() {
        let (bus, handle) = VirtualBus::new();
        let (_source, mut sink) = bus.open("vcan0").unwrap();

        let frame = Frame::new(0x010, &[1, 2]).unwrap();
        sink.send(&frame, Duration::from_millis(10)).unwrap();
        assert_eq!(handle.sent_frames(), vec![frame.clone()]);

        handle.set_fail_send(true);
        assert!(sink.send(&frame, Duration::from_millis(10)).is_err());
        assert_eq!(handle.sent_frames().len(), 1);
    }

    #[test]
    fn test_disconnect_fails_source() {
        let (bus, handle) = VirtualBus::new();
        let (mut source, _sink) = bus.open("vcan0").unwrap();

        handle.disconnect();
        assert!(source.recv(Duration::from_millis(10)).is_err());
    }

    #[test]
    fn test_fail_open() {
        let (bus, handle) = VirtualBus::new();
        handle.set_fail_open(true);
        assert!(bus.open("vcan0").is_err());
        assert_eq!(handle.open_count(), 0);
    }
}
