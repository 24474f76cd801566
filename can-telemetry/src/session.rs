//! Bus session
//!
//! Owns the transport for one bus and the bounded queue between the
//! transport and the caller.
//!
//! ```text
//!  Uninitialized ──initialize()──▶ BringingUp ──ok──▶ Ready
//!        ▲                             │                │
//!        │                           error      notifier died
//!        │                             ▼                ▼
//!        └────────shutdown()───────  Faulted ◀──────────┘
//! ```
//!
//! After a successful `initialize` a notifier thread reads frames from the
//! transport and pushes them into a `sync_channel`. `read` drains that
//! channel; the transport itself is only ever touched by the notifier.

use crate::config::BusConfig;
use crate::transport::{BringUp, Connector, FrameSink, FrameSource};
use crate::types::{BusError, Frame};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lifecycle state of a bus session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never initialized, or shut down
    Uninitialized,
    /// `initialize` is running the bring-up step and opening the transport
    BringingUp,
    /// Transport open, notifier running
    Ready,
    /// Bring-up failed or the transport died
    Faulted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "Uninitialized"),
            SessionState::BringingUp => write!(f, "BringingUp"),
            SessionState::Ready => write!(f, "Ready"),
            SessionState::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Open transport plus the notifier feeding the receive queue
struct Link {
    sink: Box<dyn FrameSink>,
    queue: Receiver<Frame>,
    shutdown: Arc<AtomicBool>,
    notifier: Option<JoinHandle<()>>,
}

impl Link {
    fn close(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.notifier.take() {
            if handle.join().is_err() {
                log::error!("Notifier thread panicked");
            }
        }
    }
}

/// A session on one CAN bus
pub struct BusSession {
    config: BusConfig,
    connector: Box<dyn Connector>,
    bring_up: Box<dyn BringUp>,
    state: SessionState,
    link: Option<Link>,
    dropped_frames: Arc<AtomicU64>,
    last_error: Option<String>,
}

impl BusSession {
    /// Create an uninitialized session
    pub fn new(
        config: BusConfig,
        connector: impl Connector + 'static,
        bring_up: impl BringUp + 'static,
    ) -> Self {
        Self {
            config,
            connector: Box::new(connector),
            bring_up: Box::new(bring_up),
            state: SessionState::Uninitialized,
            link: None,
            dropped_frames: Arc::new(AtomicU64::new(0)),
            last_error: None,
        }
    }

    /// Bring the bus up, open the transport and start the notifier
    ///
    /// A no-op on a `Ready` session. On failure the session is `Faulted`
    /// and stays that way until `initialize` is called again.
    pub fn initialize(&mut self) -> Result<(), BusError> {
        if self.state == SessionState::Ready {
            return Ok(());
        }
        self.release();

        self.state = SessionState::BringingUp;
        log::info!(
            "Initializing CAN bus {} at {} bit/s",
            self.config.interface,
            self.config.bitrate
        );

        match self.open_link() {
            Ok(link) => {
                self.link = Some(link);
                self.state = SessionState::Ready;
                self.last_error = None;
                log::info!("CAN bus {} ready", self.config.interface);
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Faulted;
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn open_link(&self) -> Result<Link, BusError> {
        let interface = self.config.interface.clone();

        if self.config.bring_up {
            self.bring_up
                .bring_up(&interface, self.config.bitrate)
                .map_err(|e| BusError::InitFailed(e.to_string()))?;
        }

        let (source, sink) = self.connector.open(&interface).map_err(|e| {
            BusError::InitFailed(format!("failed to open transport on {}: {}", interface, e))
        })?;

        let (tx, queue) = mpsc::sync_channel(self.config.effective_queue_capacity());
        let shutdown = Arc::new(AtomicBool::new(false));

        let notifier = Notifier {
            interface: interface.clone(),
            source,
            tx,
            shutdown: shutdown.clone(),
            dropped_frames: self.dropped_frames.clone(),
            poll: self.config.notifier_poll(),
        };
        let handle = thread::Builder::new()
            .name(format!("can-notifier-{}", interface))
            .spawn(move || notifier.run())
            .map_err(|e| BusError::InitFailed(format!("failed to spawn notifier: {}", e)))?;

        Ok(Link {
            sink,
            queue,
            shutdown,
            notifier: Some(handle),
        })
    }

    /// Wait up to `timeout` for the next buffered frame
    ///
    /// `Ok(None)` is the normal idle case. Fails with `NotReady` unless the
    /// session is `Ready`.
    pub fn read(&mut self, timeout: Duration) -> Result<Option<Frame>, BusError> {
        let link = match (self.state, self.link.as_ref()) {
            (SessionState::Ready, Some(link)) => link,
            _ => return Err(BusError::NotReady),
        };

        match link.queue.recv_timeout(timeout) {
            Ok(frame) => {
                log::trace!("Received {}", frame);
                Ok(Some(frame))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                log::error!(
                    "Notifier for {} stopped, marking bus as faulted",
                    self.config.interface
                );
                self.state = SessionState::Faulted;
                self.last_error = Some("transport receive loop terminated".to_string());
                Err(BusError::NotReady)
            }
        }
    }

    /// Transmit one frame, blocking at most `timeout`
    pub fn send(&mut self, frame: &Frame, timeout: Duration) -> Result<(), BusError> {
        let link = match (self.state, self.link.as_mut()) {
            (SessionState::Ready, Some(link)) => link,
            _ => return Err(BusError::NotReady),
        };

        link.sink.send(frame, timeout).map_err(|e| {
            log::warn!("Failed to send {}: {}", frame, e);
            BusError::SendFailed(e.to_string())
        })?;
        log::trace!("Sent {}", frame);
        Ok(())
    }

    /// Stop the notifier and release the transport
    pub fn shutdown(&mut self) {
        if self.link.is_some() {
            log::info!("Shutting down CAN bus {}", self.config.interface);
        }
        self.release();
        self.state = SessionState::Uninitialized;
    }

    fn release(&mut self) {
        if let Some(link) = self.link.take() {
            link.close();
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Frames discarded because the receive queue was full
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Cause of the last initialization or transport failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for BusSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for BusSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSession")
            .field("interface", &self.config.interface)
            .field("state", &self.state)
            .field("dropped_frames", &self.dropped_frames())
            .finish()
    }
}

/// Background producer: transport -> receive queue
struct Notifier {
    interface: String,
    source: Box<dyn FrameSource>,
    tx: SyncSender<Frame>,
    shutdown: Arc<AtomicBool>,
    dropped_frames: Arc<AtomicU64>,
    poll: Duration,
}

impl Notifier {
    fn run(mut self) {
        log::debug!("Notifier for {} started", self.interface);

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.source.recv(self.poll) {
                Ok(Some(frame)) => match self.tx.try_send(frame) {
                    Ok(()) => {}
                    Err(TrySendError::Full(frame)) => {
                        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                        log::warn!("Receive queue full, dropping {}", frame);
                    }
                    // Session went away
                    Err(TrySendError::Disconnected(_)) => break,
                },
                Ok(None) => {}
                Err(e) => {
                    log::error!("Error reading from {}: {}", self.interface, e);
                    break;
                }
            }
        }

        log::debug!("Notifier for {} terminated", self.interface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{NoBringUp, VirtualBus};

    fn virtual_session() -> (BusSession, crate::transport::VirtualBusHandle) {
        let (bus, handle) = VirtualBus::new();
        let config = BusConfig::new()
            .with_interface("vcan0")
            .with_bring_up(false);
        (BusSession::new(config, bus, NoBringUp), handle)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::BringingUp.to_string(), "BringingUp");
    }

    #[test]
    fn test_read_before_initialize() {
        let (mut session, handle) = virtual_session();
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(
            session.read(Duration::from_millis(10)),
            Err(BusError::NotReady)
        );
        assert_eq!(handle.open_count(), 0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (mut session, handle) = virtual_session();
        session.initialize().unwrap();
        session.initialize().unwrap();
        assert!(session.is_ready());
        assert_eq!(handle.open_count(), 1);
    }

    #[test]
    fn test_shutdown_returns_to_uninitialized() {
        let (mut session, _handle) = virtual_session();
        session.initialize().unwrap();
        session.shutdown();

        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(
            session.send(&Frame::new(0x001, &[]).unwrap(), Duration::from_millis(10)),
            Err(BusError::NotReady)
        );
    }
}
