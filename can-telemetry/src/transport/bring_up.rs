//! Interface bring-up
//!
//! On the vehicle the CAN controller has to be configured before a socket
//! can be opened on it. This is a shell command and is modelled as a
//! collaborator so tests and virtual interfaces can skip it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// `IFF_UP` in the interface flags the kernel exposes under sysfs
const IFF_UP: u32 = 0x1;

/// Errors raised by the bring-up step
#[derive(Debug, thiserror::Error)]
pub enum BringUpError {
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}")]
    ExitStatus { command: String, status: String },
}

/// Brings a bus interface up at a bitrate
pub trait BringUp: Send {
    fn bring_up(&self, interface: &str, bitrate: u32) -> Result<(), BringUpError>;
}

/// Skips bring-up (virtual buses, or interfaces configured by the system)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBringUp;

impl BringUp for NoBringUp {
    fn bring_up(&self, interface: &str, _bitrate: u32) -> Result<(), BringUpError> {
        log::debug!("Skipping bring-up for {}", interface);
        Ok(())
    }
}

/// Runs `ip link set <interface> up type can bitrate <bitrate>`
///
/// The kernel refuses to change the bitrate of a CAN interface that is
/// already up, so an interface whose `IFF_UP` flag is set is left alone.
#[derive(Debug, Clone)]
pub struct IpLinkBringUp {
    /// Prefix the command with `sudo`
    pub use_sudo: bool,
    /// Directory holding one entry per network interface
    pub sysfs_net: PathBuf,
}

impl Default for IpLinkBringUp {
    fn default() -> Self {
        Self {
            use_sudo: true,
            sysfs_net: PathBuf::from("/sys/class/net"),
        }
    }
}

impl IpLinkBringUp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: run without `sudo`
    pub fn without_sudo(mut self) -> Self {
        self.use_sudo = false;
        self
    }

    /// Builder method: read interface flags below another directory
    pub fn with_sysfs_net(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sysfs_net = dir.into();
        self
    }

    /// Whether the interface is already administratively up
    ///
    /// A missing or unreadable flags file counts as down.
    pub fn is_link_up(&self, interface: &str) -> bool {
        match read_flags(&self.sysfs_net.join(interface).join("flags")) {
            Some(flags) => flags & IFF_UP != 0,
            None => false,
        }
    }

    /// Program and arguments that will be executed
    pub fn command_line(&self, interface: &str, bitrate: u32) -> Vec<String> {
        let mut argv = Vec::new();
        if self.use_sudo {
            argv.push("sudo".to_string());
        }
        argv.extend(
            ["ip", "link", "set", interface, "up", "type", "can", "bitrate"]
                .iter()
                .map(|s| s.to_string()),
        );
        argv.push(bitrate.to_string());
        argv
    }
}

impl BringUp for IpLinkBringUp {
    fn bring_up(&self, interface: &str, bitrate: u32) -> Result<(), BringUpError> {
        if self.is_link_up(interface) {
            log::info!("{} is already up, skipping bring-up", interface);
            return Ok(());
        }

        let argv = self.command_line(interface, bitrate);
        let command = argv.join(" ");
        log::info!("Bringing up {}: {}", interface, command);

        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .status()
            .map_err(|source| BringUpError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(BringUpError::ExitStatus {
                command,
                status: status.to_string(),
            });
        }

        Ok(())
    }
}

fn read_flags(path: &Path) -> Option<u32> {
    let text = fs::read_to_string(path).ok()?;
    let hex = text.trim().trim_start_matches("0x");
    u32::from_str_radix(hex, 16).ok()
}
