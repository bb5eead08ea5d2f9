//! Hub configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest payload that fits one datagram on every supported platform.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 60 * 1024;

/// Configuration for a [`Hub`](crate::Hub)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// In-process broadcast capacity per channel
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Reach subscribers in other processes on this host
    #[serde(default = "default_true")]
    pub host_transport: bool,
    /// Directory where per-channel peer sockets live (default: runtime dir)
    #[serde(default)]
    pub rendezvous_dir: Option<PathBuf>,
    /// Largest payload the host transport will send
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

fn default_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            host_transport: true,
            rendezvous_dir: None,
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

impl HubConfig {
    /// Configuration for a hub that never leaves the process.
    #[must_use]
    pub fn in_process() -> Self {
        Self {
            host_transport: false,
            ..Self::default()
        }
    }

    /// Set the rendezvous directory.
    #[must_use]
    pub fn with_rendezvous_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.rendezvous_dir = Some(dir.into());
        self
    }

    /// Set the in-process broadcast capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Rendezvous directory in effect: the configured one, else
    /// `$XDG_RUNTIME_DIR/ripple/channels`, else a per-user temp directory.
    #[must_use]
    pub fn resolved_rendezvous_dir(&self) -> PathBuf {
        if let Some(dir) = &self.rendezvous_dir {
            return dir.clone();
        }
        match dirs::runtime_dir() {
            Some(runtime) => runtime.join("ripple").join("channels"),
            None => {
                let user = std::env::var("USER")
                    .or_else(|_| std::env::var("USERNAME"))
                    .unwrap_or_else(|_| "default".to_string());
                std::env::temp_dir()
                    .join(format!("ripple-{user}"))
                    .join("channels")
            }
        }
    }

    /// Reject unusable values.
    pub fn validate(&self) -> ripple_core::Result<()> {
        if self.capacity == 0 {
            return Err(ripple_core::Error::InvalidConfig {
                field: "bus.capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_payload_bytes == 0 {
            return Err(ripple_core::Error::InvalidConfig {
                field: "bus.max_payload_bytes".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
