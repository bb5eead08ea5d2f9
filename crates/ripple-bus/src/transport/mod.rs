//! Host transports
//!
//! A [`Transport`] carries channel payloads between processes on one host.
//! Channels use it after their in-process fan-out; it never sees traffic for
//! subscribers living in the publishing hub, so self-receipt happens exactly
//! once (through the in-process broadcast).
//!
//! Every datagram starts with a fixed header:
//!
//! ```text
//! +--------+------------------+-------------------+
//! | "RPL1" | publisher hub id | payload ...       |
//! | 4 B    | 16 B (uuid)      | variable          |
//! +--------+------------------+-------------------+
//! ```

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::UnixDatagramTransport;

use crate::error::TransportError;
use crate::hub::HubId;
use bytes::Bytes;
use std::sync::Arc;
use uuid::Uuid;

/// Magic bytes identifying a ripple datagram.
pub const MAGIC: &[u8; 4] = b"RPL1";

/// Size of the datagram header.
pub const HEADER_LEN: usize = MAGIC.len() + 16;

/// File inside a channel directory holding the channel's full name.
pub const CHANNEL_NAME_FILE: &str = "channel";

/// Callback invoked for every payload received from another hub.
pub type Deliver = Arc<dyn Fn(Bytes, HubId) + Send + Sync>;

/// Moves channel payloads between hubs on one host.
pub trait Transport: Send + Sync + 'static {
    /// Transport name for log output.
    fn name(&self) -> &str;

    /// Send `payload` to every other hub listening on `channel`.
    ///
    /// Returns how many peers accepted the payload. Must not block.
    fn send(&self, channel: &str, payload: &[u8]) -> Result<usize, TransportError>;

    /// Start receiving payloads published on `channel` by other hubs.
    ///
    /// Reception stops when the returned [`Listening`] is dropped.
    fn listen(&self, channel: &str, deliver: Deliver) -> Result<Listening, TransportError>;
}

/// Keeps a transport listener alive; dropping it stops reception.
pub struct Listening {
    _guard: Box<dyn std::any::Any + Send + Sync>,
}

impl Listening {
    /// Wrap whatever resource keeps the listener running.
    pub fn new(guard: impl std::any::Any + Send + Sync) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for Listening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listening").finish_non_exhaustive()
    }
}

/// Prefix `payload` with the datagram header.
#[must_use]
pub fn frame(hub: HubId, payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(HEADER_LEN + payload.len());
    datagram.extend_from_slice(MAGIC);
    datagram.extend_from_slice(hub.as_uuid().as_bytes());
    datagram.extend_from_slice(payload);
    datagram
}

/// Split a datagram into publisher hub id and payload.
///
/// Returns `None` when the header is missing or damaged.
#[must_use]
pub fn unframe(datagram: &[u8]) -> Option<(HubId, &[u8])> {
    if datagram.len() < HEADER_LEN || &datagram[..MAGIC.len()] != MAGIC {
        return None;
    }
    let id = Uuid::from_slice(&datagram[MAGIC.len()..HEADER_LEN]).ok()?;
    Some((HubId::from(id), &datagram[HEADER_LEN..]))
}
