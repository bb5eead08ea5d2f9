//! Unix datagram transport
//!
//! Each listening hub binds `<root>/<channel-dir>/<hub-id>.sock`. Publishing
//! walks the channel directory and sends one datagram to every socket but its
//! own. Sockets that refuse delivery belong to exited processes and are removed.
//!
//! Socket addresses are short (`sun_path`), so long channel names map to a
//! fixed-width digest directory. The full name is kept next to the sockets in
//! a [`CHANNEL_NAME_FILE`].

use super::{frame, unframe, Deliver, Listening, Transport, CHANNEL_NAME_FILE, HEADER_LEN};
use crate::error::TransportError;
use crate::hub::HubId;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

const SOCKET_EXT: &str = "sock";

/// Escaped names longer than this use the digest form.
const MAX_READABLE_DIR: usize = 24;

/// Digest bytes kept in a hashed directory name.
const DIGEST_BYTES: usize = 12;

/// Size of `sockaddr_un::sun_path`, including the trailing NUL.
#[cfg(any(target_os = "linux", target_os = "android"))]
const SUN_PATH_LEN: usize = 108;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SUN_PATH_LEN: usize = 104;

/// Host transport over unix datagram sockets in a rendezvous directory.
#[derive(Debug)]
pub struct UnixDatagramTransport {
    root: PathBuf,
    hub: HubId,
    max_payload: usize,
    sender: OnceLock<UnixDatagram>,
}

impl UnixDatagramTransport {
    /// Create a transport rooted at `root` for the given hub.
    ///
    /// Nothing is opened or created until the first send or listen.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, hub: HubId, max_payload: usize) -> Self {
        Self {
            root: root.into(),
            hub,
            max_payload,
            sender: OnceLock::new(),
        }
    }

    fn sender(&self) -> Result<&UnixDatagram, TransportError> {
        if let Some(socket) = self.sender.get() {
            return Ok(socket);
        }
        let socket = UnixDatagram::unbound().map_err(|e| TransportError::io(&self.root, e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::io(&self.root, e))?;
        // A concurrent first send may have won; either socket works
        let _ = self.sender.set(socket);
        self.sender
            .get()
            .ok_or_else(|| TransportError::Rendezvous("send socket unavailable".to_string()))
    }

    /// Rendezvous root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the peer sockets of `channel`.
    #[must_use]
    pub fn channel_dir(&self, channel: &str) -> PathBuf {
        self.root.join(channel_dir_name(channel))
    }

    /// Socket this hub binds for `channel`.
    #[must_use]
    pub fn socket_path(&self, channel: &str) -> PathBuf {
        self.channel_dir(channel)
            .join(format!("{}.{SOCKET_EXT}", self.hub.as_uuid().simple()))
    }

    /// Peer sockets currently present for `channel`, including this hub's own.
    pub fn peers(&self, channel: &str) -> Result<Vec<PathBuf>, TransportError> {
        let dir = self.channel_dir(channel);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TransportError::io(&dir, e)),
        };

        let mut peers: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == SOCKET_EXT))
            .collect();
        peers.sort();
        Ok(peers)
    }
}

impl Transport for UnixDatagramTransport {
    fn name(&self) -> &str {
        "unix-datagram"
    }

    fn send(&self, channel: &str, payload: &[u8]) -> Result<usize, TransportError> {
        if payload.len() > self.max_payload {
            return Err(TransportError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_payload,
            });
        }

        let peers = self.peers(channel)?;
        if peers.is_empty() {
            return Ok(0);
        }

        let sender = self.sender()?;
        let own = self.socket_path(channel);
        let datagram = frame(self.hub, payload);
        let mut reached = 0;

        for peer in peers {
            if peer == own {
                continue;
            }
            match sender.send_to(&datagram, &peer) {
                Ok(_) => reached += 1,
                Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) => {
                    debug!(channel, peer = %peer.display(), "Removing stale peer socket");
                    let _ = fs::remove_file(&peer);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    warn!(channel, peer = %peer.display(), "Peer receive buffer full, notification dropped");
                }
                Err(e) => {
                    warn!(channel, peer = %peer.display(), error = %e, "Failed to reach peer");
                }
            }
        }

        trace!(channel, reached, "Host fan-out complete");
        Ok(reached)
    }

    fn listen(&self, channel: &str, deliver: Deliver) -> Result<Listening, TransportError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(TransportError::Rendezvous(
                "host listener needs a tokio runtime".to_string(),
            ));
        }

        let dir = self.channel_dir(channel);
        fs::create_dir_all(&dir).map_err(|e| TransportError::io(&dir, e))?;

        let name_file = dir.join(CHANNEL_NAME_FILE);
        if !name_file.exists() {
            if let Err(e) = fs::write(&name_file, channel) {
                debug!(channel, error = %e, "Failed to record channel name");
            }
        }

        let path = self.socket_path(channel);
        let len = path.as_os_str().len();
        if len >= SUN_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: SUN_PATH_LEN - 1,
            });
        }
        let socket =
            tokio::net::UnixDatagram::bind(&path).map_err(|e| TransportError::io(&path, e))?;

        let channel_name = channel.to_string();
        let capacity = HEADER_LEN + self.max_payload;
        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; capacity];
            loop {
                match socket.recv(&mut buf).await {
                    Ok(len) => match unframe(&buf[..len]) {
                        Some((hub, payload)) => deliver(Bytes::copy_from_slice(payload), hub),
                        None => {
                            warn!(channel = %channel_name, len, "Dropping datagram without ripple header")
                        }
                    },
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        error!(channel = %channel_name, error = %e, "Host receive loop stopped");
                        break;
                    }
                }
            }
        });

        debug!(channel, socket = %path.display(), "Host listener bound");
        Ok(Listening::new(SocketGuard { path, task }))
    }
}

struct SocketGuard {
    path: PathBuf,
    task: JoinHandle<()>,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        self.task.abort();
        let _ = fs::remove_file(&self.path);
    }
}

/// Directory name for a channel.
///
/// ASCII letters, digits, `_` and `-` are kept and every other byte is written
/// as `%XX`, so no name can escape the rendezvous root. When that form is
/// longer than [`MAX_READABLE_DIR`] the name becomes `%%` followed by a hex
/// SHA-256 prefix. Escaping never yields `%%`, so the two forms cannot meet.
fn channel_dir_name(channel: &str) -> String {
    if channel.is_empty() {
        return "%".to_string();
    }
    let escaped = escape_channel(channel);
    if escaped.len() <= MAX_READABLE_DIR {
        return escaped;
    }
    let digest = Sha256::digest(channel.as_bytes());
    format!("%%{}", hex::encode(&digest[..DIGEST_BYTES]))
}

fn escape_channel(channel: &str) -> String {
    let mut name = String::with_capacity(channel.len());
    for byte in channel.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{byte:02X}"));
        }
    }
    name
}
