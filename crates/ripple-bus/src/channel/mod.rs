//! Named notification channels
//!
//! A [`Channel`] is a cheap handle onto the bus its hub keeps for a name.
//! Publishing is fire-and-forget: the payload goes to every in-process
//! subscriber (including the publisher's own) through a `tokio::broadcast`
//! channel, then to other processes through the hub's host transport.
//!
//! Delivery is best-effort and at-most-once per live subscriber. Transport
//! failures are logged and never reach the publisher; a subscriber that falls
//! more than the hub capacity behind skips the oldest payloads.

use crate::hub::{Hub, HubId};
use crate::transport::{Deliver, Listening, Transport};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Published through this hub (same process)
    Local(HubId),
    /// Received from another hub on this host
    Host(HubId),
}

impl Origin {
    /// Publishing hub.
    #[must_use]
    pub fn hub(&self) -> HubId {
        match self {
            Self::Local(hub) | Self::Host(hub) => *hub,
        }
    }
}

/// Metadata delivered alongside every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderInfo {
    /// Where the payload came from
    pub origin: Origin,
    /// When this hub saw the payload
    pub received_at: DateTime<Utc>,
}

/// One payload as seen by a subscriber.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Raw bytes as published
    pub payload: Bytes,
    /// Sender metadata
    pub sender: SenderInfo,
}

/// The shared state behind every handle for one channel name.
pub(crate) struct Bus {
    name: Arc<str>,
    hub: HubId,
    tx: broadcast::Sender<Delivery>,
    transport: Option<Arc<dyn Transport>>,
    listening: Mutex<Option<Listening>>,
}

impl Bus {
    pub(crate) fn new(
        name: &str,
        hub: HubId,
        capacity: usize,
        transport: Option<Arc<dyn Transport>>,
    ) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            name: Arc::from(name),
            hub,
            tx,
            transport,
            listening: Mutex::new(None),
        }
    }

    /// Bind the host listener once; later calls are no-ops.
    fn ensure_listening(&self) {
        let Some(transport) = &self.transport else {
            return;
        };
        let mut listening = self.listening.lock().unwrap_or_else(|e| e.into_inner());
        if listening.is_some() {
            return;
        }

        let tx = self.tx.clone();
        let deliver: Deliver = Arc::new(move |payload, hub| {
            let delivery = Delivery {
                payload,
                sender: SenderInfo {
                    origin: Origin::Host(hub),
                    received_at: Utc::now(),
                },
            };
            // No in-process subscriber left is not an error
            let _ = tx.send(delivery);
        });

        match transport.listen(&self.name, deliver) {
            Ok(guard) => {
                debug!(channel = %self.name, transport = transport.name(), "Listening for host traffic");
                *listening = Some(guard);
            }
            Err(e) => {
                warn!(channel = %self.name, error = %e, "Host listener unavailable, in-process delivery only");
            }
        }
    }
}

/// Handle to a named broadcast channel.
///
/// Cheap to clone. All handles for one name on one hub share a bus.
#[derive(Clone)]
pub struct Channel {
    bus: Arc<Bus>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.bus.name)
            .field("hub", &self.bus.hub)
            .finish()
    }
}

impl Channel {
    /// Handle to `name` on the process-wide hub. Performs no I/O.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Hub::global().channel(name)
    }

    pub(crate) fn from_bus(bus: Arc<Bus>) -> Self {
        Self { bus }
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.bus.name
    }

    /// Hub this handle belongs to.
    #[must_use]
    pub fn hub_id(&self) -> HubId {
        self.bus.hub
    }

    /// Whether two handles share one bus.
    #[must_use]
    pub fn same_bus(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.bus, &other.bus)
    }

    /// Broadcast `payload` to every subscriber of this channel name.
    ///
    /// Never blocks and never fails; transport problems are logged.
    pub fn publish(&self, payload: impl Into<Bytes>) {
        let payload = payload.into();
        let bus = &self.bus;

        let local = bus
            .tx
            .send(Delivery {
                payload: payload.clone(),
                sender: SenderInfo {
                    origin: Origin::Local(bus.hub),
                    received_at: Utc::now(),
                },
            })
            .unwrap_or(0);

        let remote = match &bus.transport {
            Some(transport) => match transport.send(&bus.name, &payload) {
                Ok(reached) => reached,
                Err(e) => {
                    warn!(channel = %bus.name, transport = transport.name(), error = %e, "Host publish failed");
                    0
                }
            },
            None => 0,
        };

        trace!(channel = %bus.name, len = payload.len(), local, remote, "Published");
    }

    /// Start receiving every payload published on this channel from now on.
    ///
    /// The first subscription on a hub with a host transport binds the host
    /// listener, which needs a tokio runtime.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let rx = self.bus.tx.subscribe();
        self.bus.ensure_listening();
        Subscription {
            channel: Arc::clone(&self.bus.name),
            rx,
        }
    }

    /// Number of live in-process subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.bus.tx.receiver_count()
    }
}

/// Receiving end of a channel.
#[derive(Debug)]
pub struct Subscription {
    channel: Arc<str>,
    rx: broadcast::Receiver<Delivery>,
}

impl Subscription {
    /// Channel this subscription listens on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next payload, or `None` once the channel is gone.
    ///
    /// Payloads skipped because this subscriber fell behind are logged.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            match self.rx.recv().await {
                Ok(delivery) => return Some(delivery),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(channel = %self.channel, missed, "Subscriber lagged, notifications missed");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Payload already waiting, without blocking.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        loop {
            match self.rx.try_recv() {
                Ok(delivery) => return Some(delivery),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(channel = %self.channel, missed, "Subscriber lagged, notifications missed");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests;
