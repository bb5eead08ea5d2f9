//! Ripple Bus - named notification channels across processes
//!
//! This crate moves ripple notifications between components:
//! - Channel: fire-and-forget broadcast to every subscriber of a name,
//!   in this process and in other processes on the same host
//! - Hub: registry of channels plus the host transport they share
//! - Publisher: typed, suppressible publishing through an ordered queue
//! - Subscriber: decode and dispatch in arrival order, suspendable
//! - Transport: unix datagram fan-out through a rendezvous directory

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod config;
pub mod error;
pub mod hub;
pub mod publisher;
pub mod subscriber;
pub mod transport;

pub use channel::{Channel, Delivery, Origin, SenderInfo, Subscription};
pub use config::{HubConfig, DEFAULT_MAX_PAYLOAD_BYTES};
pub use error::{Error, Result, TransportError};
pub use hub::{Hub, HubId};
pub use publisher::Publisher;
pub use subscriber::Subscriber;
pub use transport::{Deliver, Listening, Transport, CHANNEL_NAME_FILE};

#[cfg(unix)]
pub use transport::UnixDatagramTransport;

pub use ripple_core;
