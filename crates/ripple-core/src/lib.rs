//! Ripple Core - notification model, wire codec and ordered work queues
//!
//! This crate provides the transport-independent half of the ripple bus:
//! - Notification: content, job, run, progress, state and error events
//! - Codec: the `sender|kind|update|ids` wire format (plus tagged JSON)
//! - Queue: single-consumer FIFO work queues, optionally suspendable
//! - Dispatch: per-variant handler routing
//! - Suppress: advisory switch that mutes publishers during bulk work

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod notification;
pub mod queue;
pub mod suppress;

pub use codec::{decode, encode, encode_notification};
pub use dispatch::{Dispatch, Dispatcher};
pub use error::{DecodeError, Error, FieldParseError, ProcessorError, Result, WireField};
pub use notification::{
    clean_sender, ContentKind, DataChange, ErrorReport, JobChange, Notification,
    NotificationKind, Progress, RunChange, StateChange, UpdateKind, NO_SENDER,
};
pub use queue::{
    processor_fn, BufferPolicy, FnProcessor, OrderedQueue, Processor, QueueConfig, QueueStats,
    Task, TaskQueue,
};
pub use suppress::{notifications_suppressed, set_notifications_suppressed, SuppressionGuard};
