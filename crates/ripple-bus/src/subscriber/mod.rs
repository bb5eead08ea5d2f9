//! Subscriber surface
//!
//! A [`Subscriber`] pairs a channel subscription with its own ordered queue.
//! A forwarding task moves each delivery off the channel into the queue; the
//! queue's consumer decodes the payload and runs the matching handler, one
//! notification at a time and in arrival order.
//!
//! The queue is suspendable: while suspended, deliveries keep arriving and are
//! parked until resumed, then handled in their original order.

use crate::channel::{Channel, Delivery, SenderInfo};
use async_trait::async_trait;
use bytes::Bytes;
use ripple_core::{
    codec, processor_fn, BufferPolicy, Dispatcher, ErrorReport, Notification, NotificationKind,
    OrderedQueue, Processor, QueueConfig, QueueStats,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Decodes deliveries and routes them through a [`Dispatcher`].
struct DecodeAndDispatch {
    channel: Arc<str>,
    dispatcher: Dispatcher,
}

#[async_trait]
impl Processor<Delivery> for DecodeAndDispatch {
    async fn process(&self, delivery: Delivery) -> anyhow::Result<()> {
        let notification = match codec::decode(&delivery.payload) {
            Ok(notification) => notification,
            Err(e) => {
                if !self.dispatcher.handles(NotificationKind::Error) {
                    warn!(
                        channel = %self.channel,
                        origin = ?delivery.sender.origin,
                        len = delivery.payload.len(),
                        error = %e,
                        "Dropping undecodable notification"
                    );
                    return Ok(());
                }
                Notification::Error(ErrorReport {
                    message: format!("undecodable notification on {}: {e}", self.channel),
                })
            }
        };

        self.dispatcher.process(notification).await
    }
}

/// Live subscription that handles notifications in order.
///
/// Dropping the subscriber stops forwarding; notifications already queued
/// are still handled.
pub struct Subscriber {
    channel: String,
    queue: OrderedQueue<Delivery>,
    forward: JoinHandle<()>,
    drain: mpsc::UnboundedSender<oneshot::Sender<()>>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("channel", &self.channel)
            .field("queue", &self.queue)
            .finish()
    }
}

impl Subscriber {
    /// Subscribe to `channel` and route every notification through `dispatcher`.
    ///
    /// The subscription is live when this returns. Must be called within a
    /// tokio runtime.
    pub fn spawn(channel: &Channel, dispatcher: Dispatcher, config: QueueConfig) -> Self {
        let processor = DecodeAndDispatch {
            channel: Arc::from(channel.name()),
            dispatcher,
        };
        Self::start(channel, config, Arc::new(processor))
    }

    /// Subscribe to `channel` and hand every raw payload to `handler`.
    ///
    /// No decoding happens; `handler` sees the bytes exactly as published.
    pub fn on_receive<F, Fut>(channel: &Channel, config: QueueConfig, handler: F) -> Self
    where
        F: Fn(Bytes, SenderInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let processor = processor_fn(move |delivery: Delivery| {
            handler(delivery.payload, delivery.sender)
        });
        Self::start(channel, config, Arc::new(processor))
    }

    fn start<P: Processor<Delivery>>(channel: &Channel, config: QueueConfig, processor: Arc<P>) -> Self {
        let policy = BufferPolicy::Suspendable {
            start_suspended: false,
        };
        let queue = OrderedQueue::with_shared_processor(config, policy, processor);

        // Subscribe before returning so nothing published afterwards is missed
        let mut subscription = channel.subscribe();
        let feed = queue.clone();
        let (drain, mut drain_rx) = mpsc::unbounded_channel::<oneshot::Sender<()>>();
        let forward = tokio::spawn(async move {
            loop {
                tokio::select! {
                    delivery = subscription.recv() => match delivery {
                        Some(delivery) => feed.enqueue(delivery),
                        None => break,
                    },
                    Some(done) = drain_rx.recv() => {
                        // Everything already on the channel goes ahead of the flush marker
                        while let Some(delivery) = subscription.try_recv() {
                            feed.enqueue(delivery);
                        }
                        let _ = done.send(());
                    }
                }
            }
            debug!(channel = %subscription.channel(), "Channel closed, subscriber stopped");
        });

        debug!(channel = %channel.name(), queue = %queue.name(), "Subscriber started");
        Self {
            channel: channel.name().to_string(),
            queue,
            forward,
            drain,
        }
    }

    /// Channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Suspend (`true`) or resume (`false`) handling. Returns how many parked
    /// notifications a resume released.
    pub fn suspend(&self, suspended: bool) -> usize {
        self.queue.suspend(suspended)
    }

    /// Whether handling is currently suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.queue.is_suspended()
    }

    /// Wait until every notification received so far (and not parked) has
    /// been handled.
    ///
    /// Deliveries still waiting on the channel are moved into the queue first.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.drain.send(done_tx).is_ok() {
            let _ = done_rx.await;
        }
        self.queue.flush().await;
    }

    /// Handling counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.forward.abort();
    }
}
