//! Ordered work queues
//!
//! An [`OrderedQueue`] serializes asynchronous processing of items enqueued
//! from any number of producers:
//!
//! - **FIFO**: if `a` is enqueued before `b` (by completion of `enqueue`),
//!   `a` finishes processing before `b` starts.
//! - **One at a time**: at most one processor call runs per queue instance.
//! - **Unbounded**: `enqueue` never blocks and never rejects.
//! - **Isolated failures**: a processor error, panic or timeout is logged and
//!   the consumer moves on to the next item.
//!
//! Every instance owns exactly one consumer task, spawned on construction.
//!
//! ```text
//!  enqueue ──┐          (suspended)
//!  enqueue ──┼──► [side buffer] ──resume──┐
//!  enqueue ──┘                            ▼
//!            └──────────────────────► [mpsc] ──► consumer ──► Processor::process
//! ```
//!
//! A suspendable queue ([`BufferPolicy::Suspendable`]) parks items in a side
//! buffer while suspended; resuming moves them to the live queue in their
//! original order, under the same lock that guards `enqueue`.

mod config;
mod task;
mod worker;

pub use config::{BufferPolicy, QueueConfig};
pub use task::{Task, TaskQueue};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use worker::{Counters, Message};

/// Consumes the items of one queue.
#[async_trait]
pub trait Processor<T: Send + 'static>: Send + Sync + 'static {
    /// Process one item. Errors are logged by the queue and never stop it.
    async fn process(&self, item: T) -> anyhow::Result<()>;
}

/// [`Processor`] backed by an async closure.
pub struct FnProcessor<F>(F);

/// Wrap an async closure as a [`Processor`].
pub fn processor_fn<T, F, Fut>(f: F) -> FnProcessor<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnProcessor(f)
}

#[async_trait]
impl<T, F, Fut> Processor<T> for FnProcessor<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn process(&self, item: T) -> anyhow::Result<()> {
        (self.0)(item).await
    }
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Items accepted by `enqueue`
    pub enqueued: u64,
    /// Items whose processor call succeeded
    pub succeeded: u64,
    /// Items whose processor call failed, panicked or timed out
    pub failed: u64,
    /// Items waiting in the suspend buffer
    pub buffered: usize,
}

impl QueueStats {
    /// Items that have been fully processed, successfully or not.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed
    }
}

struct SuspendState<T> {
    suspended: bool,
    buffer: VecDeque<(u64, T)>,
}

struct Shared<T> {
    name: Arc<str>,
    policy: BufferPolicy,
    tx: mpsc::UnboundedSender<Message<T>>,
    state: Mutex<SuspendState<T>>,
    next_seq: AtomicU64,
    counters: Arc<Counters>,
}

/// Single-consumer FIFO work queue.
///
/// Cloning the handle is cheap; all clones feed the same consumer. When the
/// last handle is dropped the consumer finishes the items already live and
/// exits. Items still parked in a suspend buffer at that point are discarded.
pub struct OrderedQueue<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Clone for OrderedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for OrderedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedQueue")
            .field("name", &self.shared.name)
            .field("policy", &self.shared.policy)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T: Send + 'static> OrderedQueue<T> {
    /// Create a queue that processes items as soon as they arrive.
    ///
    /// Must be called from within a tokio runtime; the consumer task is
    /// spawned immediately.
    pub fn new<P: Processor<T>>(config: QueueConfig, processor: P) -> Self {
        Self::with_policy(config, BufferPolicy::Immediate, processor)
    }

    /// Create a queue that can be suspended and resumed.
    pub fn suspendable<P: Processor<T>>(
        config: QueueConfig,
        start_suspended: bool,
        processor: P,
    ) -> Self {
        Self::with_policy(
            config,
            BufferPolicy::Suspendable { start_suspended },
            processor,
        )
    }

    /// Create a queue with an explicit buffering policy.
    pub fn with_policy<P: Processor<T>>(
        config: QueueConfig,
        policy: BufferPolicy,
        processor: P,
    ) -> Self {
        Self::with_shared_processor(config, policy, Arc::new(processor))
    }

    /// Create a queue around a processor that is shared with other code.
    pub fn with_shared_processor<P: Processor<T> + ?Sized>(
        config: QueueConfig,
        policy: BufferPolicy,
        processor: Arc<P>,
    ) -> Self {
        let name: Arc<str> = Arc::from(config.name.as_str());
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        tokio::spawn(worker::run(
            Arc::clone(&name),
            rx,
            processor,
            Arc::clone(&counters),
            config.item_timeout(),
        ));

        let suspended = matches!(
            policy,
            BufferPolicy::Suspendable {
                start_suspended: true
            }
        );

        Self {
            shared: Arc::new(Shared {
                name,
                policy,
                tx,
                state: Mutex::new(SuspendState {
                    suspended,
                    buffer: VecDeque::new(),
                }),
                next_seq: AtomicU64::new(0),
                counters,
            }),
        }
    }

    /// Queue name, as used in log output.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Append an item. Never blocks and never fails.
    pub fn enqueue(&self, item: T) {
        let shared = &self.shared;
        let seq = shared.next_seq.fetch_add(1, Ordering::Relaxed);
        shared.counters.enqueued.fetch_add(1, Ordering::Relaxed);

        if shared.policy == BufferPolicy::Immediate {
            self.send(seq, item);
            return;
        }

        let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.suspended {
            state.buffer.push_back((seq, item));
        } else {
            // Sent under the lock so a concurrent resume cannot overtake it
            self.send(seq, item);
        }
    }

    /// Suspend (`true`) or resume (`false`) the queue.
    ///
    /// Resuming moves every buffered item to the live queue in its original
    /// order before any later `enqueue` can slip in. Returns how many
    /// buffered items were released. Has no effect on an immediate queue.
    pub fn suspend(&self, suspended: bool) -> usize {
        let shared = &self.shared;
        if shared.policy == BufferPolicy::Immediate {
            warn!(queue = %shared.name, "Suspend requested on a queue without a buffer");
            return 0;
        }

        let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if suspended {
            if !state.suspended {
                debug!(queue = %shared.name, "Queue suspended");
            }
            state.suspended = true;
            return 0;
        }

        let released = state.buffer.len();
        while let Some((seq, item)) = state.buffer.pop_front() {
            self.send(seq, item);
        }
        if state.suspended {
            debug!(queue = %shared.name, released, "Queue resumed");
        }
        state.suspended = false;
        released
    }

    /// Whether the queue is currently parking new items.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .suspended
    }

    /// Wait until every item that is live right now has been processed.
    ///
    /// Items parked in a suspend buffer are not waited for.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.shared.tx.send(Message::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let buffered = self
            .shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .buffer
            .len();
        self.shared.counters.snapshot(buffered)
    }

    fn send(&self, seq: u64, item: T) {
        if self.shared.tx.send(Message::Item { seq, item }).is_err() {
            // Only happens once the runtime has torn the consumer down
            warn!(queue = %self.shared.name, seq, "Queue consumer gone, item dropped");
        }
    }
}
