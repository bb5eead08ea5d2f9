use super::{Processor, QueueStats};
use crate::error::ProcessorError;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

/// What travels from producers to the consumer task.
pub(super) enum Message<T> {
    Item { seq: u64, item: T },
    Flush(oneshot::Sender<()>),
}

/// Counters shared between the handles and the consumer.
#[derive(Debug, Default)]
pub(super) struct Counters {
    pub(super) enqueued: AtomicU64,
    pub(super) succeeded: AtomicU64,
    pub(super) failed: AtomicU64,
}

impl Counters {
    pub(super) fn snapshot(&self, buffered: usize) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            buffered,
        }
    }
}

/// The single consumer of one queue instance.
pub(super) async fn run<T, P>(
    name: Arc<str>,
    mut rx: mpsc::UnboundedReceiver<Message<T>>,
    processor: Arc<P>,
    counters: Arc<Counters>,
    item_timeout: Option<Duration>,
) where
    T: Send + 'static,
    P: Processor<T> + ?Sized,
{
    debug!(queue = %name, "Queue consumer started");

    while let Some(message) = rx.recv().await {
        match message {
            Message::Item { seq, item } => {
                match invoke(processor.as_ref(), item, item_timeout).await {
                    Ok(()) => {
                        counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        error!(queue = %name, seq, error = %e, "Queue item failed");
                    }
                }
            }
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!(queue = %name, "Queue consumer stopped");
}

async fn invoke<T, P>(processor: &P, item: T, timeout: Option<Duration>) -> Result<(), ProcessorError>
where
    T: Send + 'static,
    P: Processor<T> + ?Sized,
{
    let call = AssertUnwindSafe(processor.process(item)).catch_unwind();

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(ProcessorError::Timeout(limit)),
        },
        None => call.await,
    };

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ProcessorError::Failed(e)),
        Err(panic) => Err(ProcessorError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
