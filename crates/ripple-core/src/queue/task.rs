use super::{BufferPolicy, OrderedQueue, Processor, QueueConfig, QueueStats};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;

/// A unit of work: a zero-argument async callable.
pub type Task = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

struct RunTask;

#[async_trait]
impl Processor<Task> for RunTask {
    async fn process(&self, task: Task) -> anyhow::Result<()> {
        task().await
    }
}

/// Ordered queue whose items are themselves the work to perform.
///
/// Tasks run one at a time in enqueue order.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    inner: OrderedQueue<Task>,
}

impl TaskQueue {
    /// Create a task queue. Must be called from within a tokio runtime.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: OrderedQueue::with_policy(config, BufferPolicy::Immediate, RunTask),
        }
    }

    /// Queue `f` to run after every task enqueued before it.
    pub fn enqueue<F, Fut>(&self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inner.enqueue(Box::new(move || Box::pin(f()) as BoxFuture<'static, _>));
    }

    /// Wait until every task enqueued so far has run.
    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.inner.stats()
    }
}
