//! Notification dispatcher
//!
//! Routes a decoded [`Notification`] to the one handler registered for its
//! variant. No handler is mandatory; notifications without a handler are
//! ignored. Handlers are awaited before [`Dispatcher::dispatch`] returns, so
//! dispatching from inside an ordered queue keeps the queue's ordering.
//!
//! Identity filtering (is this the job/run/content I display?) belongs to the
//! handler itself, see [`Notification::job_id`] and friends.

use crate::error::ProcessorError;
use crate::notification::{
    DataChange, ErrorReport, JobChange, Notification, NotificationKind, Progress, RunChange,
    StateChange,
};
use crate::queue::Processor;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use tracing::trace;

type Handler<N> = Box<dyn Fn(N) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

fn boxed<N, F, Fut>(f: F) -> Handler<N>
where
    F: Fn(N) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move |n| Box::pin(f(n)))
}

/// Result of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The registered handler ran to completion
    Handled(NotificationKind),
    /// No handler is registered for this variant
    Ignored(NotificationKind),
}

/// One optional handler per notification variant.
#[derive(Default)]
pub struct Dispatcher {
    data_change: Option<Handler<DataChange>>,
    job_change: Option<Handler<JobChange>>,
    run_change: Option<Handler<RunChange>>,
    progress: Option<Handler<Progress>>,
    state_change: Option<Handler<StateChange>>,
    error: Option<Handler<ErrorReport>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("data_change", &self.data_change.is_some())
            .field("job_change", &self.job_change.is_some())
            .field("run_change", &self.run_change.is_some())
            .field("progress", &self.progress.is_some())
            .field("state_change", &self.state_change.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle content changes.
    #[must_use]
    pub fn on_data_change<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(DataChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.data_change = Some(boxed(f));
        self
    }

    /// Handle job definition changes.
    #[must_use]
    pub fn on_job_change<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(JobChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.job_change = Some(boxed(f));
        self
    }

    /// Handle job run changes.
    #[must_use]
    pub fn on_run_change<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RunChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.run_change = Some(boxed(f));
        self
    }

    /// Handle run progress messages.
    #[must_use]
    pub fn on_progress<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Progress) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.progress = Some(boxed(f));
        self
    }

    /// Handle run state transitions.
    #[must_use]
    pub fn on_state_change<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(StateChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.state_change = Some(boxed(f));
        self
    }

    /// Handle error reports.
    #[must_use]
    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ErrorReport) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.error = Some(boxed(f));
        self
    }

    /// Whether a handler is registered for `kind`.
    #[must_use]
    pub fn handles(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::DataChange => self.data_change.is_some(),
            NotificationKind::JobChange => self.job_change.is_some(),
            NotificationKind::RunChange => self.run_change.is_some(),
            NotificationKind::Progress => self.progress.is_some(),
            NotificationKind::StateChange => self.state_change.is_some(),
            NotificationKind::Error => self.error.is_some(),
        }
    }

    /// Invoke the handler registered for the notification's variant.
    pub async fn dispatch(&self, notification: Notification) -> Result<Dispatch, ProcessorError> {
        let kind = notification.kind();
        let call = match notification {
            Notification::DataChange(n) => self.data_change.as_ref().map(|h| h(n)),
            Notification::JobChange(n) => self.job_change.as_ref().map(|h| h(n)),
            Notification::RunChange(n) => self.run_change.as_ref().map(|h| h(n)),
            Notification::Progress(n) => self.progress.as_ref().map(|h| h(n)),
            Notification::StateChange(n) => self.state_change.as_ref().map(|h| h(n)),
            Notification::Error(n) => self.error.as_ref().map(|h| h(n)),
        };

        match call {
            Some(fut) => {
                fut.await?;
                Ok(Dispatch::Handled(kind))
            }
            None => {
                trace!(kind = %kind, "No handler registered, notification ignored");
                Ok(Dispatch::Ignored(kind))
            }
        }
    }
}

#[async_trait]
impl Processor<Notification> for Dispatcher {
    async fn process(&self, notification: Notification) -> anyhow::Result<()> {
        match self.dispatch(notification).await {
            Ok(_) => Ok(()),
            Err(ProcessorError::Failed(e)) => Err(e),
            Err(other) => Err(other.into()),
        }
    }
}
