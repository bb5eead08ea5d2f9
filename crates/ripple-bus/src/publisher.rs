//! Publisher surface
//!
//! [`Publisher`] turns typed notifications into payloads and hands them to a
//! local ordered queue, whose consumer broadcasts them on the channel. Calls
//! never block; when notifications are suppressed they are dropped before
//! encoding.

use crate::channel::Channel;
use crate::error::Result;
use ripple_core::{
    codec, notifications_suppressed, processor_fn, ContentKind, DataChange, ErrorReport,
    JobChange, Notification, OrderedQueue, Progress, QueueConfig, QueueStats, RunChange,
    StateChange, UpdateKind,
};
use tracing::trace;
use uuid::Uuid;

/// Typed publishing onto one channel.
#[derive(Debug, Clone)]
pub struct Publisher {
    channel: Channel,
    queue: OrderedQueue<Vec<u8>>,
}

impl Publisher {
    /// Create a publisher for `channel`. Must be called within a tokio runtime.
    pub fn new(channel: Channel) -> Self {
        let config = QueueConfig::new(format!("publish:{}", channel.name()));
        Self::with_queue_config(channel, config)
    }

    /// Create a publisher with explicit queue configuration.
    pub fn with_queue_config(channel: Channel, config: QueueConfig) -> Self {
        let target = channel.clone();
        let queue = OrderedQueue::new(
            config,
            processor_fn(move |payload: Vec<u8>| {
                target.publish(payload);
                async { Ok(()) }
            }),
        );
        Self { channel, queue }
    }

    /// Channel this publisher writes to.
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Publish any notification.
    ///
    /// Returns `Ok(false)` when publishing is suppressed. A content change that
    /// carries no ids for a non-log kind is rejected.
    pub fn publish(&self, notification: &Notification) -> Result<bool> {
        if let Notification::DataChange(change) = notification {
            change.validate()?;
        }
        if notifications_suppressed() {
            trace!(channel = %self.channel.name(), kind = %notification.kind(), "Notification suppressed");
            return Ok(false);
        }

        self.queue.enqueue(codec::encode_notification(notification));
        Ok(true)
    }

    /// Announce created, changed or removed content.
    pub fn publish_data_change(
        &self,
        sender: &str,
        content_kind: ContentKind,
        update_kind: UpdateKind,
        content_ids: impl IntoIterator<Item = Uuid>,
    ) -> Result<bool> {
        let change = DataChange::new(sender, content_kind, update_kind, content_ids);
        self.publish(&Notification::DataChange(change))
    }

    /// Announce a job definition change.
    pub fn publish_job_change(&self, database_id: Uuid, job_id: Uuid, update_kind: UpdateKind) -> bool {
        self.publish_infallible(JobChange {
            database_id,
            job_id,
            update_kind,
        })
    }

    /// Announce a job run change.
    pub fn publish_run_change(
        &self,
        database_id: Uuid,
        job_id: Uuid,
        run_id: Uuid,
        update_kind: UpdateKind,
    ) -> bool {
        self.publish_infallible(RunChange {
            database_id,
            job_id,
            run_id,
            update_kind,
        })
    }

    /// Report progress of a job run.
    pub fn publish_progress(
        &self,
        database_id: Uuid,
        job_id: Uuid,
        run_id: Uuid,
        sender: &str,
        message: &str,
    ) -> bool {
        self.publish_infallible(Progress {
            database_id,
            job_id,
            run_id,
            sender: sender.to_string(),
            message: message.to_string(),
        })
    }

    /// Report a pipeline state transition of a job run.
    pub fn publish_state_change(
        &self,
        database_id: Uuid,
        job_id: Uuid,
        run_id: Uuid,
        sender: &str,
        message: &str,
        pipeline_state: &str,
    ) -> bool {
        self.publish_infallible(StateChange {
            database_id,
            job_id,
            run_id,
            sender: sender.to_string(),
            message: message.to_string(),
            pipeline_state: pipeline_state.to_string(),
        })
    }

    /// Report an error.
    pub fn publish_error(&self, message: &str) -> bool {
        self.publish_infallible(ErrorReport {
            message: message.to_string(),
        })
    }

    /// Wait until everything published so far has been handed to the channel.
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Outgoing queue counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    fn publish_infallible(&self, notification: impl Into<Notification>) -> bool {
        // Only content changes can fail validation
        self.publish(&notification.into()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::hub::Hub;
    use ripple_core::{decode, SuppressionGuard};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serializes tests that touch the process-wide suppression flag.
    static FLAG_LOCK: Mutex<()> = Mutex::new(());

    fn publisher(hub: &Hub) -> Publisher {
        Publisher::new(hub.channel("Bus"))
    }

    #[tokio::test]
    async fn test_data_change_reaches_channel() {
        let _lock = FLAG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let hub = Hub::new(HubConfig::in_process());
        let mut sub = hub.channel("Bus").subscribe();
        let publisher = publisher(&hub);

        let id = Uuid::new_v4();
        assert!(publisher
            .publish_data_change("Importer", ContentKind::Photo, UpdateKind::New, [id])
            .unwrap());
        publisher.flush().await;

        let delivery = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            String::from_utf8(delivery.payload.to_vec()).unwrap(),
            format!("Importer|6|0|{id}")
        );
    }

    #[tokio::test]
    async fn test_suppressed_publish_sends_nothing() {
        let _lock = FLAG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let hub = Hub::new(HubConfig::in_process());
        let mut sub = hub.channel("Bus").subscribe();
        let publisher = publisher(&hub);

        {
            let _quiet = SuppressionGuard::new();
            let published = publisher
                .publish_data_change("Bulk", ContentKind::Point, UpdateKind::Update, [Uuid::new_v4()])
                .unwrap();
            assert!(!published);
            assert!(!publisher.publish_error("also muted"));
        }
        publisher.flush().await;
        assert_eq!(publisher.stats().enqueued, 0);

        assert!(publisher.publish_error("audible"));
        publisher.flush().await;

        let delivery = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .unwrap()
            .unwrap();
        match decode(&delivery.payload).unwrap() {
            Notification::Error(report) => assert_eq!(report.message, "audible"),
            other => panic!("expected Error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_ids_rejected_for_content() {
        let _lock = FLAG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let hub = Hub::new(HubConfig::in_process());
        let publisher = publisher(&hub);

        assert!(publisher
            .publish_data_change("x", ContentKind::Post, UpdateKind::Delete, [])
            .is_err());
        assert!(publisher
            .publish_data_change("generator", ContentKind::GenerationLog, UpdateKind::New, [])
            .unwrap());
    }

    #[tokio::test]
    async fn test_job_notifications_keep_order() {
        let _lock = FLAG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let hub = Hub::new(HubConfig::in_process());
        let mut sub = hub.channel("Bus").subscribe();
        let publisher = publisher(&hub);

        let (db, job, run) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        publisher.publish_job_change(db, job, UpdateKind::New);
        publisher.publish_run_change(db, job, run, UpdateKind::New);
        publisher.publish_progress(db, job, run, "runner", "step 1");
        publisher.publish_state_change(db, job, run, "runner", "done", "Completed");
        publisher.flush().await;

        let mut kinds = Vec::new();
        for _ in 0..4 {
            let delivery = tokio::time::timeout(Duration::from_secs(5), sub.recv())
                .await
                .unwrap()
                .unwrap();
            let notification = decode(&delivery.payload).unwrap();
            assert_eq!(notification.job_id(), Some(job));
            kinds.push(notification.kind().to_string());
        }
        assert_eq!(kinds, vec!["job_change", "run_change", "progress", "state_change"]);
    }
}
