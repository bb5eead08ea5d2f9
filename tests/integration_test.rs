//! Integration tests for Ripple
//!
//! These tests verify the integration between the crates:
//! - ripple-core: notification model, codec, queues, dispatcher, suppression
//! - ripple-bus: channels, hubs, host transport, publisher and subscriber

use ripple_core::{
    ContentKind, DataChange, Dispatcher, ErrorReport, Progress, QueueConfig, StateChange,
    SuppressionGuard, TaskQueue, UpdateKind,
};
use ripple_bus::{Hub, HubConfig, Publisher, Subscriber};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Publishing tests share the process-wide suppression flag.
fn serial() -> &'static Mutex<()> {
    static SERIAL: OnceLock<Mutex<()>> = OnceLock::new();
    SERIAL.get_or_init(|| Mutex::new(()))
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("nothing arrived within 5s")
        .expect("sender dropped")
}

async fn silent<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> bool {
    tokio::time::timeout(Duration::from_millis(150), rx.recv())
        .await
        .is_err()
}

/// Dispatcher that forwards content changes and error messages to channels.
fn recording_dispatcher() -> (
    Dispatcher,
    mpsc::UnboundedReceiver<DataChange>,
    mpsc::UnboundedReceiver<String>,
) {
    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new()
        .on_data_change(move |change| {
            let tx = changes_tx.clone();
            async move {
                tx.send(change)?;
                Ok(())
            }
        })
        .on_error(move |report: ErrorReport| {
            let tx = errors_tx.clone();
            async move {
                tx.send(report.message)?;
                Ok(())
            }
        });
    (dispatcher, changes_rx, errors_rx)
}

// ============================================================================
// Publish -> Subscribe
// ============================================================================

#[tokio::test]
async fn test_photo_import_reaches_subscriber() {
    let _serial = serial().lock().await;
    let hub = Hub::new(HubConfig::in_process());
    let (dispatcher, mut changes, mut errors) = recording_dispatcher();
    let _subscriber = Subscriber::spawn(&hub.channel("Bus"), dispatcher, QueueConfig::new("ui"));
    let publisher = Publisher::new(hub.channel("Bus"));

    let (g1, g2) = (Uuid::new_v4(), Uuid::new_v4());
    assert!(publisher
        .publish_data_change("Importer", ContentKind::Photo, UpdateKind::New, [g1, g2])
        .unwrap());

    let change = recv(&mut changes).await;
    assert_eq!(change.sender, "Importer");
    assert_eq!(change.content_kind, ContentKind::Photo);
    assert_eq!(change.update_kind, UpdateKind::New);
    assert_eq!(change.content_ids.len(), 2);
    assert!(change.contains(&g1) && change.contains(&g2));
    assert!(silent(&mut errors).await);
}

#[tokio::test]
async fn test_suppressed_bulk_work_is_not_broadcast() {
    let _serial = serial().lock().await;
    let hub = Hub::new(HubConfig::in_process());
    let (dispatcher, mut changes, _errors) = recording_dispatcher();
    let _subscriber = Subscriber::spawn(&hub.channel("Bus"), dispatcher, QueueConfig::new("ui"));
    let publisher = Publisher::new(hub.channel("Bus"));

    {
        let _bulk = SuppressionGuard::new();
        for _ in 0..10 {
            let sent = publisher
                .publish_data_change("Bulk", ContentKind::Point, UpdateKind::Update, [Uuid::new_v4()])
                .unwrap();
            assert!(!sent);
        }
    }
    assert!(silent(&mut changes).await);

    publisher
        .publish_data_change("Bulk", ContentKind::Point, UpdateKind::Update, [Uuid::new_v4()])
        .unwrap();
    assert_eq!(recv(&mut changes).await.sender, "Bulk");
}

#[tokio::test]
async fn test_job_progress_filtered_by_identity() {
    let _serial = serial().lock().await;
    let hub = Hub::new(HubConfig::in_process());
    let (db, mine, other) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let run = Uuid::new_v4();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let state_tx = tx.clone();
    let dispatcher = Dispatcher::new()
        .on_progress(move |p: Progress| {
            let tx = tx.clone();
            async move {
                // A job view only cares about its own job
                if p.job_id == mine {
                    tx.send(p.message)?;
                }
                Ok(())
            }
        })
        .on_state_change(move |s: StateChange| {
            let tx = state_tx.clone();
            async move {
                if s.job_id == mine {
                    tx.send(format!("state:{}", s.pipeline_state))?;
                }
                Ok(())
            }
        });
    let _subscriber = Subscriber::spawn(&hub.channel("Jobs"), dispatcher, QueueConfig::new("job-view"));
    let publisher = Publisher::new(hub.channel("Jobs"));

    publisher.publish_progress(db, other, run, "runner", "not for us");
    publisher.publish_progress(db, mine, run, "runner", "10%");
    publisher.publish_progress(db, mine, run, "runner", "90%");
    publisher.publish_state_change(db, mine, run, "runner", "finished", "Completed");

    assert_eq!(recv(&mut rx).await, "10%");
    assert_eq!(recv(&mut rx).await, "90%");
    assert_eq!(recv(&mut rx).await, "state:Completed");
}

#[tokio::test]
async fn test_malformed_payload_surfaces_as_error() {
    let hub = Hub::new(HubConfig::in_process());
    let (dispatcher, mut changes, mut errors) = recording_dispatcher();
    let _subscriber = Subscriber::spawn(&hub.channel("Bus"), dispatcher, QueueConfig::new("ui"));

    hub.channel("Bus").publish(b"Importer|photo|new|x".to_vec());

    let message = recv(&mut errors).await;
    assert!(message.contains("Bus"), "message: {message}");
    assert!(silent(&mut changes).await);
}

#[tokio::test]
async fn test_subscriber_suspended_during_reload() {
    let _serial = serial().lock().await;
    let hub = Hub::new(HubConfig::in_process());
    let (dispatcher, mut changes, _errors) = recording_dispatcher();
    let subscriber = Subscriber::spawn(&hub.channel("Bus"), dispatcher, QueueConfig::new("ui"));
    let publisher = Publisher::new(hub.channel("Bus"));

    subscriber.suspend(true);
    for sender in ["a", "b", "c"] {
        publisher
            .publish_data_change(sender, ContentKind::Note, UpdateKind::Update, [Uuid::new_v4()])
            .unwrap();
    }
    assert!(silent(&mut changes).await);

    assert_eq!(subscriber.suspend(false), 3);
    for sender in ["a", "b", "c"] {
        assert_eq!(recv(&mut changes).await.sender, sender);
    }
}

// ============================================================================
// Task queue
// ============================================================================

#[tokio::test]
async fn test_task_queue_runs_jobs_in_order() {
    let tasks = TaskQueue::new(QueueConfig::new("jobs"));
    let (tx, mut rx) = mpsc::unbounded_channel();

    for i in 0..5u32 {
        let tx = tx.clone();
        tasks.enqueue(move || async move {
            tokio::time::sleep(Duration::from_millis(u64::from(5 - i))).await;
            tx.send(i)?;
            Ok(())
        });
    }
    tasks.flush().await;

    let mut order = Vec::new();
    while let Ok(i) = rx.try_recv() {
        order.push(i);
    }
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
}

// ============================================================================
// Cross-process (two hubs sharing a rendezvous directory)
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_notification_crosses_hubs() {
    let _serial = serial().lock().await;
    let dir = tempfile::TempDir::new().unwrap();
    let config = HubConfig::default().with_rendezvous_dir(dir.path());
    let importer = Hub::new(config.clone());
    let viewer = Hub::new(config);

    let (local_dispatcher, mut local_changes, _) = recording_dispatcher();
    let (remote_dispatcher, mut remote_changes, _) = recording_dispatcher();
    let _local = Subscriber::spawn(&importer.channel("Bus"), local_dispatcher, QueueConfig::new("local"));
    let _remote = Subscriber::spawn(&viewer.channel("Bus"), remote_dispatcher, QueueConfig::new("remote"));

    let publisher = Publisher::new(importer.channel("Bus"));
    let id = Uuid::new_v4();
    publisher
        .publish_data_change("Importer", ContentKind::Photo, UpdateKind::New, [id])
        .unwrap();
    publisher.flush().await;

    assert!(recv(&mut remote_changes).await.contains(&id));
    assert!(recv(&mut local_changes).await.contains(&id));

    // Exactly once per subscriber
    assert!(silent(&mut local_changes).await);
    assert!(silent(&mut remote_changes).await);
}

#[cfg(unix)]
#[tokio::test]
async fn test_long_channel_name_crosses_hubs() {
    let _serial = serial().lock().await;
    let channel = "PointlessWaymarks.DataNotifications.SiteGenerationProgress";
    let dir = tempfile::TempDir::new().unwrap();
    let config = HubConfig::default().with_rendezvous_dir(dir.path());
    let generator = Hub::new(config.clone());
    let viewer = Hub::new(config);

    let (dispatcher, mut changes, _) = recording_dispatcher();
    let _viewer = Subscriber::spawn(&viewer.channel(channel), dispatcher, QueueConfig::new("viewer"));

    let publisher = Publisher::new(generator.channel(channel));
    let id = Uuid::new_v4();
    publisher
        .publish_data_change("SiteGenerator", ContentKind::Post, UpdateKind::Update, [id])
        .unwrap();
    publisher.flush().await;

    let change = recv(&mut changes).await;
    assert_eq!(change.sender, "SiteGenerator");
    assert!(change.contains(&id));
}
