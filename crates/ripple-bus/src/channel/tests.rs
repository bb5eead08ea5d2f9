use super::*;
use crate::config::HubConfig;
use crate::error::TransportError;
use std::time::Duration;

/// Transport that records what it was asked to send and can be told to fail.
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, Vec<u8>)>>,
    listened: Mutex<Vec<String>>,
    fail_sends: bool,
}

impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    fn send(&self, channel: &str, payload: &[u8]) -> Result<usize, TransportError> {
        if self.fail_sends {
            return Err(TransportError::Rendezvous("unreachable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.to_vec()));
        Ok(1)
    }

    fn listen(&self, channel: &str, _deliver: Deliver) -> Result<Listening, TransportError> {
        self.listened.lock().unwrap().push(channel.to_string());
        Ok(Listening::new(()))
    }
}

async fn next(sub: &mut Subscription) -> Delivery {
    tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("no delivery within 5s")
        .expect("channel closed")
}

#[tokio::test]
async fn test_every_instance_receives_including_publisher() {
    let hub = Hub::new(HubConfig::in_process());
    let publisher = hub.channel("Bus");
    let other = hub.channel("Bus");

    let mut own = publisher.subscribe();
    let mut theirs = other.subscribe();
    assert_eq!(publisher.subscriber_count(), 2);

    publisher.publish(b"hello".to_vec());

    let a = next(&mut own).await;
    let b = next(&mut theirs).await;
    assert_eq!(&a.payload[..], b"hello");
    assert_eq!(&b.payload[..], b"hello");
    assert_eq!(a.sender.origin, Origin::Local(hub.id()));
}

#[tokio::test]
async fn test_channels_with_different_names_are_separate() {
    let hub = Hub::new(HubConfig::in_process());
    let mut other = hub.channel("Other").subscribe();

    hub.channel("Bus").publish(b"x".to_vec());

    let got = tokio::time::timeout(Duration::from_millis(50), other.recv()).await;
    assert!(got.is_err(), "message leaked across channel names");
}

#[tokio::test]
async fn test_publish_without_subscribers_is_fine() {
    let hub = Hub::new(HubConfig::in_process());
    hub.channel("Nobody").publish(b"into the void".to_vec());
}

#[tokio::test]
async fn test_order_preserved_per_publisher() {
    let hub = Hub::new(HubConfig::in_process());
    let channel = hub.channel("Bus");
    let mut sub = channel.subscribe();

    for i in 0..20u8 {
        channel.publish(vec![i]);
    }
    for i in 0..20u8 {
        assert_eq!(next(&mut sub).await.payload[0], i);
    }
}

#[tokio::test]
async fn test_transport_sees_every_publish() {
    let transport = Arc::new(RecordingTransport::default());
    let hub = Hub::with_transport(HubConfig::default(), transport.clone());

    hub.channel("Bus").publish(b"one".to_vec());
    hub.channel("Bus").publish(b"two".to_vec());

    let sent = transport.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![
            ("Bus".to_string(), b"one".to_vec()),
            ("Bus".to_string(), b"two".to_vec()),
        ]
    );
}

#[tokio::test]
async fn test_transport_failure_is_not_surfaced() {
    let transport = Arc::new(RecordingTransport {
        fail_sends: true,
        ..RecordingTransport::default()
    });
    let hub = Hub::with_transport(HubConfig::default(), transport);
    let channel = hub.channel("Bus");
    let mut sub = channel.subscribe();

    // Host failure must not stop in-process delivery
    channel.publish(b"still here".to_vec());
    assert_eq!(&next(&mut sub).await.payload[..], b"still here");
}

#[tokio::test]
async fn test_listener_bound_once_per_channel() {
    let transport = Arc::new(RecordingTransport::default());
    let hub = Hub::with_transport(HubConfig::default(), transport.clone());

    let _a = hub.channel("Bus").subscribe();
    let _b = hub.channel("Bus").subscribe();
    let _c = hub.channel("Other").subscribe();

    let listened = transport.listened.lock().unwrap().clone();
    assert_eq!(listened, vec!["Bus".to_string(), "Other".to_string()]);
}

#[tokio::test]
async fn test_lagging_subscriber_skips_oldest() {
    let hub = Hub::new(HubConfig::in_process().with_capacity(2));
    let channel = hub.channel("Bus");
    let mut sub = channel.subscribe();

    for i in 0..5u8 {
        channel.publish(vec![i]);
    }

    // Only the newest `capacity` payloads survive
    assert_eq!(next(&mut sub).await.payload[0], 3);
    assert_eq!(next(&mut sub).await.payload[0], 4);
}

#[cfg(unix)]
#[tokio::test]
async fn test_hubs_sharing_rendezvous_reach_each_other() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = HubConfig::default().with_rendezvous_dir(dir.path());
    let process_a = Hub::new(config.clone());
    let process_b = Hub::new(config);

    let mut a_sub = process_a.channel("Bus").subscribe();
    let mut b_sub = process_b.channel("Bus").subscribe();

    process_a.channel("Bus").publish(b"cross".to_vec());

    let remote = next(&mut b_sub).await;
    assert_eq!(&remote.payload[..], b"cross");
    assert_eq!(remote.sender.origin, Origin::Host(process_a.id()));

    // The publisher's own subscriber gets it exactly once, locally
    let local = next(&mut a_sub).await;
    assert_eq!(local.sender.origin, Origin::Local(process_a.id()));
    let dup = tokio::time::timeout(Duration::from_millis(100), a_sub.recv()).await;
    assert!(dup.is_err(), "publisher hub received its own payload twice");
}
