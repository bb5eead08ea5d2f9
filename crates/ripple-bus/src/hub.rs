//! Hub - the registry behind named channels
//!
//! A hub maps channel names to shared buses. Every [`Channel`] handle obtained
//! for a name from one hub talks to the same bus; hubs that share a rendezvous
//! directory reach each other through the host transport, exactly as separate
//! processes on one machine do.
//!
//! [`Hub::global`] is the process-wide hub used by [`Channel::new`].

use crate::channel::{Bus, Channel};
use crate::config::HubConfig;
use crate::transport::Transport;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};
use uuid::Uuid;

static GLOBAL_HUB: OnceLock<Hub> = OnceLock::new();

/// Identity of one hub, embedded in every datagram it sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HubId(Uuid);

impl HubId {
    /// Fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying uuid.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HubId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for HubId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for HubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

struct HubInner {
    id: HubId,
    config: HubConfig,
    transport: Option<Arc<dyn Transport>>,
    buses: DashMap<String, Arc<Bus>>,
}

/// Registry of named channels.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("id", &self.inner.id)
            .field("channels", &self.inner.buses.len())
            .field(
                "transport",
                &self.inner.transport.as_ref().map(|t| t.name().to_string()),
            )
            .finish()
    }
}

impl Hub {
    /// Create a hub from configuration.
    ///
    /// Nothing touches the filesystem until a channel is first subscribed
    /// to or published on.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        let id = HubId::new();
        let transport = if config.host_transport {
            host_transport(&config, id)
        } else {
            None
        };
        Self::build(id, config, transport)
    }

    /// Create a hub with a caller-supplied transport.
    #[must_use]
    pub fn with_transport(config: HubConfig, transport: Arc<dyn Transport>) -> Self {
        Self::build(HubId::new(), config, Some(transport))
    }

    fn build(id: HubId, config: HubConfig, transport: Option<Arc<dyn Transport>>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                id,
                config,
                transport,
                buses: DashMap::new(),
            }),
        }
    }

    /// The process-wide hub, created with default configuration on first use
    /// unless [`Hub::init_global`] ran first.
    pub fn global() -> &'static Hub {
        GLOBAL_HUB.get_or_init(|| Hub::new(HubConfig::default()))
    }

    /// Install the process-wide hub with explicit configuration.
    ///
    /// Returns `false` (and changes nothing) when the global hub already exists.
    pub fn init_global(config: HubConfig) -> bool {
        let mut installed = false;
        GLOBAL_HUB.get_or_init(|| {
            installed = true;
            Hub::new(config)
        });
        if !installed {
            warn!("Global hub already initialized, configuration ignored");
        }
        installed
    }

    /// Hub identity.
    #[must_use]
    pub fn id(&self) -> HubId {
        self.inner.id
    }

    /// Hub configuration.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Name of the host transport, if one is active.
    #[must_use]
    pub fn transport_name(&self) -> Option<&str> {
        self.inner.transport.as_ref().map(|t| t.name())
    }

    /// Handle to the channel called `name`. Performs no I/O.
    #[must_use]
    pub fn channel(&self, name: &str) -> Channel {
        if let Some(bus) = self.inner.buses.get(name) {
            return Channel::from_bus(Arc::clone(bus.value()));
        }

        let bus = self
            .inner
            .buses
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Bus::new(
                    name,
                    self.inner.id,
                    self.inner.config.capacity.max(1),
                    self.inner.transport.clone(),
                ))
            })
            .value()
            .clone();
        Channel::from_bus(bus)
    }

    /// Names of the channels opened on this hub so far.
    #[must_use]
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.buses.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(unix)]
fn host_transport(config: &HubConfig, id: HubId) -> Option<Arc<dyn Transport>> {
    let root = config.resolved_rendezvous_dir();
    debug!(hub = %id, rendezvous = %root.display(), "Host transport configured");
    Some(Arc::new(crate::transport::UnixDatagramTransport::new(
        root,
        id,
        config.max_payload_bytes,
    )))
}

#[cfg(not(unix))]
fn host_transport(_config: &HubConfig, id: HubId) -> Option<Arc<dyn Transport>> {
    debug!(hub = %id, "No host transport on this platform, channels stay in-process");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_same_bus() {
        let hub = Hub::new(HubConfig::in_process());
        let a = hub.channel("Bus");
        let b = hub.channel("Bus");
        let c = hub.channel("Other");

        assert!(a.same_bus(&b));
        assert!(!a.same_bus(&c));
        assert_eq!(hub.channel_names(), vec!["Bus".to_string(), "Other".to_string()]);
    }

    #[test]
    fn test_hubs_are_isolated() {
        let one = Hub::new(HubConfig::in_process());
        let two = Hub::new(HubConfig::in_process());
        assert_ne!(one.id(), two.id());
        assert!(!one.channel("Bus").same_bus(&two.channel("Bus")));
    }

    #[test]
    fn test_in_process_hub_has_no_transport() {
        let hub = Hub::new(HubConfig::in_process());
        assert!(hub.transport_name().is_none());
    }

    #[test]
    fn test_channel_creation_does_no_io() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("rendezvous");
        let hub = Hub::new(HubConfig::default().with_rendezvous_dir(&root));

        let _channel = hub.channel("Bus");
        assert!(!root.exists());
    }

    #[test]
    fn test_hub_id_display_is_hyphenated_uuid() {
        let id = HubId::new();
        assert_eq!(id.to_string().len(), 36);
        assert_eq!(Uuid::parse_str(&id.to_string()).unwrap(), *id.as_uuid());
    }
}
