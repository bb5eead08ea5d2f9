use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a queue treats items enqueued while it is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPolicy {
    /// Items go straight to the consumer; the queue cannot be suspended
    Immediate,
    /// Items enqueued while suspended wait in a side buffer until resume
    Suspendable {
        /// Start out suspended
        #[serde(default)]
        start_suspended: bool,
    },
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self::Immediate
    }
}

/// Configuration for an ordered work queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Name used in log output
    #[serde(default = "default_name")]
    pub name: String,
    /// Abandon a processor call after this many milliseconds (none = wait forever)
    #[serde(default)]
    pub item_timeout_ms: Option<u64>,
}

fn default_name() -> String {
    "queue".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            item_timeout_ms: None,
        }
    }
}

impl QueueConfig {
    /// Create a configuration with the given queue name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the per-item timeout.
    #[must_use]
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout_ms = Some(timeout.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    /// Per-item timeout, if any.
    #[must_use]
    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_ms.map(Duration::from_millis)
    }

    /// Reject configurations that would stall every item.
    pub fn validate(&self) -> crate::Result<()> {
        if self.item_timeout_ms == Some(0) {
            return Err(crate::Error::InvalidConfig {
                field: "queue.item_timeout_ms".to_string(),
                message: "must be positive when set".to_string(),
            });
        }
        Ok(())
    }
}
