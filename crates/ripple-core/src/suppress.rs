//! Notification suppression
//!
//! A process-wide advisory switch that makes publishers drop notifications,
//! used while bulk imports or rebuilds would otherwise flood the bus.
//!
//! Prefer [`SuppressionGuard`] over the raw setter: the guard restores the
//! previous state when it goes out of scope, so nested bulk operations compose.
//!
//! ```ignore
//! {
//!     let _quiet = SuppressionGuard::new();
//!     import_everything().await?;
//! } // publishing resumes here
//! ```
//!
//! The flag is checked once per publish call. Items already handed to a
//! publisher queue are never affected, and a race at a flip boundary costs at
//! most one extra or one missed notification.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

static SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Whether publishing is currently suppressed.
#[must_use]
pub fn notifications_suppressed() -> bool {
    SUPPRESSED.load(Ordering::Relaxed)
}

/// Set the suppression flag, returning its previous value.
pub fn set_notifications_suppressed(suppressed: bool) -> bool {
    let previous = SUPPRESSED.swap(suppressed, Ordering::Relaxed);
    if previous != suppressed {
        debug!(suppressed, "Notification suppression changed");
    }
    previous
}

/// Scope during which publishing is suppressed.
///
/// Dropping the guard restores whatever state was in effect when it was created.
#[must_use = "suppression ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SuppressionGuard {
    previous: bool,
}

impl SuppressionGuard {
    /// Suppress publishing until the guard is dropped.
    pub fn new() -> Self {
        Self::with_state(true)
    }

    /// Force a specific state until the guard is dropped.
    ///
    /// `with_state(false)` re-enables publishing inside a suppressed region.
    pub fn with_state(suppressed: bool) -> Self {
        Self {
            previous: set_notifications_suppressed(suppressed),
        }
    }
}

impl Default for SuppressionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        set_notifications_suppressed(self.previous);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch the process-wide flag.
    pub(crate) static FLAG_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_is_off() {
        let _lock = FLAG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        assert!(!notifications_suppressed());
    }

    #[test]
    fn test_setter_returns_previous() {
        let _lock = FLAG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        assert!(!set_notifications_suppressed(true));
        assert!(notifications_suppressed());
        assert!(set_notifications_suppressed(false));
        assert!(!notifications_suppressed());
    }

    #[test]
    fn test_guard_restores_previous_state() {
        let _lock = FLAG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        {
            let _outer = SuppressionGuard::new();
            assert!(notifications_suppressed());
            {
                let _inner = SuppressionGuard::new();
                assert!(notifications_suppressed());
            }
            // Inner guard must not re-enable publishing for the outer scope
            assert!(notifications_suppressed());
            {
                let _allow = SuppressionGuard::with_state(false);
                assert!(!notifications_suppressed());
            }
            assert!(notifications_suppressed());
        }
        assert!(!notifications_suppressed());
    }
}
