//! Shared, atomically replaceable ephemeris provider
//!
//! The initializer task is the only writer: it loads a provider and
//! publishes the outcome in a single pointer swap. Readers take an `Arc`
//! snapshot and so never observe a half-built provider. Readers that find
//! the provider broken may only *request* a reload.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use super::{EphemerisLoader, EphemerisProvider};

pub enum ProviderState {
    Uninitialized,
    Ready(Arc<dyn EphemerisProvider>),
    Failed(String),
}

impl fmt::Debug for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Ready(provider) => write!(f, "Ready({})", provider.name()),
            Self::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

pub struct ProviderHandle {
    state: RwLock<Arc<ProviderState>>,
    reload_requested: AtomicBool,
    reload_notify: Notify,
}

impl Default for ProviderHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderHandle {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Arc::new(ProviderState::Uninitialized)),
            reload_requested: AtomicBool::new(false),
            reload_notify: Notify::new(),
        }
    }

    /// Handle that starts out with a ready provider (tests, embedding)
    pub fn ready(provider: Arc<dyn EphemerisProvider>) -> Self {
        let handle = Self::new();
        handle.publish(ProviderState::Ready(provider));
        handle
    }

    /// Current state; stays valid even if a new state is published after.
    pub fn snapshot(&self) -> Arc<ProviderState> {
        Arc::clone(&self.state.read())
    }

    pub fn provider(&self) -> Option<Arc<dyn EphemerisProvider>> {
        match &*self.snapshot() {
            ProviderState::Ready(provider) => Some(Arc::clone(provider)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.snapshot(), ProviderState::Ready(_))
    }

    /// Replace the state and clear any outstanding reload request.
    pub fn publish(&self, state: ProviderState) {
        let state = Arc::new(state);
        *self.state.write() = state;
        self.reload_requested.store(false, Ordering::Release);
    }

    /// Ask the initializer to reload. Returns `true` only for the call that
    /// raised the request; later calls while it is pending are no-ops.
    pub fn request_reload(&self) -> bool {
        let first = self
            .reload_requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            warn!("ephemeris provider failed validation, reload requested");
            self.reload_notify.notify_one();
        }
        first
    }

    pub fn reload_pending(&self) -> bool {
        self.reload_requested.load(Ordering::Acquire)
    }

    /// Resolves once a reload has been requested.
    pub async fn reload_wanted(&self) {
        self.reload_notify.notified().await;
    }

    /// Run the loader and publish its outcome. Blocking; the runtime calls
    /// this from `spawn_blocking`.
    pub fn load_and_publish(&self, loader: &dyn EphemerisLoader, path_hint: Option<&Path>) -> bool {
        match loader.load(path_hint) {
            Ok(provider) => {
                info!("ephemeris provider '{}' ready", provider.name());
                self.publish(ProviderState::Ready(provider));
                true
            }
            Err(e) => {
                error!("ephemeris provider failed to load: {e}");
                self.publish(ProviderState::Failed(e.to_string()));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::SeriesEphemeris;
    use crate::error::EphemerisError;

    struct Broken;

    impl EphemerisLoader for Broken {
        fn load(
            &self,
            _path_hint: Option<&Path>,
        ) -> Result<Arc<dyn EphemerisProvider>, EphemerisError> {
            Err(EphemerisError::NotLoaded)
        }
    }

    struct Series;

    impl EphemerisLoader for Series {
        fn load(
            &self,
            _path_hint: Option<&Path>,
        ) -> Result<Arc<dyn EphemerisProvider>, EphemerisError> {
            Ok(Arc::new(SeriesEphemeris::new()))
        }
    }

    #[test]
    fn starts_uninitialized() {
        let handle = ProviderHandle::new();
        assert!(!handle.is_ready());
        assert!(matches!(*handle.snapshot(), ProviderState::Uninitialized));
    }

    #[test]
    fn failed_load_publishes_failure() {
        let handle = ProviderHandle::new();
        assert!(!handle.load_and_publish(&Broken, None));
        assert!(matches!(*handle.snapshot(), ProviderState::Failed(_)));
        assert!(handle.provider().is_none());
    }

    #[test]
    fn snapshot_survives_republish() {
        let handle = ProviderHandle::new();
        assert!(handle.load_and_publish(&Series, None));
        let before = handle.snapshot();
        handle.publish(ProviderState::Failed("gone".into()));
        assert!(matches!(*before, ProviderState::Ready(_)));
        assert!(!handle.is_ready());
    }

    #[test]
    fn reload_is_requested_once_until_published() {
        let handle = ProviderHandle::ready(Arc::new(SeriesEphemeris::new()));
        assert!(handle.request_reload());
        assert!(!handle.request_reload());
        assert!(handle.reload_pending());
        handle.load_and_publish(&Series, None);
        assert!(!handle.reload_pending());
        assert!(handle.request_reload());
    }

    #[tokio::test]
    async fn request_before_wait_is_not_lost() {
        let handle = ProviderHandle::new();
        handle.request_reload();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle.reload_wanted())
            .await
            .unwrap();
    }
}
