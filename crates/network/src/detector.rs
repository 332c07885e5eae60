// crates/network/src/detector.rs
//! Network detector
//!
//! Holds the last known connectivity state, fans out change notifications to
//! subscribers and decides whether the link is good enough to sync over.
//!
//! The platform feeds the detector through [`NetworkDetector::set_online`],
//! [`NetworkDetector::set_link_quality`] or [`NetworkDetector::update`]. Where
//! no passive signal exists, [`NetworkDetector::spawn_monitor`] probes instead.

use crate::connectivity::ConnectivityChecker;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Physical link kind as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    Bluetooth,
    Other,
    Unknown,
    None,
}

/// Observed link quality bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

impl EffectiveType {
    /// Returns true if the link is too poor to sync over
    pub fn is_too_slow(&self) -> bool {
        matches!(self, EffectiveType::Slow2g)
    }
}

/// Snapshot of connectivity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub is_online: bool,
    pub connection_type: Option<ConnectionType>,
    pub effective_type: Option<EffectiveType>,
    /// Estimated bandwidth in Mbit/s
    pub downlink: Option<f64>,
    /// Estimated round trip in ms
    pub rtt: Option<u32>,
}

impl NetworkState {
    /// Online with no quality information
    pub fn online() -> Self {
        Self {
            is_online: true,
            connection_type: None,
            effective_type: None,
            downlink: None,
            rtt: None,
        }
    }

    /// Offline with no quality information
    pub fn offline() -> Self {
        Self {
            is_online: false,
            ..Self::online()
        }
    }

    /// Returns true if syncing should be attempted in this state
    ///
    /// Missing quality information does not block syncing.
    pub fn is_syncable(&self) -> bool {
        self.is_online && !self.effective_type.is_some_and(|t| t.is_too_slow())
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::online()
    }
}

type Listener = Arc<dyn Fn(&NetworkState) + Send + Sync>;

struct Inner {
    state: RwLock<NetworkState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    checker: ConnectivityChecker,
}

/// Shared handle to the connectivity state
///
/// Cloning is cheap; all clones observe the same state and listeners.
#[derive(Clone)]
pub struct NetworkDetector {
    inner: Arc<Inner>,
}

impl NetworkDetector {
    /// Creates a detector that assumes it is online until told otherwise
    pub fn new(checker: ConnectivityChecker) -> Self {
        Self::with_state(checker, NetworkState::online())
    }

    /// Creates a detector with a known initial state
    pub fn with_state(checker: ConnectivityChecker, initial: NetworkState) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(initial),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                checker,
            }),
        }
    }

    /// Returns the current state
    pub fn state(&self) -> NetworkState {
        match self.inner.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns true if the device is believed to be online
    pub fn is_online(&self) -> bool {
        self.state().is_online
    }

    /// Returns true if syncing should be attempted now
    pub fn is_syncable(&self) -> bool {
        self.state().is_syncable()
    }

    /// Registers a listener called on every state change
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NetworkState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        lock_listeners(&self.inner).push((id, Arc::new(listener)));

        Subscription {
            id,
            detector: Arc::downgrade(&self.inner),
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        lock_listeners(&self.inner).len()
    }

    /// Records an online/offline transition
    pub fn set_online(&self, is_online: bool) {
        self.modify(|state| state.is_online = is_online);
    }

    /// Records new link quality readings
    pub fn set_link_quality(
        &self,
        connection_type: Option<ConnectionType>,
        effective_type: Option<EffectiveType>,
        downlink: Option<f64>,
        rtt: Option<u32>,
    ) {
        self.modify(|state| {
            state.connection_type = connection_type;
            state.effective_type = effective_type;
            state.downlink = downlink;
            state.rtt = rtt;
        });
    }

    /// Replaces the whole state
    pub fn update(&self, new_state: NetworkState) {
        self.modify(|state| *state = new_state);
    }

    /// Actively probes connectivity, giving up after `timeout`
    ///
    /// Does not change the stored state.
    pub async fn test_connectivity(&self, timeout: Duration) -> bool {
        self.inner.checker.probe(timeout).await
    }

    /// Starts a background task that probes every `interval` and feeds the result
    /// into [`set_online`](Self::set_online)
    ///
    /// The task ends once every handle to the detector is dropped.
    pub fn spawn_monitor(&self, interval: Duration, timeout: Duration) -> JoinHandle<()> {
        let detector = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(inner) = detector.upgrade() else {
                    break;
                };
                let handle = NetworkDetector { inner };
                let online = handle.test_connectivity(timeout).await;
                handle.set_online(online);
            }

            log::debug!("Network monitor stopped");
        })
    }

    fn modify<F>(&self, change: F)
    where
        F: FnOnce(&mut NetworkState),
    {
        let changed = {
            let mut state = match self.inner.state.write() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            let before = state.clone();
            change(&mut state);
            (*state != before).then(|| state.clone())
        };

        if let Some(state) = changed {
            log::debug!(
                "Network state changed: online={} effective={:?}",
                state.is_online,
                state.effective_type
            );
            self.notify(&state);
        }
    }

    fn notify(&self, state: &NetworkState) {
        // Listeners run outside the lock so they may subscribe or unsubscribe.
        let listeners: Vec<Listener> = lock_listeners(&self.inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(state))).is_err() {
                log::error!("Network listener panicked; continuing with remaining listeners");
            }
        }
    }
}

fn lock_listeners(inner: &Inner) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
    match inner.listeners.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Keeps a listener registered with a [`NetworkDetector`]
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    detector: Weak<Inner>,
}

impl Subscription {
    /// Removes the listener
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.detector.upgrade() {
            lock_listeners(&inner).retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
