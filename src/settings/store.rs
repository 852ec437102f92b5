//! Shared settings store with a single change subscriber.
//!
//! Every mutation goes through the store, which forwards one
//! [`SettingsChange`] message per mutation to whoever subscribed last
//! (the persistence manager in practice). Messages are dropped while the
//! store is marked as initializing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard};

use tokio::sync::mpsc;
use tracing::trace;

use crate::services::ServiceType;

use super::model::{GeneralSettings, ServiceSettings, SettingsModel};

/// What part of the model changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsChange {
    General,
    Service(ServiceType),
    /// The `use_wsl` flag flipped to the given value.
    ExecutionMode(bool),
}

/// Receiving end handed to the subscriber.
pub type ChangeReceiver = mpsc::UnboundedReceiver<SettingsChange>;

/// The in-memory settings aggregate shared across the application.
pub struct SettingsStore {
    model: RwLock<SettingsModel>,
    initializing: AtomicBool,
    subscriber: Mutex<Option<mpsc::UnboundedSender<SettingsChange>>>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(SettingsModel::default())
    }
}

impl SettingsStore {
    pub fn new(model: SettingsModel) -> Self {
        Self {
            model: RwLock::new(model),
            initializing: AtomicBool::new(false),
            subscriber: Mutex::new(None),
        }
    }

    /// Owned copy of the current model.
    pub fn snapshot(&self) -> SettingsModel {
        self.read().clone()
    }

    /// Borrow the current model. Do not hold the guard across an await.
    pub fn read(&self) -> RwLockReadGuard<'_, SettingsModel> {
        self.model.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Mutate the global flags.
    ///
    /// A change of `use_wsl` is reported as [`SettingsChange::ExecutionMode`]
    /// instead of [`SettingsChange::General`].
    pub fn update_general<F>(&self, f: F)
    where
        F: FnOnce(&mut GeneralSettings),
    {
        let (before, after) = {
            let mut model = self.model.write().unwrap_or_else(|e| e.into_inner());
            let before = model.general.use_wsl;
            f(&mut model.general);
            (before, model.general.use_wsl)
        };

        if before != after {
            self.notify(SettingsChange::ExecutionMode(after));
        } else {
            self.notify(SettingsChange::General);
        }
    }

    /// Mutate one service block.
    pub fn update_service<F>(&self, service_type: ServiceType, f: F)
    where
        F: FnOnce(&mut ServiceSettings),
    {
        {
            let mut model = self.model.write().unwrap_or_else(|e| e.into_inner());
            f(model.service_mut(service_type));
        }
        self.notify(SettingsChange::Service(service_type));
    }

    /// Mutate the whole model, reporting it as `change`.
    ///
    /// Used for type-specific fields outside [`ServiceSettings`], such as
    /// Apache's document root.
    pub fn update_model<F>(&self, change: SettingsChange, f: F)
    where
        F: FnOnce(&mut SettingsModel),
    {
        {
            let mut model = self.model.write().unwrap_or_else(|e| e.into_inner());
            f(&mut model);
        }
        self.notify(change);
    }

    pub fn set_use_wsl(&self, use_wsl: bool) {
        self.update_general(|general| general.use_wsl = use_wsl);
    }

    /// Swap in a freshly loaded model. Never notifies.
    pub fn replace(&self, model: SettingsModel) {
        let mut current = self.model.write().unwrap_or_else(|e| e.into_inner());
        *current = model;
    }

    /// Register the single subscriber, replacing any previous one.
    pub fn subscribe(&self) -> ChangeReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.subscriber.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        rx
    }

    /// Drop the subscriber. Its receiver sees the channel close.
    pub fn unsubscribe(&self) {
        self.subscriber
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Suppress (or resume) change notifications.
    pub fn set_initializing(&self, initializing: bool) {
        self.initializing.store(initializing, Ordering::SeqCst);
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing.load(Ordering::SeqCst)
    }

    fn notify(&self, change: SettingsChange) {
        if self.is_initializing() {
            trace!(?change, "Change suppressed while initializing");
            return;
        }

        let mut subscriber = self.subscriber.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = subscriber.as_ref() {
            if tx.send(change).is_err() {
                // Receiver dropped without unsubscribing.
                subscriber.take();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_service_notifies() {
        let store = SettingsStore::default();
        let mut rx = store.subscribe();

        store.update_service(ServiceType::Redis, |s| s.port = Some(6380));

        assert_eq!(store.read().redis.port, Some(6380));
        assert_eq!(
            rx.try_recv().unwrap(),
            SettingsChange::Service(ServiceType::Redis)
        );
    }

    #[test]
    fn test_use_wsl_flip_reports_execution_mode() {
        let store = SettingsStore::default();
        let mut rx = store.subscribe();

        store.set_use_wsl(true);
        assert_eq!(rx.try_recv().unwrap(), SettingsChange::ExecutionMode(true));

        // Same value again is an ordinary general change.
        store.set_use_wsl(true);
        assert_eq!(rx.try_recv().unwrap(), SettingsChange::General);
    }

    #[test]
    fn test_initializing_suppresses() {
        let store = SettingsStore::default();
        let mut rx = store.subscribe();

        store.set_initializing(true);
        store.update_general(|g| g.enable_ngrok = true);
        store.set_initializing(false);

        assert!(rx.try_recv().is_err());
        assert!(store.read().general.enable_ngrok);
    }

    #[test]
    fn test_replace_is_silent() {
        let store = SettingsStore::default();
        let mut rx = store.subscribe();

        let mut model = SettingsModel::default();
        model.php.selected_version = "8.3.4".to_string();
        store.replace(model);

        assert!(rx.try_recv().is_err());
        assert_eq!(store.snapshot().php.selected_version, "8.3.4");
    }

    #[test]
    fn test_unsubscribe_closes_channel() {
        let store = SettingsStore::default();
        let mut rx = store.subscribe();
        store.unsubscribe();

        store.update_general(|g| g.minimize_to_tray = false);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));

        // A later subscriber starts receiving again.
        let mut fresh = store.subscribe();
        store.update_general(|g| g.minimize_to_tray = true);
        assert_eq!(fresh.try_recv().unwrap(), SettingsChange::General);
    }
}
