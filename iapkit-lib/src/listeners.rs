//! Purchase event fan-out.
//!
//! One wrapped native callback per event kind is installed on the bridge.
//! It validates and converts the native payload, then delivers the result to
//! every registered application listener in registration order.
//!
//! Registries are copy-on-iterate: [`ListenerRegistry::emit`] snapshots the
//! entries before invoking them, so a listener may add or remove listeners
//! (itself included) while being called.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tracing::{debug, error, warn};

use crate::bridge::{NativeBridge, NativeErrorCallback, NativeProductCallback, NativePurchaseCallback};
use crate::convert::{is_valid_product, is_valid_purchase, to_product, to_purchase, to_purchase_error};
use crate::errors::{ErrorCode, PurchaseError};
use crate::native::{NativeError, NativeProduct, NativePurchase};
use crate::types::{Platform, Product, Purchase};

/// An application-level listener.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    alive: Arc<AtomicBool>,
    callback: Listener<T>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            alive: Arc::clone(&self.alive),
            callback: Arc::clone(&self.callback),
        }
    }
}

struct RegistryInner<T> {
    next_id: AtomicU64,
    entries: RwLock<Vec<Entry<T>>>,
}

impl<T> RegistryInner<T> {
    fn remove(&self, id: u64) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|entry| entry.id != id);
    }
}

/// Ordered set of listeners for one event kind.
pub struct ListenerRegistry<T> {
    inner: Arc<RegistryInner<T>>,
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                next_id: AtomicU64::new(1),
                entries: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> ListenerRegistry<T> {
    /// Register a listener. It stays registered until the returned handle is removed.
    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let alive = Arc::new(AtomicBool::new(true));
        self.inner
            .entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Entry {
                id,
                alive: Arc::clone(&alive),
                callback: Arc::new(callback),
            });

        let registry: Weak<RegistryInner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            alive,
            detach: Some(Arc::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.remove(id);
                }
            })),
        }
    }

    /// Deliver `value` to every listener registered when the call started.
    ///
    /// Listeners removed during delivery are skipped. A panicking listener is
    /// logged and does not prevent delivery to the rest. Returns the number of
    /// listeners that completed.
    pub fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Entry<T>> = self
            .inner
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let mut delivered = 0;
        for entry in snapshot {
            if !entry.alive.load(Ordering::Acquire) {
                continue;
            }
            let callback = &entry.callback;
            match catch_unwind(AssertUnwindSafe(|| callback(value))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(listener_id = entry.id, "listener panicked"),
            }
        }
        delivered
    }
}

/// Handle for one registered listener.
///
/// Dropping the handle leaves the listener registered; call
/// [`Subscription::remove`] to unregister it.
#[derive(Clone)]
pub struct Subscription {
    alive: Arc<AtomicBool>,
    detach: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Subscription {
    /// A handle that is not backed by any registry.
    pub fn inert() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
            detach: None,
        }
    }

    /// Unregister the listener. Safe to call more than once and after the
    /// owning client is gone.
    pub fn remove(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            if let Some(detach) = &self.detach {
                detach();
            }
        }
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .field("inert", &self.detach.is_none())
            .finish()
    }
}

struct InstalledCallbacks {
    purchase: NativePurchaseCallback,
    error: NativeErrorCallback,
    promoted: Option<NativeProductCallback>,
}

/// Owns the application listeners and the native callbacks feeding them.
pub struct ListenerManager {
    platform: Platform,
    purchase_updated: ListenerRegistry<Purchase>,
    purchase_error: ListenerRegistry<PurchaseError>,
    promoted_product: ListenerRegistry<Product>,
    connected: Arc<AtomicBool>,
    installed: Mutex<Option<InstalledCallbacks>>,
}

impl ListenerManager {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            purchase_updated: ListenerRegistry::new(),
            purchase_error: ListenerRegistry::new(),
            promoted_product: ListenerRegistry::new(),
            connected: Arc::new(AtomicBool::new(false)),
            installed: Mutex::new(None),
        }
    }

    /// Register a purchase-updated listener.
    pub fn purchase_updated_listener<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Purchase) + Send + Sync + 'static,
    {
        self.purchase_updated.add(callback)
    }

    /// Register a purchase-error listener.
    pub fn purchase_error_listener<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PurchaseError) + Send + Sync + 'static,
    {
        self.purchase_error.add(callback)
    }

    /// Register a promoted-product listener.
    ///
    /// Android has no promoted products: the returned handle is inert.
    pub fn promoted_product_listener_ios<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Product) + Send + Sync + 'static,
    {
        match self.platform {
            Platform::Ios => self.promoted_product.add(callback),
            Platform::Android => {
                warn!("promoted product listener is only supported on iOS");
                Subscription::inert()
            }
        }
    }

    /// Record whether the connection handshake has completed.
    pub fn mark_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Whether native callbacks are currently installed.
    pub fn is_attached(&self) -> bool {
        self.installed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Install the native callbacks on `bridge`. No-op when already installed.
    pub fn attach(&self, bridge: &dyn NativeBridge) {
        let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
        if installed.is_some() {
            return;
        }

        let purchase = self.purchase_callback();
        let error = self.error_callback();
        bridge.add_purchase_updated_listener(Arc::clone(&purchase));
        bridge.add_purchase_error_listener(Arc::clone(&error));

        let promoted = (self.platform == Platform::Ios).then(|| {
            let promoted = self.promoted_callback();
            bridge.add_promoted_product_listener(Arc::clone(&promoted));
            promoted
        });

        *installed = Some(InstalledCallbacks {
            purchase,
            error,
            promoted,
        });
    }

    /// Remove the callbacks installed by [`attach`](Self::attach).
    pub fn detach(&self, bridge: &dyn NativeBridge) {
        let installed = self
            .installed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(installed) = installed else {
            return;
        };
        bridge.remove_purchase_updated_listener(&installed.purchase);
        bridge.remove_purchase_error_listener(&installed.error);
        if let Some(promoted) = &installed.promoted {
            bridge.remove_promoted_product_listener(promoted);
        }
    }

    fn purchase_callback(&self) -> NativePurchaseCallback {
        let registry = self.purchase_updated.clone();
        let platform = self.platform;
        Arc::new(move |mut native: NativePurchase| {
            if !is_valid_purchase(Some(&native)) {
                warn!(id = ?native.id, product_id = ?native.product_id, "dropping invalid purchase event");
                return;
            }
            native
                .platform
                .get_or_insert_with(|| platform.as_str().to_string());
            match to_purchase(&native) {
                Some(purchase) => {
                    registry.emit(&purchase);
                }
                None => warn!(id = ?native.id, "dropping unconvertible purchase event"),
            }
        })
    }

    fn error_callback(&self) -> NativeErrorCallback {
        let registry = self.purchase_error.clone();
        let connected = Arc::clone(&self.connected);
        let platform = self.platform;
        Arc::new(move |native: NativeError| {
            let err = to_purchase_error(&native, Some(platform));
            if err.code == ErrorCode::InitConnection && !connected.load(Ordering::Acquire) {
                debug!(message = %err.message, "suppressing init-connection error before handshake");
                return;
            }
            registry.emit(&err);
        })
    }

    fn promoted_callback(&self) -> NativeProductCallback {
        let registry = self.promoted_product.clone();
        let platform = self.platform;
        Arc::new(move |mut native: NativeProduct| {
            if !is_valid_product(Some(&native)) {
                warn!("dropping invalid promoted product event");
                return;
            }
            native
                .platform
                .get_or_insert_with(|| platform.as_str().to_string());
            match to_product(&native) {
                Some(product) => {
                    registry.emit(&product);
                }
                None => warn!(id = ?native.id, "dropping unconvertible promoted product"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockBridge};

    #[test]
    fn test_registry_order_and_removal() {
        let registry = ListenerRegistry::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<_> = (0..3)
            .map(|i| {
                let seen = Arc::clone(&seen);
                registry.add(move |v: &u32| seen.lock().unwrap().push((i, *v)))
            })
            .collect();

        assert_eq!(registry.emit(&1), 3);
        subs[1].remove();
        subs[1].remove();
        assert!(!subs[1].is_active());
        assert_eq!(registry.emit(&2), 2);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(0, 1), (1, 1), (2, 1), (0, 2), (2, 2)]
        );
    }

    #[test]
    fn test_self_removal_during_emit() {
        let registry = ListenerRegistry::<()>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicU64::new(0));

        let sub = {
            let slot = Arc::clone(&slot);
            let count = Arc::clone(&count);
            registry.add(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().unwrap().as_ref() {
                    sub.remove();
                }
            })
        };
        *slot.lock().unwrap() = Some(sub);

        registry.emit(&());
        registry.emit(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let registry = ListenerRegistry::<u8>::new();
        let reached = Arc::new(AtomicBool::new(false));
        registry.add(|_| panic!("listener failure"));
        {
            let reached = Arc::clone(&reached);
            registry.add(move |_| reached.store(true, Ordering::SeqCst));
        }
        assert_eq!(registry.emit(&0), 1);
        assert!(reached.load(Ordering::SeqCst));
    }

    #[test]
    fn test_remove_after_registry_dropped() {
        let registry = ListenerRegistry::<u8>::new();
        let sub = registry.add(|_| {});
        drop(registry);
        sub.remove();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_attach_is_idempotent_and_detach_removes_exact_callbacks() {
        let bridge = MockBridge::new(Platform::Ios);
        let manager = ListenerManager::new(Platform::Ios);

        manager.attach(bridge.as_ref());
        manager.attach(bridge.as_ref());
        assert_eq!(bridge.listener_counts(), (1, 1, 1));

        manager.detach(bridge.as_ref());
        assert_eq!(bridge.listener_counts(), (0, 0, 0));
        assert!(!manager.is_attached());
    }

    #[test]
    fn test_invalid_purchase_event_is_dropped() {
        let bridge = MockBridge::new(Platform::Android);
        let manager = ListenerManager::new(Platform::Android);
        let hits = Arc::new(AtomicU64::new(0));
        {
            let hits = Arc::clone(&hits);
            manager.purchase_updated_listener(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        manager.attach(bridge.as_ref());

        bridge.emit_purchase(NativePurchase {
            id: Some("x".into()),
            ..Default::default()
        });
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bridge.emit_purchase(fixtures::android_purchase("GPA.1", "coins", "tok"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_init_error_suppressed_before_handshake() {
        let bridge = MockBridge::new(Platform::Ios);
        let manager = ListenerManager::new(Platform::Ios);
        let codes = Arc::new(Mutex::new(Vec::new()));
        {
            let codes = Arc::clone(&codes);
            manager.purchase_error_listener(move |e| codes.lock().unwrap().push(e.code));
        }
        manager.attach(bridge.as_ref());

        bridge.emit_error(NativeError::with_code("E_INIT_CONNECTION", "not ready"));
        manager.mark_connected(true);
        bridge.emit_error(NativeError::with_code("E_INIT_CONNECTION", "dropped"));
        bridge.emit_error(NativeError::with_code("E_USER_CANCELLED", "cancelled"));

        assert_eq!(
            *codes.lock().unwrap(),
            vec![ErrorCode::InitConnection, ErrorCode::UserCancelled]
        );
    }

    #[test]
    fn test_promoted_listener_inert_on_android() {
        let manager = ListenerManager::new(Platform::Android);
        let sub = manager.promoted_product_listener_ios(|_| {});
        assert!(sub.is_active());
        sub.remove();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_promoted_product_forwarded_on_ios() {
        let bridge = MockBridge::new(Platform::Ios);
        let manager = ListenerManager::new(Platform::Ios);
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            manager.promoted_product_listener_ios(move |p| seen.lock().unwrap().push(p.id.clone()));
        }
        manager.attach(bridge.as_ref());
        bridge.emit_promoted(fixtures::ios_product("premium", "subs"));
        assert_eq!(*seen.lock().unwrap(), vec!["premium".to_string()]);
    }
}
