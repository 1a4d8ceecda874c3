//! # Keel Object Pool
//!
//! The object pool is the shared, ordered collection of service handles through
//! which plugins expose functionality to each other. A plugin publishes a
//! [`ServiceHandle`] during its initialization; other plugins later look up
//! every handle that provides a given capability with
//! [`ObjectPool::all_of_type`].
//!
//! - **Ordering**: insertion order is preserved and duplicates are permitted.
//! - **Capabilities**: each handle carries an explicit interface table built at
//!   publication time; lookups match against that table.
//! - **Notifications**: observers are told synchronously, on the mutating
//!   thread, after a handle is added and before a handle is removed.
//!
//! [`ObjectPool`] is the plain data structure. [`SharedObjectPool`] wraps it in
//! a mutex so plugins can keep a clone and mutate the pool after startup.
pub mod event;
pub mod handle;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use event::{ObserverId, PoolEvent, PoolEventKind, PoolObserver};
pub use handle::{ServiceHandle, ServiceHandleBuilder};

use event::ObserverList;

/// Ordered collection of published services.
pub struct ObjectPool {
    objects: Vec<ServiceHandle>,
    observers: ObserverList,
}

impl ObjectPool {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            observers: ObserverList::new(),
        }
    }

    /// Append a handle, then notify observers.
    pub fn add(&mut self, handle: ServiceHandle) {
        log::debug!("Object pool: adding '{}'", handle.name());
        self.objects.push(handle);
        if let Some(added) = self.objects.last() {
            self.observers.notify(&PoolEvent {
                kind: PoolEventKind::Added,
                handle: added,
                objects: &self.objects,
            });
        }
    }

    /// Notify observers, then remove every occurrence of `handle`.
    /// Returns the number of occurrences removed; absent handles are a no-op.
    pub fn remove(&mut self, handle: &ServiceHandle) -> usize {
        if !self.contains(handle) {
            return 0;
        }
        log::debug!("Object pool: removing '{}'", handle.name());
        self.observers.notify(&PoolEvent {
            kind: PoolEventKind::AboutToRemove,
            handle,
            objects: &self.objects,
        });
        let len_before = self.objects.len();
        self.objects.retain(|h| h != handle);
        len_before - self.objects.len()
    }

    /// All handles in insertion order.
    pub fn all(&self) -> &[ServiceHandle] {
        &self.objects
    }

    /// Every object providing capability `C`, in pool order.
    pub fn all_of_type<C: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<C>> {
        self.objects.iter().filter_map(|h| h.get::<C>()).collect()
    }

    /// Handles providing capability `C`, in pool order.
    pub fn handles_of_type<C: ?Sized + 'static>(&self) -> Vec<ServiceHandle> {
        self.objects
            .iter()
            .filter(|h| h.implements::<C>())
            .cloned()
            .collect()
    }

    pub fn contains(&self, handle: &ServiceHandle) -> bool {
        self.objects.iter().any(|h| h == handle)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Register an observer for add/remove notifications.
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: Fn(&PoolEvent<'_>) + Send + Sync + 'static,
    {
        self.observers.subscribe(Box::new(observer))
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Drop every handle and observer without notifying anyone.
    pub(crate) fn reset(&mut self) {
        self.objects.clear();
        self.observers.clear();
    }
}

impl Default for ObjectPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("objects", &self.objects)
            .field("observer_count", &self.observers.len())
            .finish()
    }
}

/// Thread-safe shared object pool.
///
/// The lock is held while observers run, so an observer must not call back
/// into the same pool.
#[derive(Clone, Default)]
pub struct SharedObjectPool {
    pool: Arc<Mutex<ObjectPool>>,
}

impl SharedObjectPool {
    pub fn new() -> Self {
        Self {
            pool: Arc::new(Mutex::new(ObjectPool::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ObjectPool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, handle: ServiceHandle) {
        self.lock().add(handle);
    }

    pub fn remove(&self, handle: &ServiceHandle) -> usize {
        self.lock().remove(handle)
    }

    /// Snapshot of the pool in insertion order.
    pub fn all(&self) -> Vec<ServiceHandle> {
        self.lock().all().to_vec()
    }

    pub fn all_of_type<C: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<C>> {
        self.lock().all_of_type::<C>()
    }

    pub fn handles_of_type<C: ?Sized + 'static>(&self) -> Vec<ServiceHandle> {
        self.lock().handles_of_type::<C>()
    }

    pub fn contains(&self, handle: &ServiceHandle) -> bool {
        self.lock().contains(handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&PoolEvent<'_>) + Send + Sync + 'static,
    {
        self.lock().subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.lock().unsubscribe(id)
    }

    /// Run `f` with exclusive access to the underlying pool.
    pub fn with_pool<R>(&self, f: impl FnOnce(&mut ObjectPool) -> R) -> R {
        f(&mut self.lock())
    }
}

impl fmt::Debug for SharedObjectPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedObjectPool").finish_non_exhaustive()
    }
}
