use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::kernel::error::panic_message;
use crate::object_pool::handle::ServiceHandle;

/// Type for observer identifiers
pub type ObserverId = u64;

/// What happened to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolEventKind {
    /// The handle was appended; it is already part of `objects`.
    Added,
    /// The handle is about to be removed; every occurrence is still in `objects`.
    AboutToRemove,
}

impl PoolEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            PoolEventKind::Added => "object.added",
            PoolEventKind::AboutToRemove => "object.about_to_remove",
        }
    }
}

/// Notification delivered synchronously to pool observers at the point of mutation.
#[derive(Debug, Clone, Copy)]
pub struct PoolEvent<'a> {
    pub kind: PoolEventKind,
    /// The affected handle
    pub handle: &'a ServiceHandle,
    /// Pool contents at notification time
    pub objects: &'a [ServiceHandle],
}

/// Observer callback type
pub type PoolObserver = Box<dyn Fn(&PoolEvent<'_>) + Send + Sync>;

/// Observers of one pool, in subscription order.
pub(crate) struct ObserverList {
    observers: Vec<(ObserverId, PoolObserver)>,
    next_id: ObserverId,
}

impl ObserverList {
    pub(crate) fn new() -> Self {
        Self {
            observers: Vec::new(),
            next_id: 1,
        }
    }

    pub(crate) fn subscribe(&mut self, observer: PoolObserver) -> ObserverId {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let len_before = self.observers.len();
        self.observers.retain(|(o_id, _)| *o_id != id);
        self.observers.len() < len_before
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn clear(&mut self) {
        self.observers.clear();
    }

    /// Deliver to every observer. A panicking observer is logged and skipped.
    pub(crate) fn notify(&self, event: &PoolEvent<'_>) {
        for (id, observer) in &self.observers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| observer(event)));
            if let Err(panic_obj) = result {
                log::error!(
                    "Pool observer {} panicked while handling '{}' for '{}': {}",
                    id,
                    event.kind.name(),
                    event.handle.name(),
                    panic_message(panic_obj.as_ref())
                );
            }
        }
    }
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("observer_count", &self.observers.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
