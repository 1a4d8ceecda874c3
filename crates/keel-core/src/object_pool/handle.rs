use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// One entry of a handle's interface table: a capability trait object stored
/// as `Arc<C>` behind `dyn Any`, keyed by the `TypeId` of `C`.
struct Interface {
    type_id: TypeId,
    type_name: &'static str,
    object: Box<dyn Any + Send + Sync>,
}

struct ServiceInner {
    name: String,
    interfaces: Vec<Interface>,
}

/// A service published into the object pool.
///
/// Handles are cheap to clone and compare by identity: two clones of the same
/// handle are equal, two handles built separately never are, even when they
/// expose the same objects. The capabilities a service offers are declared
/// explicitly when the handle is built, see [`ServiceHandle::builder`].
#[derive(Clone)]
pub struct ServiceHandle {
    inner: Arc<ServiceInner>,
}

impl ServiceHandle {
    /// Start building a handle for a service with the given display name.
    pub fn builder(name: impl Into<String>) -> ServiceHandleBuilder {
        ServiceHandleBuilder {
            name: name.into(),
            interfaces: Vec::new(),
        }
    }

    /// Display name given at publication time. Not required to be unique.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether this service provides capability `C`.
    pub fn implements<C: ?Sized + 'static>(&self) -> bool {
        let wanted = TypeId::of::<C>();
        self.inner.interfaces.iter().any(|i| i.type_id == wanted)
    }

    /// Returns the service's implementation of capability `C`, if it provides one.
    pub fn get<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        let wanted = TypeId::of::<C>();
        self.inner
            .interfaces
            .iter()
            .find(|i| i.type_id == wanted)
            .and_then(|i| i.object.downcast_ref::<Arc<C>>())
            .cloned()
    }

    /// Type names of the capabilities in the interface table, in declaration order.
    pub fn capabilities(&self) -> Vec<&'static str> {
        self.inner.interfaces.iter().map(|i| i.type_name).collect()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ServiceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for ServiceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ServiceHandle {}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("name", &self.inner.name)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// Builder collecting the interface table of a [`ServiceHandle`].
pub struct ServiceHandleBuilder {
    name: String,
    interfaces: Vec<Interface>,
}

impl ServiceHandleBuilder {
    /// Declare that the service provides capability `C` through `object`.
    ///
    /// `C` is usually a trait object type, e.g.
    /// `.provide::<dyn Greeter>(service.clone())`. Providing the same
    /// capability twice replaces the earlier entry.
    pub fn provide<C: ?Sized + Send + Sync + 'static>(mut self, object: Arc<C>) -> Self {
        let type_id = TypeId::of::<C>();
        self.interfaces.retain(|i| i.type_id != type_id);
        self.interfaces.push(Interface {
            type_id,
            type_name: std::any::type_name::<C>(),
            object: Box::new(object),
        });
        self
    }

    pub fn build(self) -> ServiceHandle {
        ServiceHandle {
            inner: Arc::new(ServiceInner {
                name: self.name,
                interfaces: self.interfaces,
            }),
        }
    }
}

impl fmt::Debug for ServiceHandleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self.interfaces.iter().map(|i| i.type_name).collect();
        f.debug_struct("ServiceHandleBuilder")
            .field("name", &self.name)
            .field("capabilities", &names)
            .finish()
    }
}
