//! The call-site contract and its in-process implementation.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::Error;
use crate::registry::CLASSES;
use crate::variant::Variant;

/// Binds proxy instances to objects and routes signature-keyed
/// invocations. Implementations may be purely local (see
/// [`LocalCallSite`]) or may forward over a network transport; this crate
/// only defines the boundary.
pub trait CallSite: Send + Sync {
    /// Registers a fresh instance of `type_sig`'s class and returns a
    /// unique, non-zero handle for it.
    fn startup(&self, type_sig: &str) -> Result<u64, Error>;

    /// Releases the instance bound to `handle`. Idempotent, never panics.
    fn cleanup(&self, handle: u64);

    /// Resolves `handle` to an instance, looks up `method_sig` on its
    /// class, and dispatches the call.
    fn invoke(&self, handle: u64, method_sig: &str, argv: &mut Variant) -> Result<Variant, Error>;
}

/// An in-process `CallSite` backed by a handle table guarded by a single
/// mutex, so `startup`/`cleanup`/`invoke` are fully serialized against each
/// other on one site. Handle id assignment is lock-free; the instance
/// table itself is not, which is a deliberate, conservative strengthening
/// over leaving per-instance synchronization entirely to the caller (see
/// DESIGN.md).
pub struct LocalCallSite {
    next_id: AtomicU64,
    instances: Mutex<HashMap<u64, Box<dyn Any + Send + Sync>>>,
    class_of: Mutex<HashMap<u64, String>>,
}

impl LocalCallSite {
    pub fn new() -> Self {
        LocalCallSite {
            next_id: AtomicU64::new(1),
            instances: Mutex::new(HashMap::new()),
            class_of: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LocalCallSite {
    fn default() -> Self {
        LocalCallSite::new()
    }
}

impl CallSite for LocalCallSite {
    fn startup(&self, type_sig: &str) -> Result<u64, Error> {
        let meta = CLASSES.find(type_sig)?;
        let instance = (meta.factory)();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.instances.lock().insert(id, instance);
        self.class_of.lock().insert(id, meta.name.clone());
        Ok(id)
    }

    fn cleanup(&self, handle: u64) {
        self.instances.lock().remove(&handle);
        self.class_of.lock().remove(&handle);
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, argv), fields(handle, method_sig)))]
    fn invoke(&self, handle: u64, method_sig: &str, argv: &mut Variant) -> Result<Variant, Error> {
        let class_name = self
            .class_of
            .lock()
            .get(&handle)
            .cloned()
            .ok_or_else(|| Error::Reflection(format!("no live instance for handle {handle}")))?;
        let meta = CLASSES.find_by_name(&class_name)?;
        let method = meta
            .methods
            .get(method_sig)
            .ok_or_else(|| Error::Reflection(format!("no such method: {method_sig}")))?;

        let mut instances = self.instances.lock();
        let instance = instances
            .get_mut(&handle)
            .ok_or_else(|| Error::Reflection(format!("no live instance for handle {handle}")))?;
        (method.invoke)(instance.as_mut(), argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FactoryFn, MethodDecl};
    use crate::signature::TypeKind;

    #[derive(Default)]
    struct Counter {
        value: i32,
    }

    fn register_counter() {
        let methods = vec![MethodDecl {
            name: "increment".to_string(),
            args: vec![],
            result: crate::signature::TypeDescriptor::immutable(TypeKind::I32),
            invoke: Box::new(|instance, argv| {
                crate::dispatch::invoke_0(
                    || {
                        let counter = instance.downcast_mut::<Counter>().unwrap();
                        counter.value += 1;
                        counter.value
                    },
                    argv,
                )
            }),
        }];
        let factory: FactoryFn = Box::new(|| Box::new(Counter::default()));
        let _ = CLASSES.register("Counter", vec![], methods, factory);
    }

    #[test]
    fn startup_invoke_cleanup_round_trip() {
        register_counter();
        let site = LocalCallSite::new();
        let handle = site.startup("<Counter>").unwrap();

        let mut argv = Variant::array(Vec::<Variant>::new());
        let result = site.invoke(handle, "increment()i", &mut argv).unwrap();
        assert_eq!(result, Variant::I32(1));
        let result = site.invoke(handle, "increment()i", &mut argv).unwrap();
        assert_eq!(result, Variant::I32(2));

        site.cleanup(handle);
        assert!(site.invoke(handle, "increment()i", &mut argv).is_err());
    }

    #[test]
    fn cleanup_is_idempotent() {
        register_counter();
        let site = LocalCallSite::new();
        let handle = site.startup("<Counter>").unwrap();
        site.cleanup(handle);
        site.cleanup(handle);
    }

    #[test]
    fn handle_ids_are_unique_and_increasing() {
        register_counter();
        let site = LocalCallSite::new();
        let a = site.startup("<Counter>").unwrap();
        let b = site.startup("<Counter>").unwrap();
        assert!(b > a);
    }
}
