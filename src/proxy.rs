//! Client-side proxy: mirrors a registered class's methods and routes
//! each call through a bound [`CallSite`].

use std::sync::Arc;

use crate::call_site::CallSite;
use crate::error::Error;
use crate::variant::{Variant, VariantGet};

/// A handle to a remote (or local, in-process) object reached through a
/// `CallSite`. Issues `startup` on construction and `cleanup` on drop.
pub struct Proxy {
    site: Arc<dyn CallSite>,
    handle: u64,
}

impl Proxy {
    pub fn new(site: Arc<dyn CallSite>, type_sig: &str) -> Result<Self, Error> {
        let handle = site.startup(type_sig)?;
        Ok(Proxy { site, handle })
    }

    /// Packs `argv` and routes the call through the bound site, returning
    /// the declared result type.
    pub fn call<R: VariantGet>(
        &self,
        method_sig: &str,
        argv: Vec<Variant>,
    ) -> Result<R, Error> {
        let mut packed = Variant::array(argv);
        let result = self.site.invoke(self.handle, method_sig, &mut packed)?;
        result.get::<R>()
    }

    /// As [`Proxy::call`], but also returns the (possibly back-patched)
    /// packed argument array so a caller can unpack mutable-reference
    /// arguments itself.
    pub fn call_with_argv<R: VariantGet>(
        &self,
        method_sig: &str,
        argv: Variant,
    ) -> Result<(R, Variant), Error> {
        let mut packed = argv;
        let result = self.site.invoke(self.handle, method_sig, &mut packed)?;
        Ok((result.get::<R>()?, packed))
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.site.cleanup(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_site::LocalCallSite;
    use crate::registry::{FactoryFn, MethodDecl, CLASSES};
    use crate::signature::{TypeDescriptor, TypeKind};

    #[derive(Default)]
    struct Counter {
        value: i32,
    }

    fn register_counter() {
        let methods = vec![MethodDecl {
            name: "add".to_string(),
            args: vec![TypeDescriptor::immutable(TypeKind::I32)],
            result: TypeDescriptor::immutable(TypeKind::I32),
            invoke: Box::new(|instance, argv| {
                crate::dispatch::invoke_1::<crate::dispatch::Imm<i32>, i32>(
                    |delta| {
                        let counter = instance.downcast_mut::<Counter>().unwrap();
                        counter.value += *delta;
                        counter.value
                    },
                    argv,
                )
            }),
        }];
        let factory: FactoryFn = Box::new(|| Box::new(Counter::default()));
        let _ = CLASSES.register("ProxyCounter", vec![], methods, factory);
    }

    #[test]
    fn proxy_call_round_trips_through_local_call_site() {
        register_counter();
        let site: Arc<dyn CallSite> = Arc::new(LocalCallSite::new());
        let proxy = Proxy::new(site, "<ProxyCounter>").unwrap();

        let result: i32 = proxy.call("add(i)i", vec![Variant::I32(5)]).unwrap();
        assert_eq!(result, 5);
        let result: i32 = proxy.call("add(i)i", vec![Variant::I32(2)]).unwrap();
        assert_eq!(result, 7);
    }

    #[test]
    fn proxy_cleans_up_on_drop() {
        register_counter();
        let site: Arc<dyn CallSite> = Arc::new(LocalCallSite::new());
        let handle = {
            let proxy = Proxy::new(site.clone(), "<ProxyCounter>").unwrap();
            let result: i32 = proxy.call("add(i)i", vec![Variant::I32(1)]).unwrap();
            assert_eq!(result, 1);
            proxy.handle
        };
        assert!(site.invoke(handle, "add(i)i", &mut Variant::array(vec![Variant::I32(1)])).is_err());
    }
}
