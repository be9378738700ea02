use crate::{
    reflect::TypeRegistry, InjectResult, Injector, Module, TypeRegistration,
};
use std::sync::Arc;
use tracing::debug;

/// A builder for an [`Injector`].
///
/// Type registrations feed the registry the resolver consults in place of
/// reflection; modules contribute factory bindings. Building scans every
/// module into the fresh binding table, so a duplicate factory key fails the
/// build rather than surfacing later.
#[derive(Default)]
pub struct InjectorBuilder {
    registrations: Vec<TypeRegistration>,
    modules: Vec<Arc<dyn Module>>,
}

impl InjectorBuilder {
    /// Registers a type so the resolver can construct it and inject its
    /// fields. If a type is registered more than once, the first
    /// registration wins.
    pub fn register(&mut self, registration: TypeRegistration) {
        self.registrations.push(registration);
    }

    /// Adds a configuration module.
    pub fn add_module(&mut self, module: impl Module) {
        self.add_shared_module(Arc::new(module));
    }

    /// Adds an already-shared configuration module.
    pub fn add_shared_module(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    /// Adds every module of a collection, in order.
    pub fn add_modules(
        &mut self,
        modules: impl IntoIterator<Item = Arc<dyn Module>>,
    ) {
        self.modules.extend(modules);
    }

    /// Builds the injector, scanning all modules into the binding table.
    /// Fails if any module declares a factory for a key that is already
    /// bound, or if a factory's own declaration is invalid.
    pub fn build(self) -> InjectResult<Injector> {
        let registry = TypeRegistry::default();
        for registration in self.registrations {
            registry.register(registration);
        }

        let injector = Injector::new_from_parts(registry);
        debug!(modules = self.modules.len(), "scanning initial modules");
        for module in self.modules {
            injector.scan_module(module)?;
        }

        Ok(injector)
    }
}
