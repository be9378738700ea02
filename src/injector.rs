use crate::{
    bindings::BindingTable,
    provider::{Argument, SharedProvider},
    reflect::{ProjectFn, TypeRegistry},
    resolver::DependencyChain,
    singleton::SingletonCache,
    Arguments, DynSvc, InjectError, InjectResult, InjectorBuilder, Key,
    Module, Provider, Service, Svc,
};
use rayon::prelude::*;
use std::{
    any::Any,
    collections::HashSet,
    fmt::{Debug, Formatter},
    sync::{Arc, Weak},
};
use tracing::debug;

pub(crate) struct InjectorShared {
    pub(crate) bindings: BindingTable,
    pub(crate) singletons: SingletonCache,
    pub(crate) registry: TypeRegistry,
}

/// A runtime dependency injection container.
///
/// The injector owns three pieces of shared state: the binding table mapping
/// keys to providers, the singleton cache, and the type registry standing in
/// for reflection. Cloning an injector clones none of them; both clones
/// observe the same bindings, which is how the injector can be injected into
/// services as a dependency of its own. The injector resolves its own key
/// without any registration:
///
/// ```
/// use keyed_injector::{Injector, Svc};
///
/// let injector = Injector::builder().build().unwrap();
/// let again: Svc<Injector> = injector.get_instance().unwrap();
/// # let _ = again;
/// ```
///
/// All state is owned by this instance and released with it; there are no
/// process-wide tables behind the scenes.
#[derive(Clone)]
pub struct Injector {
    shared: Arc<InjectorShared>,
}

/// A handle to the injector that does not keep it alive. Installed providers
/// and deferred [`Provider`] handles capture this instead of a full
/// [`Injector`] so neither the binding table nor a resolved service ever
/// owns a strong reference back to the injector's state.
#[derive(Clone)]
pub(crate) struct WeakInjector {
    shared: Weak<InjectorShared>,
}

impl WeakInjector {
    pub fn upgrade(&self) -> InjectResult<Injector> {
        self.shared
            .upgrade()
            .map(|shared| Injector { shared })
            .ok_or_else(|| {
                InjectError::InternalError(
                    "the injector was dropped while one of its providers \
                     was still in use"
                        .into(),
                )
            })
    }
}

impl Injector {
    /// Creates a builder for an injector. This is the way to create one.
    #[must_use]
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::default()
    }

    pub(crate) fn new_from_parts(registry: TypeRegistry) -> Self {
        let injector = Injector {
            shared: Arc::new(InjectorShared {
                bindings: BindingTable::default(),
                singletons: SingletonCache::default(),
                registry,
            }),
        };

        // The injector resolves itself, mirroring the self-binding the
        // container installs before any module is scanned.
        let weak = injector.downgrade();
        injector.shared.bindings.install(
            Key::of::<Injector>(),
            SharedProvider::new(move || {
                Ok(Svc::new(weak.upgrade()?) as DynSvc)
            }),
        );

        injector
    }

    pub(crate) fn shared(&self) -> &InjectorShared {
        &self.shared
    }

    pub(crate) fn downgrade(&self) -> WeakInjector {
        WeakInjector {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Gets an instance for an unqualified type.
    pub fn get_instance<T: Service>(&self) -> InjectResult<Svc<T>> {
        self.get_instance_with(Key::of::<T>())
    }

    /// Gets an instance for an explicit key. The key's service type must be
    /// `T`; a mismatch is reported as a wrong-type error.
    pub fn get_instance_with<T: Service>(
        &self,
        key: Key,
    ) -> InjectResult<Svc<T>> {
        let value = self.resolve_dyn(&key)?;
        value
            .downcast()
            .map_err(|_| InjectError::WrongProvidedType { key })
    }

    /// Gets a lazy provider for an unqualified type. The provider performs
    /// no resolution until its first [`get`](Provider::get) call.
    #[must_use]
    pub fn get_provider<T: Service>(&self) -> Provider<T> {
        Provider::new(self.downgrade(), Key::of::<T>())
    }

    /// Gets a lazy provider for an explicit key.
    #[must_use]
    pub fn get_provider_with<T: Service>(&self, key: Key) -> Provider<T> {
        Provider::new(self.downgrade(), key)
    }

    /// Adds a module after construction. Its factories are scanned against
    /// the live binding table under the same duplicate rule as at build
    /// time, and new bindings become visible to every thread on success.
    pub fn add_module(&self, module: impl Module) -> InjectResult<()> {
        self.add_shared_module(Arc::new(module))
    }

    /// Adds an already-shared module after construction.
    pub fn add_shared_module(
        &self,
        module: Arc<dyn Module>,
    ) -> InjectResult<()> {
        self.scan_module(module)
    }

    /// Fills every injectable field of the target, walking the target's
    /// registration and its declared parents. Each field receives a resolved
    /// instance or a lazy provider depending on how it was registered.
    /// Per-field failures do not stop the remaining fields; the call returns
    /// whether every field was assigned. A target whose type declares no
    /// fields succeeds trivially.
    pub fn inject_fields(&self, target: &mut dyn Any) -> bool {
        let type_id = Any::type_id(&*target);

        // Most-derived registration first, then its declared ancestry. Each
        // level remembers the projector path that leads from the concrete
        // target down to the value the level's fields live on. A field
        // shadowed in a parent registration stays a distinct entry.
        let mut levels = Vec::new();
        let mut path: Vec<ProjectFn> = Vec::new();
        let mut visited = HashSet::new();
        let mut next = self.shared.registry.get_by_id(type_id);
        while let Some(registration) = next {
            if !visited.insert(registration.service().id()) {
                break;
            }
            next = registration
                .parent
                .and_then(|parent| self.shared.registry.get(parent));
            let projector = registration.projector.clone();
            levels.push((registration, path.clone()));
            if let Some(projector) = projector {
                path.push(projector);
            }
        }

        let fields: Vec<_> = levels
            .iter()
            .flat_map(|(registration, path)| {
                registration.fields.iter().map(move |field| (field, path))
            })
            .collect();
        if fields.is_empty() {
            return true;
        }

        // Field values resolve on the thread pool; assignment itself is
        // sequential since the target is a single exclusive borrow.
        let resolved: Vec<InjectResult<Argument>> = fields
            .par_iter()
            .map(|(field, _)| {
                let key = field.param().key()?;
                if field.param().is_deferred() {
                    Ok(Argument::Deferred { key })
                } else {
                    let value = self.resolve_dyn(&key)?;
                    Ok(Argument::Value { key, value })
                }
            })
            .collect();

        let mut all_assigned = true;
        for ((field, path), outcome) in fields.iter().zip(resolved) {
            match outcome {
                Ok(argument) => {
                    let mut args =
                        Arguments::new(self.downgrade(), vec![argument]);
                    let mut slot: Option<&mut dyn Any> = Some(&mut *target);
                    for project in path.iter() {
                        slot = slot.and_then(|value| (project.as_ref())(value));
                    }
                    let assigned = match slot {
                        Some(value) => (field.assign.as_ref())(value, &mut args),
                        None => false,
                    };
                    if !assigned {
                        debug!(field = field.name, "field assignment failed");
                        all_assigned = false;
                    }
                }
                Err(error) => {
                    debug!(
                        field = field.name,
                        %error,
                        "field resolution failed"
                    );
                    all_assigned = false;
                }
            }
        }

        all_assigned
    }

    pub(crate) fn resolve_dyn(&self, key: &Key) -> InjectResult<DynSvc> {
        let provider = self.provider_of(key, &DependencyChain::empty())?;
        provider.produce()
    }
}

impl Debug for Injector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("bindings", &self.shared.bindings.len())
            .finish()
    }
}

/// Constructs an injector from configuration modules, the counterpart of the
/// builder for the common module-only case.
pub fn create_injector(
    modules: impl IntoIterator<Item = Arc<dyn Module>>,
) -> InjectResult<Injector> {
    let mut builder = Injector::builder();
    for module in modules {
        builder.add_shared_module(module);
    }
    builder.build()
}
