use crate::{
    injector::WeakInjector, DynSvc, InjectError, InjectResult, Key, Service,
    Svc,
};
use std::{fmt::Debug, marker::PhantomData, sync::Arc};

/// The type-erased provider stored in the binding table. Calling it produces
/// a fresh value unless the provider has been wrapped for singleton scope.
#[derive(Clone)]
pub(crate) struct SharedProvider(
    Arc<dyn Fn() -> InjectResult<DynSvc> + Send + Sync>,
);

impl SharedProvider {
    pub fn new(
        produce: impl Fn() -> InjectResult<DynSvc> + Send + Sync + 'static,
    ) -> Self {
        SharedProvider(Arc::new(produce))
    }

    pub fn produce(&self) -> InjectResult<DynSvc> {
        (self.0.as_ref())()
    }
}

/// A lazy, repeatable factory for values of a key.
///
/// A provider never blocks on upstream construction when it is created: it
/// captures the key it was created for and resolves it only when [`get`] is
/// called. This is what makes provider-typed dependencies the designated
/// mechanism for breaking dependency cycles; requesting a `Provider<T>`
/// instead of a `T` defers the lookup past the resolution walk entirely.
///
/// The handle holds only a weak reference to its injector, so a service that
/// stores a provider (a singleton breaking a cycle, for instance) never
/// keeps the injector's state alive. Resolving through a handle that
/// outlives its injector fails instead.
///
/// [`get`]: Provider::get
///
/// ```
/// use keyed_injector::{Injector, Provider, TypeRegistration, ConstructorSpec};
///
/// #[derive(Default)]
/// struct Flag(bool);
///
/// let mut builder = Injector::builder();
/// builder.register(
///     TypeRegistration::of::<Flag>()
///         .with_constructor(ConstructorSpec::new([], |_| Ok(Flag::default()))),
/// );
/// let injector = builder.build().unwrap();
///
/// let provider: Provider<Flag> = injector.get_provider();
/// let one = provider.get().unwrap();
/// let two = provider.get().unwrap();
/// assert!(!one.0 && !two.0);
/// ```
pub struct Provider<T: Service> {
    injector: WeakInjector,
    key: Key,
    marker: PhantomData<fn() -> Svc<T>>,
}

impl<T: Service> Provider<T> {
    pub(crate) fn new(injector: WeakInjector, key: Key) -> Self {
        Provider {
            injector,
            key,
            marker: PhantomData,
        }
    }

    /// Resolves the key and produces a value for it. Each call produces a
    /// fresh value unless the key is scoped as a singleton. Fails if the
    /// injector this handle was created from has been dropped.
    pub fn get(&self) -> InjectResult<Svc<T>> {
        let value = self.injector.upgrade()?.resolve_dyn(&self.key)?;
        value.downcast().map_err(|_| InjectError::WrongProvidedType {
            key: self.key.clone(),
        })
    }

    /// Gets the key this provider resolves.
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }
}

impl<T: Service> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Provider {
            injector: self.injector.clone(),
            key: self.key.clone(),
            marker: PhantomData,
        }
    }
}

impl<T: Service> Debug for Provider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider").field("key", &self.key).finish()
    }
}

/// A single resolved argument handed to a constructor or factory invocation.
pub(crate) enum Argument {
    /// A value produced by the parameter's provider for this invocation.
    Value { key: Key, value: DynSvc },
    /// A deferred parameter, handed out as a lazy [`Provider`] handle.
    Deferred { key: Key },
}

/// The resolved arguments of a single constructor or factory invocation.
/// Arguments are consumed in declaration order by the typed accessors.
pub struct Arguments {
    injector: WeakInjector,
    args: std::vec::IntoIter<Argument>,
}

impl Arguments {
    pub(crate) fn new(injector: WeakInjector, args: Vec<Argument>) -> Self {
        Arguments {
            injector,
            args: args.into_iter(),
        }
    }

    /// Takes the next argument as a resolved value of type `T`.
    pub fn value<T: Service>(&mut self) -> InjectResult<Svc<T>> {
        match self.args.next() {
            Some(Argument::Value { key, value }) => value
                .downcast()
                .map_err(|_| InjectError::WrongProvidedType { key }),
            Some(Argument::Deferred { key }) => {
                Err(InjectError::InternalError(format!(
                    "parameter {key} was declared deferred but consumed as a value"
                )))
            }
            None => Err(InjectError::InternalError(
                "constructor consumed more arguments than it declared".into(),
            )),
        }
    }

    /// Takes the next argument as a lazy [`Provider`] handle for type `T`.
    pub fn provider<T: Service>(&mut self) -> InjectResult<Provider<T>> {
        match self.args.next() {
            Some(Argument::Deferred { key }) => {
                Ok(Provider::new(self.injector.clone(), key))
            }
            Some(Argument::Value { key, .. }) => {
                Err(InjectError::InternalError(format!(
                    "parameter {key} was declared as a value but consumed deferred"
                )))
            }
            None => Err(InjectError::InternalError(
                "constructor consumed more arguments than it declared".into(),
            )),
        }
    }
}
