use crate::{
    keys::single_qualifier, reflect::ConstructFn, Arguments, BoxedError,
    DynSvc, InjectResult, Key, Param, Qualifier, Service, ServiceInfo, Svc,
};
use std::{borrow::Cow, sync::Arc};

/// A group of factory declarations contributed by one level of a module's
/// lineage. Layers are ordered most-derived first; see [`Module::factories`].
pub type FactoryLayer = Vec<FactoryDecl>;

/// A user-supplied object whose declared factories are sources of bindings.
///
/// A module describes its factories as ordered [`FactoryLayer`]s, most
/// derived first. A module that refines another module returns its own layer
/// followed by the layers of its base; the scanner suppresses a base
/// declaration whenever a more derived layer already declared a factory with
/// the same name and parameter signature, so a refining module replaces a
/// factory without producing two bindings for the same key.
///
/// ```
/// use keyed_injector::{FactoryDecl, FactoryLayer, Injector, Module, Svc};
/// use std::sync::Arc;
///
/// struct GreetingModule;
///
/// impl Module for GreetingModule {
///     fn name(&self) -> &'static str {
///         "GreetingModule"
///     }
///
///     fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
///         vec![vec![FactoryDecl::new("greeting", [], |_| {
///             Ok(String::from("hello"))
///         })]]
///     }
/// }
///
/// let mut builder = Injector::builder();
/// builder.add_module(GreetingModule);
/// let injector = builder.build().unwrap();
///
/// let greeting: Svc<String> = injector.get_instance().unwrap();
/// assert_eq!("hello", greeting.as_str());
/// ```
pub trait Module: Service {
    /// The name used in diagnostics when a factory of this module collides
    /// with an existing binding.
    fn name(&self) -> &'static str {
        "<module>"
    }

    /// The module's factory declarations, grouped in layers ordered from
    /// most derived to the root of the module's lineage.
    fn factories(self: Arc<Self>) -> Vec<FactoryLayer>;
}

/// One declared factory of a module: a method name and parameter signature
/// (the override identity), the key it produces, its scope, and the closure
/// invoking it.
#[derive(Clone)]
pub struct FactoryDecl {
    pub(crate) method: &'static str,
    service: ServiceInfo,
    qualifiers: Vec<Qualifier>,
    pub(crate) singleton: bool,
    pub(crate) params: Vec<Param>,
    pub(crate) produce: ConstructFn,
}

impl FactoryDecl {
    /// Declares a factory producing values of type `R`. The method name and
    /// the parameter signature identify the factory for override
    /// suppression; the produced key is computed from `R` and the attached
    /// qualifiers. The closure typically captures the module instance it was
    /// declared by.
    pub fn new<R, F>(
        method: &'static str,
        params: impl IntoIterator<Item = Param>,
        produce: F,
    ) -> Self
    where
        R: Service,
        F: Fn(&mut Arguments) -> Result<R, BoxedError> + Send + Sync + 'static,
    {
        FactoryDecl {
            method,
            service: ServiceInfo::of::<R>(),
            qualifiers: Vec::new(),
            singleton: false,
            params: params.into_iter().collect(),
            produce: Arc::new(move |args| {
                Ok(Svc::new(produce(args)?) as DynSvc)
            }),
        }
    }

    /// Attaches a named qualifier to the produced key.
    #[must_use]
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.qualifiers.push(Qualifier::Named(name.into()));
        self
    }

    /// Attaches a marker type qualifier to the produced key.
    #[must_use]
    pub fn qualified_by<M: ?Sized + Service>(mut self) -> Self {
        self.qualifiers
            .push(Qualifier::Marker(ServiceInfo::of::<M>()));
        self
    }

    /// Scopes the factory as a singleton: it runs at most once and every
    /// resolution of its key observes the single produced value.
    #[must_use]
    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    /// The key this factory produces, or an error if more than one qualifier
    /// was attached.
    pub(crate) fn key(&self) -> InjectResult<Key> {
        let qualifier = single_qualifier(self.service, &self.qualifiers)?;
        Ok(Key::new(self.service, qualifier))
    }

    /// The identity used for override suppression between layers: the method
    /// name plus the parameter type signature.
    pub(crate) fn signature(&self) -> (&'static str, Vec<(ServiceInfo, bool)>) {
        let params = self
            .params
            .iter()
            .map(|param| (param.service(), param.is_deferred()))
            .collect();
        (self.method, params)
    }
}
