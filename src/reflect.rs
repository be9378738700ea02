//! The registration substrate standing in for runtime reflection.
//!
//! The resolver never inspects types itself; it queries a [`TypeRegistry`]
//! that the host populates through the
//! [`InjectorBuilder`](crate::InjectorBuilder). A registration describes, for
//! one concrete type, its injectable constructor, its singleton scope, its
//! injectable fields, and optionally the registration it inherits fields
//! from. How a host produces registrations (hand-written, macro-generated,
//! build-script-generated) is outside the resolver's concern.

use crate::{
    keys::single_qualifier, Arguments, BoxedError, DynSvc, InjectResult, Key,
    Qualifier, Service, ServiceInfo, Svc,
};
use dashmap::DashMap;
use std::{any::Any, borrow::Cow, sync::Arc};

pub(crate) type ConstructFn =
    Arc<dyn Fn(&mut Arguments) -> Result<DynSvc, BoxedError> + Send + Sync>;

pub(crate) type AssignFn =
    Arc<dyn Fn(&mut dyn Any, &mut Arguments) -> bool + Send + Sync>;

pub(crate) type ProjectFn = Arc<
    dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync,
>;

/// One constructor or factory parameter: a target type, the qualifier
/// markers found on it, and whether the parameter is deferred
/// (provider-typed) rather than a plain value.
#[derive(Clone)]
pub struct Param {
    service: ServiceInfo,
    qualifiers: Vec<Qualifier>,
    deferred: bool,
}

impl Param {
    /// A parameter taking a resolved value of type `T`.
    #[must_use]
    pub fn of<T: ?Sized + Service>() -> Self {
        Param {
            service: ServiceInfo::of::<T>(),
            qualifiers: Vec::new(),
            deferred: false,
        }
    }

    /// A deferred parameter taking a [`Provider<T>`](crate::Provider)
    /// instead of a value. Deferred parameters do not participate in cycle
    /// detection, which makes them the mechanism for breaking dependency
    /// cycles.
    #[must_use]
    pub fn provider_of<T: ?Sized + Service>() -> Self {
        Param {
            service: ServiceInfo::of::<T>(),
            qualifiers: Vec::new(),
            deferred: true,
        }
    }

    /// Attaches a named qualifier marker to this parameter.
    #[must_use]
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.qualifiers.push(Qualifier::Named(name.into()));
        self
    }

    /// Attaches a marker type qualifier to this parameter.
    #[must_use]
    pub fn qualified_by<M: ?Sized + Service>(mut self) -> Self {
        self.qualifiers
            .push(Qualifier::Marker(ServiceInfo::of::<M>()));
        self
    }

    pub(crate) fn service(&self) -> ServiceInfo {
        self.service
    }

    pub(crate) fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Collapses the collected markers into the parameter's key. More than
    /// one marker is an ambiguity error, not an arbitrary pick.
    pub(crate) fn key(&self) -> InjectResult<Key> {
        let qualifier = single_qualifier(self.service, &self.qualifiers)?;
        Ok(Key::new(self.service, qualifier))
    }
}

/// A designated injection constructor: its ordered parameters and the
/// closure that invokes it with the resolved arguments.
///
/// The invoke closure is written where the concrete types are known, so all
/// downcasts from the type-erased arguments happen inside it:
///
/// ```
/// use keyed_injector::{ConstructorSpec, Param, Svc};
///
/// struct Engine;
/// struct Car(Svc<Engine>);
///
/// let spec = ConstructorSpec::new([Param::of::<Engine>()], |args| {
///     Ok(Car(args.value()?))
/// });
/// # let _ = spec;
/// ```
#[derive(Clone)]
pub struct ConstructorSpec {
    pub(crate) params: Vec<Param>,
    pub(crate) invoke: ConstructFn,
}

impl ConstructorSpec {
    /// Creates a constructor spec from its parameters and an invoke closure.
    /// A failure returned by the closure is surfaced as an
    /// [`Instantiation`](crate::InjectError::Instantiation) error naming the
    /// key under construction.
    pub fn new<T, F>(
        params: impl IntoIterator<Item = Param>,
        construct: F,
    ) -> Self
    where
        T: Service,
        F: Fn(&mut Arguments) -> Result<T, BoxedError> + Send + Sync + 'static,
    {
        ConstructorSpec {
            params: params.into_iter().collect(),
            invoke: Arc::new(move |args| {
                Ok(Svc::new(construct(args)?) as DynSvc)
            }),
        }
    }
}

/// One injectable field of a registered type: the field's value type, its
/// qualifier markers, whether it receives a value or a deferred provider,
/// and the closure that writes into the target.
#[derive(Clone)]
pub struct FieldSpec {
    pub(crate) name: &'static str,
    param: Param,
    pub(crate) assign: AssignFn,
}

impl FieldSpec {
    /// A field of type `F` on targets of type `T`, assigned a resolved
    /// value. The closure returns whether the assignment succeeded.
    pub fn of<F, T, A>(name: &'static str, assign: A) -> Self
    where
        F: Service,
        T: Service,
        A: Fn(&mut T, &mut Arguments) -> bool + Send + Sync + 'static,
    {
        FieldSpec {
            name,
            param: Param::of::<F>(),
            assign: Self::downcasting(assign),
        }
    }

    /// A field declared as `Provider<F>` on targets of type `T`, assigned a
    /// lazy provider handle rather than a value.
    pub fn provider_of<F, T, A>(name: &'static str, assign: A) -> Self
    where
        F: Service,
        T: Service,
        A: Fn(&mut T, &mut Arguments) -> bool + Send + Sync + 'static,
    {
        FieldSpec {
            name,
            param: Param::provider_of::<F>(),
            assign: Self::downcasting(assign),
        }
    }

    /// Attaches a named qualifier marker to this field.
    #[must_use]
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.param = self.param.named(name);
        self
    }

    /// Attaches a marker type qualifier to this field.
    #[must_use]
    pub fn qualified_by<M: ?Sized + Service>(mut self) -> Self {
        self.param = self.param.qualified_by::<M>();
        self
    }

    pub(crate) fn param(&self) -> &Param {
        &self.param
    }

    fn downcasting<T, A>(assign: A) -> AssignFn
    where
        T: Service,
        A: Fn(&mut T, &mut Arguments) -> bool + Send + Sync + 'static,
    {
        Arc::new(move |target: &mut dyn Any, args: &mut Arguments| {
            match target.downcast_mut::<T>() {
                Some(target) => assign(target, args),
                None => false,
            }
        })
    }
}

/// Everything the injector knows about one concrete type: its injectable
/// constructors, its scope, its injectable fields, and the type it inherits
/// fields from.
///
/// A type registered with no constructor can still receive field injection
/// and be produced by module factories; requesting it by key without a
/// factory fails with
/// [`NoInjectableConstructor`](crate::InjectError::NoInjectableConstructor).
/// Registering more than one constructor is reported as
/// [`MultipleInjectConstructors`](crate::InjectError::MultipleInjectConstructors)
/// when the type is resolved.
#[derive(Clone)]
pub struct TypeRegistration {
    service: ServiceInfo,
    pub(crate) constructors: Vec<ConstructorSpec>,
    pub(crate) singleton: bool,
    pub(crate) fields: Vec<FieldSpec>,
    pub(crate) parent: Option<ServiceInfo>,
    pub(crate) projector: Option<ProjectFn>,
}

impl TypeRegistration {
    /// Starts a registration for the given type.
    #[must_use]
    pub fn of<T: Service>() -> Self {
        TypeRegistration {
            service: ServiceInfo::of::<T>(),
            constructors: Vec::new(),
            singleton: false,
            fields: Vec::new(),
            parent: None,
            projector: None,
        }
    }

    /// Adds an injectable constructor.
    #[must_use]
    pub fn with_constructor(mut self, constructor: ConstructorSpec) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Marks the type as singleton-scoped: the first resolution constructs
    /// the single instance and every later resolution observes it.
    #[must_use]
    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    /// Adds an injectable field.
    #[must_use]
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Declares that this type inherits the injectable fields of another
    /// registered type, with a projection from the type to its embedded
    /// parent value. Field injection walks the parent chain and collects
    /// every declared field, keeping shadowed fields as distinct entries.
    ///
    /// ```
    /// use keyed_injector::TypeRegistration;
    ///
    /// struct Base;
    /// struct Derived {
    ///     base: Base,
    /// }
    ///
    /// let registration = TypeRegistration::of::<Derived>()
    ///     .extending(|derived: &mut Derived| &mut derived.base);
    /// # let _ = registration;
    /// ```
    #[must_use]
    pub fn extending<T, P>(mut self, project: fn(&mut T) -> &mut P) -> Self
    where
        T: Service,
        P: Service,
    {
        self.parent = Some(ServiceInfo::of::<P>());
        let projector: ProjectFn = Arc::new(move |target| {
            target
                .downcast_mut::<T>()
                .map(|target| project(target) as &mut dyn Any)
        });
        self.projector = Some(projector);
        self
    }

    /// Gets the type this registration describes.
    #[must_use]
    pub fn service(&self) -> ServiceInfo {
        self.service
    }
}

/// The concurrent map from type identity to registration. This is the only
/// part of the system the host must feed; everything else is derived.
#[derive(Default)]
pub(crate) struct TypeRegistry {
    types: DashMap<std::any::TypeId, Arc<TypeRegistration>>,
}

impl TypeRegistry {
    /// First registration for a type wins, mirroring the binding table's
    /// first-install rule.
    pub fn register(&self, registration: TypeRegistration) {
        self.types
            .entry(registration.service().id())
            .or_insert_with(|| Arc::new(registration));
    }

    pub fn get(&self, service: ServiceInfo) -> Option<Arc<TypeRegistration>> {
        self.get_by_id(service.id())
    }

    pub fn get_by_id(
        &self,
        id: std::any::TypeId,
    ) -> Option<Arc<TypeRegistration>> {
        self.types.get(&id).map(|entry| entry.value().clone())
    }
}
