use crate::{InjectError, InjectResult};
use std::{
    any::{Any, TypeId},
    borrow::Cow,
    fmt::{Display, Formatter},
};

/// The identity of a service type. This wraps the type's [`TypeId`] together
/// with its name so that diagnostics can refer to types by name.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct ServiceInfo {
    id: TypeId,
    name: &'static str,
}

impl ServiceInfo {
    /// Creates a [`ServiceInfo`] for the given type.
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        ServiceInfo {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Gets the [`TypeId`] for this service type.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Gets the name of this service type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A discriminator distinguishing multiple bindings of the same service type.
///
/// A qualifier is one of three things: nothing at all, a name compared by
/// string value, or a marker type compared by its type identity. Two keys for
/// the same service type but different qualifiers never collide.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum Qualifier {
    /// The unqualified default.
    None,
    /// A named qualifier. Two named qualifiers are equal iff their names are
    /// equal by value.
    Named(Cow<'static, str>),
    /// A marker type qualifier. Two marker qualifiers are equal iff they
    /// refer to the same marker type.
    Marker(ServiceInfo),
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Qualifier::None => Ok(()),
            Qualifier::Named(name) => write!(f, "@\"{name}\""),
            Qualifier::Marker(marker) => write!(f, "@{}", marker.name()),
        }
    }
}

/// The identity of a requested dependency: a service type plus an optional
/// [`Qualifier`].
///
/// Keys are created on every resolution request, so they are cheap to clone,
/// compare, and hash. They are used as the lookup key of the injector's
/// binding table and singleton cache.
///
/// ```
/// use keyed_injector::Key;
///
/// struct Database;
///
/// assert_eq!(Key::of::<Database>(), Key::of::<Database>());
/// assert_ne!(Key::of::<Database>(), Key::named::<Database>("replica"));
/// assert_ne!(Key::named::<Database>("replica"), Key::named::<Database>("primary"));
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Key {
    service: ServiceInfo,
    qualifier: Qualifier,
}

impl Key {
    /// Creates an unqualified key for a service type.
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        Key {
            service: ServiceInfo::of::<T>(),
            qualifier: Qualifier::None,
        }
    }

    /// Creates a key for a service type with a named qualifier.
    #[must_use]
    pub fn named<T: ?Sized + Any>(name: impl Into<Cow<'static, str>>) -> Self {
        Key {
            service: ServiceInfo::of::<T>(),
            qualifier: Qualifier::Named(name.into()),
        }
    }

    /// Creates a key for a service type qualified by a marker type.
    #[must_use]
    pub fn qualified<T: ?Sized + Any, M: ?Sized + Any>() -> Self {
        Key {
            service: ServiceInfo::of::<T>(),
            qualifier: Qualifier::Marker(ServiceInfo::of::<M>()),
        }
    }

    /// Creates a key from its parts.
    #[must_use]
    pub fn new(service: ServiceInfo, qualifier: Qualifier) -> Self {
        Key { service, qualifier }
    }

    /// Gets the service type this key requests.
    #[must_use]
    pub fn service(&self) -> ServiceInfo {
        self.service
    }

    /// Gets the qualifier of this key.
    #[must_use]
    pub fn qualifier(&self) -> &Qualifier {
        &self.qualifier
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.service.name(), self.qualifier)
    }
}

/// Collapses the qualifier markers collected on a single element into at most
/// one qualifier. More than one marker on the same element is ambiguous.
pub(crate) fn single_qualifier(
    target: ServiceInfo,
    found: &[Qualifier],
) -> InjectResult<Qualifier> {
    match found {
        [] => Ok(Qualifier::None),
        [qualifier] => Ok(qualifier.clone()),
        [first, second, ..] => Err(InjectError::AmbiguousQualifier {
            target,
            first: first.clone(),
            second: second.clone(),
        }),
    }
}
