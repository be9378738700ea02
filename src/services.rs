#![allow(clippy::used_underscore_binding)]

use crate::{DependencyChain, Key, Qualifier, ServiceInfo};
use derive_more::{Display, Error};
use std::{any::Any, sync::Arc};

/// A reference-counted pointer holding a service. Services are always held
/// behind thread-safe pointers since the injector may be shared across
/// threads and parameter resolution fans out to a thread pool.
pub type Svc<T> = Arc<T>;

/// A reference-counted service pointer holding an instance of `dyn Any`.
pub type DynSvc = Arc<dyn Any + Send + Sync>;

/// A result from attempting to resolve a dependency and construct an
/// instance of it.
pub type InjectResult<T> = Result<T, InjectError>;

/// A type-erased error produced while invoking a constructor or factory.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Implemented automatically on types that are capable of being a service.
pub trait Service: Any + Send + Sync {}
impl<T: ?Sized + Any + Send + Sync> Service for T {}

/// An error that occurred while resolving a dependency.
#[derive(Debug, Display, Error)]
pub enum InjectError {
    /// The key has neither a module-declared factory nor a registered
    /// constructor.
    #[display(fmt = "{} has no binding and no registered constructor", key)]
    NoBinding {
        /// The key that could not be resolved.
        key: Key,
    },

    /// The key's type is registered, but without any usable constructor.
    #[display(fmt = "{} has no injectable or zero-argument constructor", key)]
    NoInjectableConstructor {
        /// The key that could not be resolved.
        key: Key,
    },

    /// More than one constructor of the type is registered as an injection
    /// point.
    #[display(
        fmt = "{} has multiple injectable constructors",
        "service.name()"
    )]
    MultipleInjectConstructors {
        /// The type with the ambiguous constructors.
        service: ServiceInfo,
    },

    /// Two factories claim the same key, or a factory claims a key that is
    /// already bound.
    #[display(fmt = "duplicate binding for {} in module {}", key, module)]
    DuplicateBinding {
        /// The key that is already bound.
        key: Key,
        /// The module whose factory collided with the existing binding.
        module: &'static str,
    },

    /// More than one qualifier marker was found on a single parameter,
    /// field, or factory.
    #[display(
        fmt = "multiple qualifiers on {}: {}, {}",
        "target.name()",
        first,
        second
    )]
    AmbiguousQualifier {
        /// The type of the element carrying the markers.
        target: ServiceInfo,
        /// The first qualifier found.
        first: Qualifier,
        /// The second, conflicting qualifier.
        second: Qualifier,
    },

    /// A key reappeared in its own resolution chain.
    #[display(fmt = "circular dependency: {} -> {}", chain, key)]
    CircularDependency {
        /// The resolution path that was in progress, in order.
        chain: DependencyChain,
        /// The key that reappeared.
        key: Key,
    },

    /// The underlying constructor or factory invocation failed while
    /// producing a value.
    #[display(fmt = "cannot instantiate {}: {}", key, cause)]
    Instantiation {
        /// The key whose value could not be produced.
        key: Key,
        /// The underlying failure.
        cause: BoxedError,
    },

    /// The installed provider produced a value of the wrong type. This is
    /// usually caused by a registration whose constructor returns a type
    /// other than the one it was registered for.
    #[display(fmt = "the provider for {} returned the wrong type", key)]
    WrongProvidedType {
        /// The key whose provider misbehaved.
        key: Key,
    },

    /// An unexpected error has occurred. This is usually caused by a bug in
    /// the library itself.
    #[display(
        fmt = "an unexpected error occurred (please report this): {}",
        _0
    )]
    InternalError(#[error(ignore)] String),
}
