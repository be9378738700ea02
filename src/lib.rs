//! # Runtime dependency injection, keyed by type and qualifier.
//!
//! This crate wires an object graph together at runtime. Services are
//! requested by [`Key`]: a service type plus an optional [`Qualifier`], so
//! several bindings of the same type can coexist as long as their qualifiers
//! differ. Instances are handed out behind [`Svc<T>`](Svc), a thread-safe
//! reference-counted pointer, and the [`Injector`] itself is cheap to clone
//! and share across threads.
//!
//! ## Bindings
//!
//! A binding maps a key to the provider that produces its values. Bindings
//! come from two places:
//!
//! - **Modules.** A [`Module`] declares factories ([`FactoryDecl`]) whose
//!   parameters are resolved through the injector and whose produced key is
//!   derived from the factory's return type and qualifiers. Factories are
//!   scanned into the binding table when the injector is built (or when a
//!   module is added later through [`Injector::add_module`]).
//! - **Registered constructors.** A [`TypeRegistration`] describes a concrete
//!   type to the injector: its injectable constructor, its scope, and its
//!   injectable fields. When a key has no factory, the injector derives a
//!   provider from the registration of the key's type.
//!
//! A module factory always takes precedence over a registered constructor for
//! the same key, and two factories for one key fail the scan with
//! [`DuplicateBinding`](InjectError::DuplicateBinding) rather than silently
//! overwriting each other. A module may refine another module by returning
//! the base module's factory layers after its own; a base factory with the
//! same name and parameter signature as a more derived one is suppressed, so
//! refinement replaces factories instead of colliding with them.
//!
//! ## Lifetimes
//!
//! Bindings are transient by default: every resolution produces a fresh
//! value. A binding marked singleton (via [`TypeRegistration::singleton`] or
//! [`FactoryDecl::singleton`]) produces exactly one value per injector, no
//! matter how many threads race on the first resolution, and every later
//! resolution observes that value. Singletons are per-injector state, not
//! process-wide state.
//!
//! ## Cycles
//!
//! Dependencies are resolved depth-first, and a key that reappears along its
//! own resolution path is reported as
//! [`CircularDependency`](InjectError::CircularDependency) together with the
//! path that led to it. Cycles are broken by asking for a
//! [`Provider<T>`](Provider) instead of a `T`
//! ([`Param::provider_of`]): a provider-typed parameter is handed out as a
//! lazy handle without resolving anything, and the dependency is only looked
//! up when [`Provider::get`] is called.
//!
//! ## Field injection
//!
//! [`Injector::inject_fields`] fills the injectable fields of an existing
//! value, walking the registrations of its type and any declared parents.
//! Field injection is best-effort: a field that cannot be resolved is skipped
//! and the call reports whether every field was assigned.
//!
//! ## Example
//!
//! ```
//! use keyed_injector::{
//!     ConstructorSpec, FactoryDecl, FactoryLayer, Injector, Module, Param,
//!     Svc, TypeRegistration,
//! };
//! use std::sync::Arc;
//!
//! // A service with a dependency on a named configuration value.
//! struct Database {
//!     url: Svc<String>,
//! }
//!
//! // Configuration values come from a module.
//! struct ConfigModule;
//!
//! impl Module for ConfigModule {
//!     fn name(&self) -> &'static str {
//!         "ConfigModule"
//!     }
//!
//!     fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
//!         vec![vec![
//!             FactoryDecl::new("database_url", [], |_| {
//!                 Ok(String::from("postgres://localhost/app"))
//!             })
//!             .named("database-url"),
//!         ]]
//!     }
//! }
//!
//! let mut builder = Injector::builder();
//! builder.add_module(ConfigModule);
//! builder.register(
//!     TypeRegistration::of::<Database>()
//!         .singleton()
//!         .with_constructor(ConstructorSpec::new(
//!             [Param::of::<String>().named("database-url")],
//!             |args| Ok(Database { url: args.value()? }),
//!         )),
//! );
//!
//! let injector = builder.build().unwrap();
//! let database: Svc<Database> = injector.get_instance().unwrap();
//! let again: Svc<Database> = injector.get_instance().unwrap();
//!
//! // The database is a singleton and saw the module-provided value.
//! assert!(Arc::ptr_eq(&database, &again));
//! assert_eq!("postgres://localhost/app", database.url.as_str());
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::doc_markdown
)]

mod bindings;
mod builder;
mod injector;
mod keys;
mod module;
mod provider;
mod reflect;
mod resolver;
mod services;
mod singleton;

pub use builder::*;
pub use injector::*;
pub use keys::*;
pub use module::*;
pub use provider::*;
pub use reflect::*;
pub use resolver::*;
pub use services::*;

#[cfg(test)]
mod tests;
