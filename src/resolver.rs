use crate::{
    provider::{Argument, SharedProvider},
    reflect::ConstructFn,
    Arguments, InjectError, InjectResult, Injector, Key, Module, Param,
    ServiceInfo,
};
use rayon::prelude::*;
use std::{
    collections::HashSet,
    fmt::{Display, Formatter},
    sync::Arc,
};
use tracing::{debug, trace};

/// The ordered set of keys currently being resolved along one resolution
/// path. Created fresh per top-level resolution and extended by copy as the
/// walk recurses, so sibling branches never observe each other's suffix.
#[derive(Clone, Debug, Default)]
pub struct DependencyChain {
    keys: Vec<Key>,
}

impl DependencyChain {
    pub(crate) fn empty() -> Self {
        DependencyChain::default()
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.keys.contains(key)
    }

    pub(crate) fn extended(&self, key: Key) -> Self {
        let mut keys = Vec::with_capacity(self.keys.len() + 1);
        keys.extend(self.keys.iter().cloned());
        keys.push(key);
        DependencyChain { keys }
    }

    /// The keys along the path, outermost request first.
    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }
}

impl Display for DependencyChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, key) in self.keys.iter().enumerate() {
            if index > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

/// One parameter after graph resolution. Value parameters carry the provider
/// that will produce them at construction time; deferred parameters carry
/// only their key, to be handed out as a lazy handle.
pub(crate) enum ResolvedParam {
    Value { key: Key, provider: SharedProvider },
    Deferred { key: Key },
}

impl Injector {
    /// Finds or derives the provider for a key. Lookups hit the binding
    /// table first; module factories were installed there at scan time, so
    /// they take precedence over direct construction. A derived provider is
    /// installed with first-writer-wins semantics, so concurrent resolutions
    /// of one key converge on a single provider.
    pub(crate) fn provider_of(
        &self,
        key: &Key,
        chain: &DependencyChain,
    ) -> InjectResult<SharedProvider> {
        if let Some(provider) = self.shared().bindings.get(key) {
            return Ok(provider);
        }

        trace!(%key, "deriving binding from registered constructor");
        let derived = self.derive(key, chain)?;
        Ok(self.shared().bindings.install(key.clone(), derived))
    }

    /// Derives a provider for an unbound key from its type registration.
    /// Nothing is installed until derivation fully succeeds, so a failed
    /// resolution never leaves a broken binding behind.
    fn derive(
        &self,
        key: &Key,
        chain: &DependencyChain,
    ) -> InjectResult<SharedProvider> {
        let registration = self
            .shared()
            .registry
            .get(key.service())
            .ok_or_else(|| InjectError::NoBinding { key: key.clone() })?;

        let constructor = match registration.constructors.as_slice() {
            [] => {
                return Err(InjectError::NoInjectableConstructor {
                    key: key.clone(),
                })
            }
            [constructor] => constructor,
            _ => {
                return Err(InjectError::MultipleInjectConstructors {
                    service: key.service(),
                })
            }
        };

        let resolved =
            self.resolve_params(key, &constructor.params, chain)?;
        let raw =
            self.invoking_provider(key, constructor.invoke.clone(), resolved);
        Ok(if registration.singleton {
            self.singleton_wrapped(key, raw)
        } else {
            raw
        })
    }

    /// Resolves the parameters of one constructor or factory. Sibling
    /// parameters are independent and resolve on the thread pool; the first
    /// failure aborts the join. The chain is extended with the key under
    /// construction before any parameter is examined, and a value parameter
    /// already present in the extended chain is a cycle. Deferred parameters
    /// skip both the chain check and the recursive walk entirely; they
    /// resolve lazily on first use.
    pub(crate) fn resolve_params(
        &self,
        current: &Key,
        params: &[Param],
        chain: &DependencyChain,
    ) -> InjectResult<Vec<ResolvedParam>> {
        if params.is_empty() {
            return Ok(Vec::new());
        }

        let extended = chain.extended(current.clone());
        params
            .par_iter()
            .map(|param| {
                let key = param.key()?;
                if param.is_deferred() {
                    return Ok(ResolvedParam::Deferred { key });
                }
                if extended.contains(&key) {
                    return Err(InjectError::CircularDependency {
                        chain: extended.clone(),
                        key,
                    });
                }
                let provider = self.provider_of(&key, &extended)?;
                Ok(ResolvedParam::Value { key, provider })
            })
            .collect()
    }

    /// Builds the provider that invokes a constructor or factory. Parameter
    /// providers are called when a value is produced, not when the graph was
    /// resolved, so transitive transient dependencies are fresh per
    /// invocation. Failures raised by the invocation itself are wrapped as
    /// instantiation errors naming the produced key.
    pub(crate) fn invoking_provider(
        &self,
        key: &Key,
        invoke: ConstructFn,
        resolved: Vec<ResolvedParam>,
    ) -> SharedProvider {
        let weak = self.downgrade();
        let key = key.clone();
        SharedProvider::new(move || {
            let mut args = Vec::with_capacity(resolved.len());
            for param in &resolved {
                match param {
                    ResolvedParam::Value { key, provider } => {
                        args.push(Argument::Value {
                            key: key.clone(),
                            value: provider.produce()?,
                        });
                    }
                    ResolvedParam::Deferred { key } => {
                        args.push(Argument::Deferred { key: key.clone() });
                    }
                }
            }

            let mut arguments = Arguments::new(weak.clone(), args);
            (invoke.as_ref())(&mut arguments).map_err(|cause| {
                InjectError::Instantiation {
                    key: key.clone(),
                    cause,
                }
            })
        })
    }

    /// Wraps a provider so its key produces at most one value over the
    /// injector's lifetime.
    pub(crate) fn singleton_wrapped(
        &self,
        key: &Key,
        inner: SharedProvider,
    ) -> SharedProvider {
        let weak = self.downgrade();
        let key = key.clone();
        SharedProvider::new(move || {
            let injector = weak.upgrade()?;
            let shared = injector.shared();
            shared.singletons.get_or_init(&key, || inner.produce())
        })
    }

    /// Scans a module's factory layers into the binding table. Layers are
    /// walked most-derived first; a declaration whose method name and
    /// parameter signature were already recorded by a more derived layer is
    /// suppressed rather than installed twice. A key collision with the live
    /// table is a duplicate binding, never an overwrite.
    pub(crate) fn scan_module(
        &self,
        module: Arc<dyn Module>,
    ) -> InjectResult<()> {
        let name = module.name();
        let layers = module.factories();

        let mut seen: HashSet<(&'static str, Vec<(ServiceInfo, bool)>)> =
            HashSet::new();
        for layer in layers {
            for decl in layer {
                if !seen.insert(decl.signature()) {
                    trace!(
                        module = name,
                        method = decl.method,
                        "factory overridden by a more derived layer"
                    );
                    continue;
                }

                let key = decl.key()?;
                if self.shared().bindings.contains(&key) {
                    return Err(InjectError::DuplicateBinding {
                        key,
                        module: name,
                    });
                }

                let resolved = self.resolve_params(
                    &key,
                    &decl.params,
                    &DependencyChain::empty(),
                )?;
                let raw = self.invoking_provider(
                    &key,
                    decl.produce.clone(),
                    resolved,
                );
                let provider = if decl.singleton {
                    self.singleton_wrapped(&key, raw)
                } else {
                    raw
                };

                debug!(module = name, %key, "installing module factory");
                if !self.shared().bindings.try_install(key.clone(), provider)
                {
                    return Err(InjectError::DuplicateBinding {
                        key,
                        module: name,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Foo;
    struct Bar;

    #[test]
    fn chains_extend_by_copy() {
        let root = DependencyChain::empty();
        let with_foo = root.extended(Key::of::<Foo>());
        let with_both = with_foo.extended(Key::of::<Bar>());

        assert!(!root.contains(&Key::of::<Foo>()));
        assert!(with_foo.contains(&Key::of::<Foo>()));
        assert!(!with_foo.contains(&Key::of::<Bar>()));
        assert_eq!(2, with_both.keys().len());
    }

    #[test]
    fn chains_render_in_order() {
        let chain = DependencyChain::empty()
            .extended(Key::of::<Foo>())
            .extended(Key::of::<Bar>());
        let rendered = chain.to_string();
        let foo_at = rendered.find("Foo").unwrap();
        let bar_at = rendered.find("Bar").unwrap();
        assert!(foo_at < bar_at, "{rendered}");
        assert!(rendered.contains(" -> "), "{rendered}");
    }
}
