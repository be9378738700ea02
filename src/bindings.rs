use crate::{provider::SharedProvider, Key};
use dashmap::{mapref::entry::Entry, DashMap};
use std::fmt::{Debug, Formatter};

/// The concurrent map from [`Key`] to its installed provider. The table is
/// append-only: once a provider is installed for a key it is never replaced,
/// and every subsequent lookup observes the same provider.
#[derive(Default)]
pub(crate) struct BindingTable {
    bindings: DashMap<Key, SharedProvider>,
}

impl BindingTable {
    pub fn get(&self, key: &Key) -> Option<SharedProvider> {
        self.bindings.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.bindings.contains_key(key)
    }

    /// Installs a provider unless the key is already bound, returning the
    /// provider that ended up installed. First writer wins; concurrent
    /// resolutions of the same key all converge on the winner.
    pub fn install(&self, key: Key, provider: SharedProvider) -> SharedProvider {
        match self.bindings.entry(key) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                slot.insert(provider.clone());
                provider
            }
        }
    }

    /// Installs a provider only if the key is unbound. Returns whether the
    /// install happened; the check and the write are a single atomic step.
    pub fn try_install(&self, key: Key, provider: SharedProvider) -> bool {
        match self.bindings.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(provider);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}

impl Debug for BindingTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingTable")
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DynSvc, Svc};

    struct Foo;

    fn constant_provider(value: i32) -> SharedProvider {
        SharedProvider::new(move || Ok(Svc::new(value) as DynSvc))
    }

    #[test]
    fn first_install_wins() {
        let table = BindingTable::default();
        let key = Key::of::<Foo>();

        assert!(table.try_install(key.clone(), constant_provider(1)));
        assert!(!table.try_install(key.clone(), constant_provider(2)));

        let winner = table.get(&key).unwrap();
        let value = winner.produce().unwrap().downcast::<i32>().unwrap();
        assert_eq!(1, *value);
        assert_eq!(1, table.len());
    }

    #[test]
    fn install_returns_existing_provider() {
        let table = BindingTable::default();
        let key = Key::of::<Foo>();

        table.install(key.clone(), constant_provider(1));
        let survivor = table.install(key.clone(), constant_provider(2));
        let value = survivor.produce().unwrap().downcast::<i32>().unwrap();
        assert_eq!(1, *value);
    }

    #[test]
    fn concurrent_installs_converge_on_one_provider() {
        let table = BindingTable::default();
        let key = Key::of::<Foo>();

        let values: Vec<i32> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|value| {
                    let table = &table;
                    let key = key.clone();
                    scope.spawn(move || {
                        let winner = table.install(key, constant_provider(value));
                        *winner.produce().unwrap().downcast::<i32>().unwrap()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        // Every racer adopted the single installed provider.
        assert!(values.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(1, table.len());
    }
}
