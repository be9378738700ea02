use crate::{DynSvc, InjectResult, Key};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};

/// The per-injector cache of singleton values.
///
/// Each scoped key owns one cell. The first caller to find the cell empty
/// acquires exclusive construction rights and runs the underlying provider
/// exactly once; concurrent callers block on the cell until the value is
/// ready. A failed construction leaves the cell empty so a later call can
/// retry, and no partially-built value is ever observable.
#[derive(Default)]
pub(crate) struct SingletonCache {
    cells: DashMap<Key, Arc<OnceCell<DynSvc>>>,
}

impl SingletonCache {
    pub fn get_or_init(
        &self,
        key: &Key,
        init: impl FnOnce() -> InjectResult<DynSvc>,
    ) -> InjectResult<DynSvc> {
        // The cell is cloned out of the map so no shard lock is held while
        // the value is constructed; a singleton may construct other
        // singletons during its own initialization.
        let cell = match self.cells.get(key) {
            Some(cell) => cell.value().clone(),
            None => self.cells.entry(key.clone()).or_default().clone(),
        };

        // Unsynchronized fast path for the common already-built case.
        if let Some(value) = cell.get() {
            return Ok(value.clone());
        }

        tracing::debug!(%key, "constructing singleton");
        cell.get_or_try_init(init).map(Clone::clone)
    }
}

impl Debug for SingletonCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonCache")
            .field("cells", &self.cells.len())
            .finish()
    }
}
