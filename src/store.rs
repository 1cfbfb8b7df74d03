//! Keyed entity storage shared by the dwelling and job stores.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use crate::ids::ZoneId;

/// Something that sits in a zone and can be vacant.
pub trait MarketEntity: Clone + Send + Sync {
    type Id: Copy + Eq + Hash + Ord + Send + Sync + std::fmt::Debug;

    fn id(&self) -> Self::Id;
    fn zone(&self) -> ZoneId;
    fn is_vacant(&self) -> bool;
}

/// Concurrent keyed map. Readers may scan while a writer waits; every access
/// holds the lock only for the duration of the call.
#[derive(Debug)]
pub struct EntityStore<T: MarketEntity> {
    entries: RwLock<HashMap<T::Id, T>>,
}

impl<T: MarketEntity> Default for EntityStore<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: MarketEntity> EntityStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: T::Id) -> Option<T> {
        self.read().get(&id).cloned()
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.read().contains_key(&id)
    }

    /// Inserts keyed by the entity's own id, replacing any previous entry.
    pub fn add(&self, entity: T) -> Option<T> {
        self.write().insert(entity.id(), entity)
    }

    pub fn remove(&self, id: T::Id) -> Option<T> {
        self.write().remove(&id)
    }

    /// Applies `f` to the entry in place.
    pub fn update<R>(&self, id: T::Id, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.write().get_mut(&id).map(f)
    }

    /// Applies `f` to every entry while holding the write lock once.
    pub fn update_all(&self, mut f: impl FnMut(&mut T)) {
        for entity in self.write().values_mut() {
            f(entity);
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Live read view over all entries, in no particular order.
    pub fn read(&self) -> RwLockReadGuard<'_, HashMap<T::Id, T>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<T::Id, T>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
