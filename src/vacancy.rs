//! Per-region lists of vacant dwellings or jobs.
//!
//! The index is a cache over the entity store: it can always be rebuilt from a
//! full scan with [`VacancyIndex::identify_vacant`]. Each region bucket has its
//! own mutex, so callers working on different regions never contend.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use rand::Rng;
use tracing::warn;

use crate::geo::GeoData;
use crate::ids::RegionId;
use crate::store::{EntityStore, MarketEntity};

#[derive(Debug)]
pub struct VacancyIndex<I> {
    label: &'static str,
    buckets: RwLock<BTreeMap<RegionId, Mutex<Vec<I>>>>,
}

impl<I: Copy + Ord + Debug> VacancyIndex<I> {
    /// `label` names the entity kind in log output ("dwelling", "job").
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            buckets: RwLock::new(BTreeMap::new()),
        }
    }

    /// Rebuilds every bucket from a full scan of `store`. Entities are appended
    /// in id order so the result does not depend on map iteration order.
    pub fn identify_vacant<T>(&self, store: &EntityStore<T>, geo: &GeoData) -> usize
    where
        T: MarketEntity<Id = I>,
    {
        let mut fresh: BTreeMap<RegionId, Mutex<Vec<I>>> =
            geo.region_ids().map(|r| (r, Mutex::new(Vec::new()))).collect();
        let mut vacant: Vec<(I, RegionId)> = Vec::new();
        {
            let entries = store.read();
            for entity in entries.values().filter(|e| e.is_vacant()) {
                match geo.region_of(entity.zone()) {
                    Some(region) => vacant.push((entity.id(), region)),
                    None => warn!(
                        kind = self.label,
                        id = ?entity.id(),
                        zone = %entity.zone(),
                        "vacant entity sits in a zone without a region, not indexed"
                    ),
                }
            }
        }
        vacant.sort_by_key(|(id, _)| *id);
        let total = vacant.len();
        for (id, region) in vacant {
            fresh
                .entry(region)
                .or_default()
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .push(id);
        }
        *self.buckets.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        total
    }

    /// Appends `id` to the region's bucket. An id that is already listed is
    /// reported and left alone.
    pub fn add(&self, region: RegionId, id: I) {
        {
            let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(bucket) = buckets.get(&region) {
                let mut list = lock(bucket);
                if list.contains(&id) {
                    warn!(kind = self.label, ?id, region = %region, "already listed as vacant");
                } else {
                    list.push(id);
                }
                return;
            }
        }
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let list = buckets
            .entry(region)
            .or_default()
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        // Another caller may have created the bucket since the read lock.
        if list.contains(&id) {
            warn!(kind = self.label, ?id, region = %region, "already listed as vacant");
        } else {
            list.push(id);
        }
    }

    /// Removes `id` from the region's bucket. Returns `false` and logs a
    /// warning when the index did not list it, which means the index and the
    /// store have drifted apart; the next full rebuild repairs it.
    pub fn remove(&self, region: RegionId, id: I) -> bool {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        let removed = buckets.get(&region).is_some_and(|bucket| {
            let mut list = lock(bucket);
            match list.iter().position(|listed| *listed == id) {
                Some(pos) => {
                    list.remove(pos);
                    true
                }
                None => false,
            }
        });
        if !removed {
            warn!(
                kind = self.label,
                ?id,
                region = %region,
                "vacancy index desync: entity not listed in its region"
            );
        }
        removed
    }

    pub fn contains(&self, region: RegionId, id: I) -> bool {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets
            .get(&region)
            .is_some_and(|bucket| lock(bucket).contains(&id))
    }

    /// Unknown regions count as zero vacancies.
    pub fn count_in_region(&self, region: RegionId) -> usize {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets.get(&region).map_or(0, |bucket| lock(bucket).len())
    }

    /// Snapshot copy of the region's bucket in insertion order. Later changes
    /// to the index are not reflected in it.
    pub fn list_in_region(&self, region: RegionId) -> Vec<I> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets
            .get(&region)
            .map(|bucket| lock(bucket).clone())
            .unwrap_or_default()
    }

    pub fn counts_by_region(&self) -> BTreeMap<RegionId, usize> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets
            .iter()
            .map(|(region, bucket)| (*region, lock(bucket).len()))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.counts_by_region().values().sum()
    }

    /// Draws one id uniformly from the region's bucket and removes it while
    /// holding the bucket lock, so concurrent callers never receive the same id.
    pub fn take_random<R: Rng + ?Sized>(&self, region: RegionId, rng: &mut R) -> Option<I> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        let mut list = lock(buckets.get(&region)?);
        if list.is_empty() {
            return None;
        }
        let pos = rng.gen_range(0..list.len());
        Some(list.remove(pos))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
