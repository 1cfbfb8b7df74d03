use std::collections::HashMap;
use std::sync::{Arc, RwLockReadGuard};

use tracing::{info, warn};

use crate::dwelling::{Dwelling, DwellingStore};
use crate::error::SetupError;
use crate::geo::GeoData;
use crate::ids::{DwellingId, HouseholdId, Occupancy, RegionId};
use crate::pricing::{HouseholdIncomes, PricingConfig, PricingEngine};
use crate::vacancy::VacancyIndex;

/// Owns the dwelling stock and its vacancy index. Demographic and mobility
/// models change dwellings only through these methods, which keep the index
/// in step with occupancy.
#[derive(Debug)]
pub struct RealEstateMarket {
    geo: Arc<GeoData>,
    dwellings: DwellingStore,
    vacant: VacancyIndex<DwellingId>,
    pricing: PricingEngine,
}

impl RealEstateMarket {
    pub fn new(geo: Arc<GeoData>, pricing: PricingConfig) -> Self {
        Self {
            geo,
            dwellings: DwellingStore::new(),
            vacant: VacancyIndex::new("dwelling"),
            pricing: PricingEngine::new(pricing),
        }
    }

    /// Adds or replaces a dwelling and lists it when vacant.
    pub fn add_dwelling(&self, dwelling: Dwelling) -> Result<(), SetupError> {
        let region = self.geo.require_zone(dwelling.zone())?;
        let vacant = dwelling.occupant.is_vacant();
        let id = dwelling.id();
        if let Some(previous) = self.dwellings.add(dwelling) {
            if previous.occupant.is_vacant() {
                if let Some(old_region) = self.geo.region_of(previous.zone()) {
                    self.vacant.remove(old_region, id);
                }
            }
        }
        if vacant {
            self.vacant.add(region, id);
        }
        Ok(())
    }

    /// Removes a dwelling, delisting it if it was vacant.
    pub fn remove_dwelling(&self, id: DwellingId) -> Option<Dwelling> {
        let dwelling = self.dwellings.remove(id)?;
        if dwelling.occupant.is_vacant() {
            if let Some(region) = self.geo.region_of(dwelling.zone()) {
                self.vacant.remove(region, id);
            }
        }
        Some(dwelling)
    }

    pub fn dwelling(&self, id: DwellingId) -> Option<Dwelling> {
        self.dwellings.get(id)
    }

    /// Live read view over the stock. Hold it briefly: writers wait on it.
    pub fn dwellings(&self) -> RwLockReadGuard<'_, HashMap<DwellingId, Dwelling>> {
        self.dwellings.read()
    }

    pub fn dwelling_count(&self) -> usize {
        self.dwellings.len()
    }

    /// Empties the dwelling and lists it as vacant. Returns the household that
    /// lived there, `None` if it was already empty or does not exist.
    pub fn vacate(&self, id: DwellingId) -> Option<HouseholdId> {
        let (previous, zone) = self
            .dwellings
            .update(id, |d| (std::mem::take(&mut d.occupant), d.zone()))
            .or_else(|| {
                warn!(dwelling = %id, "cannot vacate unknown dwelling");
                None
            })?;
        let household = previous.occupant()?;
        if let Some(region) = self.geo.region_of(zone) {
            self.vacant.add(region, id);
        }
        Some(household)
    }

    /// Moves a household into a vacant dwelling and delists it. Returns
    /// `false` without changes if the dwelling is unknown or occupied.
    pub fn move_in(&self, id: DwellingId, household: HouseholdId) -> bool {
        let outcome = self.dwellings.update(id, |d| {
            if d.occupant.is_vacant() {
                d.occupant = Occupancy::Occupied(household);
                Ok(d.zone())
            } else {
                Err(d.occupant)
            }
        });
        match outcome {
            Some(Ok(zone)) => {
                if let Some(region) = self.geo.region_of(zone) {
                    self.vacant.remove(region, id);
                }
                true
            }
            Some(Err(current)) => {
                warn!(dwelling = %id, household = %household, ?current, "dwelling already occupied");
                false
            }
            None => {
                warn!(dwelling = %id, "cannot move into unknown dwelling");
                false
            }
        }
    }

    /// Lists an empty dwelling. Occupied and unknown dwellings are refused.
    pub fn add_to_vacancy_list(&self, id: DwellingId) -> bool {
        let Some(dwelling) = self.dwellings.get(id) else {
            warn!(dwelling = %id, "cannot list unknown dwelling as vacant");
            return false;
        };
        if !dwelling.occupant.is_vacant() {
            warn!(dwelling = %id, occupant = ?dwelling.occupant, "cannot list an occupied dwelling as vacant");
            return false;
        }
        match self.geo.region_of(dwelling.zone()) {
            Some(region) => {
                self.vacant.add(region, id);
                true
            }
            None => false,
        }
    }

    /// Delists a dwelling. A dwelling that was not listed is reported, not
    /// treated as an error.
    pub fn remove_from_vacancy_list(&self, id: DwellingId) -> bool {
        match self.region_of(id) {
            Some(region) => self.vacant.remove(region, id),
            None => {
                warn!(dwelling = %id, "cannot delist unknown dwelling");
                false
            }
        }
    }

    pub fn set_price(&self, id: DwellingId, price: f64) -> bool {
        self.dwellings.update(id, |d| d.price = price).is_some()
    }

    pub fn set_quality(&self, id: DwellingId, quality: u8) -> bool {
        self.dwellings.update(id, |d| d.quality = quality).is_some()
    }

    /// Rewrites every price with `f(dwelling)`.
    pub fn update_prices(&self, mut f: impl FnMut(&Dwelling) -> f64) {
        self.dwellings.update_all(|d| {
            let price = f(d);
            d.price = price;
        });
    }

    /// Full rebuild of the vacancy index from the stock.
    pub fn identify_vacant_dwellings(&self) -> usize {
        let total = self.vacant.identify_vacant(&self.dwellings, &self.geo);
        info!(vacant = total, dwellings = self.dwellings.len(), "vacant dwellings identified");
        total
    }

    pub fn vacant_in_region(&self, region: RegionId) -> Vec<DwellingId> {
        self.vacant.list_in_region(region)
    }

    pub fn vacant_count(&self, region: RegionId) -> usize {
        self.vacant.count_in_region(region)
    }

    pub fn is_listed_vacant(&self, id: DwellingId) -> bool {
        self.region_of(id)
            .is_some_and(|region| self.vacant.contains(region, id))
    }

    pub fn vacancies(&self) -> &VacancyIndex<DwellingId> {
        &self.vacant
    }

    pub fn setup_pricing(&mut self, incomes: &dyn HouseholdIncomes) {
        self.pricing.setup(&self.dwellings, incomes);
    }

    pub fn prepare_year(&mut self, year: i32) {
        self.pricing.prepare_year(year, &self.dwellings, &self.geo);
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    fn region_of(&self, id: DwellingId) -> Option<RegionId> {
        let zone = self.dwellings.get(id)?.zone();
        self.geo.region_of(zone)
    }
}
