use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dwelling::{Dwelling, DwellingType};
use crate::error::SetupError;
use crate::geo::GeoData;
use crate::ids::{DwellingId, HouseholdId, IdAllocator, JobId, PersonId, RegionId, ZoneId};
use crate::job::Job;
use crate::land::DevelopmentLedger;
use crate::market::{LaborMarket, RealEstateMarket};
use crate::pricing::PricingConfig;
use crate::sampler::RegionSampler;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DwellingRow {
    pub id: DwellingId,
    pub zone: ZoneId,
    pub region: Option<RegionId>,
    pub dwelling_type: DwellingType,
    pub household: Option<HouseholdId>,
    pub price: f64,
    pub quality: u8,
    pub bedrooms: u8,
    pub year_built: i32,
    pub coordinate: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRow {
    pub id: JobId,
    pub zone: ZoneId,
    pub region: Option<RegionId>,
    pub job_type: String,
    pub worker: Option<PersonId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSummary {
    pub id: RegionId,
    pub average_price: Option<f64>,
    pub vacancy_rate: f64,
    pub vacant_dwellings: usize,
    pub vacant_jobs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub scenario: String,
    pub year: i32,
    pub quality_shares: Vec<f64>,
    pub initial_quality_shares: Vec<f64>,
    pub regions: Vec<RegionSummary>,
    pub dwellings: Vec<DwellingRow>,
    pub jobs: Vec<JobRow>,
}

/// Everything the real-estate and labor core owns for one run.
pub struct World {
    year: i32,
    geo: Arc<GeoData>,
    ids: IdAllocator,
    pub real_estate: RealEstateMarket,
    pub labor: LaborMarket,
    pub development: DevelopmentLedger,
    incomes: BTreeMap<HouseholdId, f64>,
}

impl World {
    pub fn new(
        start_year: i32,
        geo: GeoData,
        pricing: PricingConfig,
        sampler: RegionSampler,
        development: DevelopmentLedger,
    ) -> Self {
        let geo = Arc::new(geo);
        Self {
            year: start_year,
            real_estate: RealEstateMarket::new(Arc::clone(&geo), pricing),
            labor: LaborMarket::new(Arc::clone(&geo), sampler),
            geo,
            ids: IdAllocator::new(),
            development,
            incomes: BTreeMap::new(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn advance_year(&mut self) {
        self.year += 1;
    }

    pub fn geo(&self) -> &GeoData {
        &self.geo
    }

    /// Loads an initial or newly built dwelling, reserving its id.
    pub fn insert_dwelling(&mut self, dwelling: Dwelling) -> Result<(), SetupError> {
        self.ids.observe_dwelling(dwelling.id());
        self.real_estate.add_dwelling(dwelling)
    }

    pub fn insert_job(&mut self, job: Job) -> Result<(), SetupError> {
        self.ids.observe_job(job.id());
        self.labor.add_job(job)
    }

    /// Builds `units` vacant dwellings of one type in `zone`, consuming
    /// development capacity. Returns the new ids, or `None` when the zone does
    /// not allow the type or lacks room.
    pub fn construct(
        &mut self,
        zone: ZoneId,
        dwelling_type: DwellingType,
        units: u32,
        bedrooms: u8,
        quality: u8,
        price: f64,
    ) -> Result<Option<Vec<DwellingId>>, SetupError> {
        self.geo.require_zone(zone)?;
        if !self.development.can_build(zone, dwelling_type, units) {
            return Ok(None);
        }
        let mut built = Vec::with_capacity(units as usize);
        for _ in 0..units {
            let id = self.ids.next_dwelling_id();
            let dwelling =
                Dwelling::new(id, zone, dwelling_type, bedrooms, quality, price, self.year);
            self.real_estate.add_dwelling(dwelling)?;
            built.push(id);
        }
        self.development.consume_for(zone, dwelling_type, units);
        Ok(Some(built))
    }

    pub fn set_household_income(&mut self, household: HouseholdId, income: f64) {
        self.incomes.insert(household, income);
    }

    /// One-time baseline: vacancy indices, initial quality and affordability
    /// shares. Run after every initial dwelling and job is loaded.
    pub fn setup(&mut self) {
        self.real_estate.identify_vacant_dwellings();
        self.labor.identify_vacant_jobs();
        self.real_estate.setup_pricing(&self.incomes);
    }

    /// Recomputes the aggregates the coming year reads. They go stale as soon
    /// as the year's models start mutating the stock.
    pub fn prepare_year(&mut self) {
        self.real_estate.prepare_year(self.year);
        self.labor.prepare_year(self.year);
    }

    pub fn vacant_dwellings(&self) -> usize {
        self.real_estate.vacancies().total()
    }

    pub fn vacant_jobs(&self) -> usize {
        self.labor.vacancies().total()
    }

    pub fn snapshot(&self, scenario: &str) -> WorldSnapshot {
        let pricing = self.real_estate.pricing();
        let regions = self
            .geo
            .region_ids()
            .map(|id| {
                let average = pricing.average_price(id);
                RegionSummary {
                    id,
                    average_price: average.is_finite().then_some(average),
                    vacancy_rate: pricing.region_vacancy_rate(id),
                    vacant_dwellings: self.real_estate.vacant_count(id),
                    vacant_jobs: self.labor.vacant_count(id),
                }
            })
            .collect();

        let mut dwellings: Vec<DwellingRow> = self
            .real_estate
            .dwellings()
            .values()
            .map(|d| DwellingRow {
                id: d.id(),
                zone: d.zone(),
                region: self.geo.region_of(d.zone()),
                dwelling_type: d.dwelling_type,
                household: d.occupant.occupant(),
                price: d.price,
                quality: d.quality,
                bedrooms: d.bedrooms,
                year_built: d.year_built,
                coordinate: d.coordinate,
            })
            .collect();
        dwellings.sort_by_key(|row| row.id);

        let mut jobs: Vec<JobRow> = self
            .labor
            .jobs()
            .values()
            .map(|j| JobRow {
                id: j.id(),
                zone: j.zone(),
                region: self.geo.region_of(j.zone()),
                job_type: j.job_type().to_string(),
                worker: j.worker.occupant(),
            })
            .collect();
        jobs.sort_by_key(|row| row.id);

        WorldSnapshot {
            scenario: scenario.to_string(),
            year: self.year,
            quality_shares: pricing.quality_shares().to_vec(),
            initial_quality_shares: pricing.initial_quality_shares().to_vec(),
            regions,
            dwellings,
            jobs,
        }
    }
}
