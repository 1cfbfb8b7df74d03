use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLockReadGuard};

use rand::Rng;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::SetupError;
use crate::geo::GeoData;
use crate::ids::{JobId, Occupancy, PersonId, RegionId, ZoneId};
use crate::job::{Job, JobStore};
use crate::sampler::RegionSampler;
use crate::vacancy::VacancyIndex;

/// Owns the job stock, its vacancy index and the job search.
pub struct LaborMarket {
    geo: Arc<GeoData>,
    jobs: JobStore,
    vacant: VacancyIndex<JobId>,
    sampler: RegionSampler,
    density: BTreeMap<ZoneId, f64>,
}

impl LaborMarket {
    pub fn new(geo: Arc<GeoData>, sampler: RegionSampler) -> Self {
        Self {
            geo,
            jobs: JobStore::new(),
            vacant: VacancyIndex::new("job"),
            sampler,
            density: BTreeMap::new(),
        }
    }

    pub fn add_job(&self, job: Job) -> Result<(), SetupError> {
        let region = self.geo.require_zone(job.zone())?;
        let vacant = job.worker.is_vacant();
        let id = job.id();
        if let Some(previous) = self.jobs.add(job) {
            if previous.worker.is_vacant() {
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

    pub fn remove_job(&self, id: JobId) -> Option<Job> {
        let job = self.jobs.remove(id)?;
        if job.worker.is_vacant() {
            if let Some(region) = self.geo.region_of(job.zone()) {
                self.vacant.remove(region, id);
            }
        }
        Some(job)
    }

    pub fn job(&self, id: JobId) -> Option<Job> {
        self.jobs.get(id)
    }

    pub fn jobs(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        self.jobs.read()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// The worker leaves; the job goes back on the vacancy list.
    pub fn quit_job(&self, id: JobId) -> Option<PersonId> {
        let (previous, zone) = self
            .jobs
            .update(id, |j| (std::mem::take(&mut j.worker), j.zone()))
            .or_else(|| {
                warn!(job = %id, "cannot quit unknown job");
                None
            })?;
        let person = previous.occupant()?;
        if let Some(region) = self.geo.region_of(zone) {
            self.vacant.add(region, id);
        }
        Some(person)
    }

    /// Gives a vacant job to `person` and delists it.
    pub fn assign_worker(&self, id: JobId, person: PersonId) -> bool {
        match self.fill_if_vacant(id, person) {
            Some(zone) => {
                if let Some(region) = self.geo.region_of(zone) {
                    self.vacant.remove(region, id);
                }
                true
            }
            None => false,
        }
    }

    /// Sets the worker only when the job is vacant. A filled job keeps its
    /// worker and the attempt is logged.
    fn fill_if_vacant(&self, id: JobId, person: PersonId) -> Option<ZoneId> {
        let outcome = self.jobs.update(id, |j| {
            if j.worker.is_vacant() {
                j.worker = Occupancy::Occupied(person);
                Ok(j.zone())
            } else {
                Err(j.worker)
            }
        });
        match outcome {
            Some(Ok(zone)) => Some(zone),
            Some(Err(current)) => {
                warn!(job = %id, person = %person, ?current, "job already filled");
                None
            }
            None => {
                warn!(job = %id, "cannot assign unknown job");
                None
            }
        }
    }

    /// Lists a vacant job. Filled and unknown jobs are refused with a warning.
    pub fn add_to_vacancy_list(&self, id: JobId) -> bool {
        let Some(job) = self.jobs.get(id) else {
            warn!(job = %id, "cannot list unknown job as vacant");
            return false;
        };
        if !job.worker.is_vacant() {
            warn!(job = %id, worker = ?job.worker, "cannot list a filled job as vacant");
            return false;
        }
        match self.geo.region_of(job.zone()) {
            Some(region) => {
                self.vacant.add(region, id);
                true
            }
            None => false,
        }
    }

    pub fn remove_from_vacancy_list(&self, id: JobId) -> bool {
        match self.region_of(id) {
            Some(region) => self.vacant.remove(region, id),
            None => {
                warn!(job = %id, "cannot delist unknown job");
                false
            }
        }
    }

    /// Picks a vacant job for someone living in `home` (or nowhere yet) among
    /// the candidate regions and delists it. The caller is expected to assign
    /// a worker next; [`LaborMarket::take_vacant_job`] does both.
    ///
    /// `None` means no vacancy is reachable, which is a normal outcome.
    pub fn find_vacant_job<R: Rng + ?Sized>(
        &self,
        home: Option<ZoneId>,
        regions: &[RegionId],
        rng: &mut R,
    ) -> Option<JobId> {
        let weights = self.sampler.region_weights(home, regions, &self.vacant);
        let Some(region) = RegionSampler::select(&weights, rng) else {
            warn!(
                home = ?home,
                candidates = regions.len(),
                "no vacant job reachable from any candidate region"
            );
            return None;
        };
        let job = self.vacant.take_random(region, rng);
        if job.is_none() {
            warn!(region = %region, "region ran out of vacant jobs during the draw");
        }
        job
    }

    /// Finds a job as [`LaborMarket::find_vacant_job`] and hands it to `person`.
    pub fn take_vacant_job<R: Rng + ?Sized>(
        &self,
        person: PersonId,
        home: Option<ZoneId>,
        regions: &[RegionId],
        rng: &mut R,
    ) -> Option<JobId> {
        let id = self.find_vacant_job(home, regions, rng)?;
        // The job is already delisted; a stale entry stays off the list.
        self.fill_if_vacant(id, person)?;
        Some(id)
    }

    /// Job search over every region of the zone system.
    pub fn take_vacant_job_anywhere<R: Rng + ?Sized>(
        &self,
        person: PersonId,
        home: Option<ZoneId>,
        rng: &mut R,
    ) -> Option<JobId> {
        let regions: Vec<RegionId> = self.geo.region_ids().collect();
        self.take_vacant_job(person, home, &regions, rng)
    }

    pub fn identify_vacant_jobs(&self) -> usize {
        let total = self.vacant.identify_vacant(&self.jobs, &self.geo);
        info!(vacant = total, jobs = self.jobs.len(), "vacant jobs identified");
        total
    }

    pub fn vacant_in_region(&self, region: RegionId) -> Vec<JobId> {
        self.vacant.list_in_region(region)
    }

    pub fn vacant_count(&self, region: RegionId) -> usize {
        self.vacant.count_in_region(region)
    }

    pub fn is_listed_vacant(&self, id: JobId) -> bool {
        self.region_of(id)
            .is_some_and(|region| self.vacant.contains(region, id))
    }

    pub fn vacancies(&self) -> &VacancyIndex<JobId> {
        &self.vacant
    }

    /// Recomputes jobs per acre for every zone. Zones without area report 0.
    pub fn prepare_year(&mut self, year: i32) {
        let counts = {
            let entries = self.jobs.read();
            entries
                .par_iter()
                .fold(HashMap::new, |mut acc: HashMap<ZoneId, usize>, (_, job)| {
                    *acc.entry(job.zone()).or_default() += 1;
                    acc
                })
                .reduce(HashMap::new, |mut a, b| {
                    for (zone, n) in b {
                        *a.entry(zone).or_default() += n;
                    }
                    a
                })
        };
        self.density = self
            .geo
            .zones()
            .map(|zone| {
                let jobs = counts.get(&zone.id).copied().unwrap_or(0);
                let density = if zone.area_acres > 0.0 {
                    jobs as f64 / zone.area_acres
                } else {
                    0.0
                };
                (zone.id, density)
            })
            .collect();
        info!(year, jobs = self.jobs.len(), "job density recomputed");
    }

    pub fn job_density(&self, zone: ZoneId) -> f64 {
        self.density.get(&zone).copied().unwrap_or(0.0)
    }

    fn region_of(&self, id: JobId) -> Option<RegionId> {
        let zone = self.jobs.get(id)?.zone();
        self.geo.region_of(zone)
    }
}
