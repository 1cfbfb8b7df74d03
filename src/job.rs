use serde::{Deserialize, Serialize};

use crate::ids::{JobId, Occupancy, PersonId, ZoneId};
use crate::store::{EntityStore, MarketEntity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    zone: ZoneId,
    job_type: String,
    pub worker: Occupancy<PersonId>,
    /// Seconds after midnight the shift starts.
    pub start_time_seconds: Option<u32>,
    pub work_duration_seconds: Option<u32>,
}

impl Job {
    pub fn new(id: JobId, zone: ZoneId, job_type: impl Into<String>) -> Self {
        Self {
            id,
            zone,
            job_type: job_type.into(),
            worker: Occupancy::Vacant,
            start_time_seconds: None,
            work_duration_seconds: None,
        }
    }

    pub fn with_worker(mut self, person: PersonId) -> Self {
        self.worker = Occupancy::Occupied(person);
        self
    }

    pub fn with_schedule(mut self, start_time_seconds: u32, work_duration_seconds: u32) -> Self {
        self.start_time_seconds = Some(start_time_seconds);
        self.work_duration_seconds = Some(work_duration_seconds);
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn zone(&self) -> ZoneId {
        self.zone
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }
}

impl MarketEntity for Job {
    type Id = JobId;

    fn id(&self) -> JobId {
        self.id
    }

    fn zone(&self) -> ZoneId {
        self.zone
    }

    fn is_vacant(&self) -> bool {
        self.worker.is_vacant()
    }
}

pub type JobStore = EntityStore<Job>;
