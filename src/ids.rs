use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(ZoneId);
id_type!(RegionId);
id_type!(DwellingId);
id_type!(JobId);
id_type!(
    /// Household occupying a dwelling. Owned by the demographic model.
    HouseholdId
);
id_type!(
    /// Person holding a job. Owned by the demographic model.
    PersonId
);

/// Who, if anyone, occupies a dwelling or holds a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy<T> {
    Vacant,
    Occupied(T),
}

impl<T: Copy> Occupancy<T> {
    pub fn is_vacant(&self) -> bool {
        matches!(self, Occupancy::Vacant)
    }

    pub fn occupant(&self) -> Option<T> {
        match self {
            Occupancy::Vacant => None,
            Occupancy::Occupied(id) => Some(*id),
        }
    }
}

impl<T> Default for Occupancy<T> {
    fn default() -> Self {
        Occupancy::Vacant
    }
}

impl<T> From<Option<T>> for Occupancy<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(id) => Occupancy::Occupied(id),
            None => Occupancy::Vacant,
        }
    }
}

/// Hands out fresh dwelling and job ids for one simulation run.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    next_dwelling: u32,
    next_job: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_dwelling_id(&mut self) -> DwellingId {
        let id = DwellingId(self.next_dwelling);
        self.next_dwelling += 1;
        id
    }

    pub fn next_job_id(&mut self) -> JobId {
        let id = JobId(self.next_job);
        self.next_job += 1;
        id
    }

    /// Makes sure ids loaded from outside are never handed out again.
    pub fn observe_dwelling(&mut self, id: DwellingId) {
        self.next_dwelling = self.next_dwelling.max(id.0 + 1);
    }

    pub fn observe_job(&mut self, id: JobId) {
        self.next_job = self.next_job.max(id.0 + 1);
    }
}
