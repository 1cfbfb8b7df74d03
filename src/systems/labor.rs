use anyhow::{bail, Result};
use rand::Rng;
use serde::Deserialize;
use tracing::info;

use crate::{
    engine::{System, SystemContext},
    ids::{JobId, PersonId, ZoneId},
    rng::SystemRng,
    world::World,
};

fn default_quit_rate() -> f64 {
    0.08
}

#[derive(Debug, Clone, Deserialize)]
pub struct LaborMarketConfig {
    /// Yearly chance that a worker leaves their job and searches again.
    #[serde(default = "default_quit_rate")]
    pub quit_rate: f64,
}

impl LaborMarketConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.quit_rate) {
            bail!("quit_rate must lie in [0, 1], got {}", self.quit_rate);
        }
        Ok(())
    }
}

impl Default for LaborMarketConfig {
    fn default() -> Self {
        Self {
            quit_rate: default_quit_rate(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnoverStats {
    pub quits: usize,
    pub hires: usize,
    pub unmatched: usize,
}

/// Job turnover. Workers who quit search again through the region sampler.
/// The zone of the job they left stands in for their home zone, which the
/// demographic model owns.
pub struct LaborMarketSystem {
    config: LaborMarketConfig,
    last_year: TurnoverStats,
}

impl LaborMarketSystem {
    pub fn new(config: LaborMarketConfig) -> Self {
        Self {
            config,
            last_year: TurnoverStats::default(),
        }
    }

    pub fn last_year(&self) -> TurnoverStats {
        self.last_year
    }
}

impl Default for LaborMarketSystem {
    fn default() -> Self {
        Self::new(LaborMarketConfig::default())
    }
}

impl System for LaborMarketSystem {
    fn name(&self) -> &str {
        "labor-market"
    }

    fn setup(&mut self, _ctx: &SystemContext, _world: &mut World) -> Result<()> {
        self.config.validate()
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let filled: Vec<(JobId, ZoneId)> = {
            let jobs = world.labor.jobs();
            let mut filled: Vec<(JobId, ZoneId)> = jobs
                .values()
                .filter(|j| !j.worker.is_vacant())
                .map(|j| (j.id(), j.zone()))
                .collect();
            filled.sort();
            filled
        };

        let mut seekers: Vec<(PersonId, ZoneId)> = Vec::new();
        for (id, zone) in filled {
            if rng.gen_bool(self.config.quit_rate) {
                if let Some(person) = world.labor.quit_job(id) {
                    seekers.push((person, zone));
                }
            }
        }

        let mut stats = TurnoverStats {
            quits: seekers.len(),
            ..TurnoverStats::default()
        };
        for (person, home) in seekers {
            match world.labor.take_vacant_job_anywhere(person, Some(home), rng) {
                Some(_) => stats.hires += 1,
                None => stats.unmatched += 1,
            }
        }

        info!(
            year = ctx.year,
            quits = stats.quits,
            hires = stats.hires,
            unmatched = stats.unmatched,
            "job turnover"
        );
        self.last_year = stats;
        Ok(())
    }
}
