//! Yearly lifecycle: `setup` once, then `prepare_year` / `run_year` /
//! `end_year` for every simulated year, then `end_simulation`.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use tracing::info;

use crate::{
    rng::{RngManager, SystemRng},
    snapshot::SnapshotWriter,
    world::World,
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub snapshot_interval_years: u32,
    pub snapshot_dir: PathBuf,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_years,
            ),
            settings: self.settings,
            phase: Phase::Created,
            years_completed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Ready,
    YearPrepared(i32),
    YearRun(i32),
    Finished,
}

#[derive(Clone, Debug)]
pub struct SystemRunReport {
    pub name: String,
    pub duration_ms: f64,
}

#[derive(Clone, Debug)]
pub struct YearSummary {
    pub year: i32,
    pub system_reports: Vec<SystemRunReport>,
    pub vacant_dwellings: usize,
    pub vacant_jobs: usize,
    pub snapshot_path: Option<PathBuf>,
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
    phase: Phase,
    years_completed: u32,
}

impl Engine {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn setup(&mut self, world: &mut World) -> Result<()> {
        if self.phase != Phase::Created {
            bail!("setup called twice (phase {:?})", self.phase);
        }
        world.setup();
        let ctx = SystemContext {
            year: world.year(),
            scenario_name: &self.settings.scenario_name,
        };
        for system in &mut self.systems {
            system.setup(&ctx, world)?;
        }
        info!(
            scenario = %self.settings.scenario_name,
            year = world.year(),
            vacant_dwellings = world.vacant_dwellings(),
            vacant_jobs = world.vacant_jobs(),
            "setup complete"
        );
        self.phase = Phase::Ready;
        Ok(())
    }

    pub fn prepare_year(&mut self, world: &mut World) -> Result<()> {
        if self.phase != Phase::Ready {
            bail!(
                "prepare_year for {} out of order (phase {:?})",
                world.year(),
                self.phase
            );
        }
        world.prepare_year();
        self.phase = Phase::YearPrepared(world.year());
        Ok(())
    }

    /// Mutation phase: every system runs once, in registration order.
    pub fn run_year(&mut self, world: &mut World) -> Result<Vec<SystemRunReport>> {
        let year = world.year();
        if self.phase != Phase::YearPrepared(year) {
            bail!("run_year for {year} before prepare_year (phase {:?})", self.phase);
        }
        let mut reports = Vec::with_capacity(self.systems.len());
        for system in &mut self.systems {
            let start = Instant::now();
            let mut rng_stream = self.rng.stream(system.name());
            let ctx = SystemContext {
                year,
                scenario_name: &self.settings.scenario_name,
            };
            system.run(&ctx, world, &mut rng_stream)?;
            reports.push(SystemRunReport {
                name: system.name().to_string(),
                duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
            });
        }
        self.phase = Phase::YearRun(year);
        Ok(reports)
    }

    pub fn end_year(&mut self, world: &mut World) -> Result<Option<PathBuf>> {
        let year = world.year();
        if self.phase != Phase::YearRun(year) {
            bail!("end_year for {year} out of order (phase {:?})", self.phase);
        }
        let ctx = SystemContext {
            year,
            scenario_name: &self.settings.scenario_name,
        };
        for system in &mut self.systems {
            system.end_year(&ctx, world)?;
        }
        self.years_completed += 1;
        let snapshot_path = self.snapshot_writer.maybe_write(
            world,
            &self.settings.scenario_name,
            self.years_completed,
        )?;
        world.advance_year();
        self.phase = Phase::Ready;
        Ok(snapshot_path)
    }

    pub fn end_simulation(&mut self, world: &mut World) -> Result<PathBuf> {
        if self.phase != Phase::Ready {
            bail!("end_simulation mid-year (phase {:?})", self.phase);
        }
        let path = self
            .snapshot_writer
            .write_final(world, &self.settings.scenario_name)?;
        info!(
            scenario = %self.settings.scenario_name,
            years = self.years_completed,
            path = %path.display(),
            "simulation finished"
        );
        self.phase = Phase::Finished;
        Ok(path)
    }

    /// Runs one full year and reports on it.
    pub fn step(&mut self, world: &mut World) -> Result<YearSummary> {
        let year = world.year();
        self.prepare_year(world)?;
        let system_reports = self.run_year(world)?;
        let vacant_dwellings = world.vacant_dwellings();
        let vacant_jobs = world.vacant_jobs();
        let snapshot_path = self.end_year(world)?;
        Ok(YearSummary {
            year,
            system_reports,
            vacant_dwellings,
            vacant_jobs,
            snapshot_path,
        })
    }

    pub fn run(&mut self, world: &mut World, years: u32) -> Result<PathBuf> {
        self.run_with_hook(world, years, |_| {})
    }

    pub fn run_with_hook<F>(&mut self, world: &mut World, years: u32, mut hook: F) -> Result<PathBuf>
    where
        F: FnMut(&YearSummary),
    {
        if self.phase == Phase::Created {
            self.setup(world)?;
        }
        for _ in 0..years {
            let summary = self.step(world)?;
            hook(&summary);
        }
        self.end_simulation(world)
    }
}

pub struct SystemContext<'a> {
    pub year: i32,
    pub scenario_name: &'a str,
}

/// A model that runs inside the yearly loop. Systems mutate dwellings and
/// jobs only through the market methods on [`World`].
pub trait System {
    fn name(&self) -> &str;

    fn setup(&mut self, _ctx: &SystemContext, _world: &mut World) -> Result<()> {
        Ok(())
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;

    fn end_year(&mut self, _ctx: &SystemContext, _world: &mut World) -> Result<()> {
        Ok(())
    }
}
