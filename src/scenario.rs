use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::Deserialize;

use crate::{
    dwelling::{Dwelling, DwellingType},
    engine::EngineSettings,
    geo::{GeoData, Zone},
    ids::{DwellingId, HouseholdId, JobId, PersonId, RegionId, ZoneId},
    job::Job,
    land::{CapacityMode, DevelopmentLedger},
    pricing::PricingConfig,
    rng::RngManager,
    sampler::{RegionSampler, DEFAULT_FALLBACK_CAP_MINUTES},
    systems::{LaborMarketConfig, PricingSystemConfig, RealEstateConfig},
    travel::{ExponentialCommuteDecay, Mode, TravelTimeMatrix, PEAK_HOUR_SECONDS},
    world::World,
};

fn default_start_year() -> i32 {
    2011
}

fn default_years() -> u32 {
    10
}

fn default_snapshot_interval_years() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_commute_beta() -> f64 {
    0.05
}

fn default_commute_mode() -> Mode {
    Mode::Car
}

fn default_time_of_day_seconds() -> u32 {
    PEAK_HOUR_SECONDS
}

fn default_fallback_cap_minutes() -> u32 {
    DEFAULT_FALLBACK_CAP_MINUTES
}

fn default_bedrooms() -> u8 {
    2
}

fn default_quality() -> u8 {
    2
}

fn default_year_built() -> i32 {
    1990
}

fn default_occupied_share() -> f64 {
    0.95
}

fn default_filled_share() -> f64 {
    0.9
}

fn default_min_income() -> f64 {
    10_000.0
}

fn default_max_income() -> f64 {
    90_000.0
}

fn default_capacity_mode() -> CapacityMode {
    CapacityMode::Units
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    #[serde(default = "default_years")]
    pub years: u32,
    #[serde(default = "default_snapshot_interval_years")]
    pub snapshot_interval_years: u32,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub zones: Vec<ScenarioZone>,
    #[serde(default)]
    pub travel_times: Vec<TravelTimeEntry>,
    #[serde(default)]
    pub commute: CommuteConfig,
    #[serde(default)]
    pub dwellings: Vec<DwellingGroup>,
    #[serde(default)]
    pub jobs: Vec<JobGroup>,
    #[serde(default)]
    pub incomes: IncomeRange,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub systems: SystemsConfig,
    #[serde(default)]
    pub development: DevelopmentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioZone {
    pub id: u32,
    pub region: u32,
    #[serde(default)]
    pub area_acres: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TravelTimeEntry {
    pub origin: u32,
    pub region: u32,
    pub minutes: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommuteConfig {
    #[serde(default = "default_commute_beta")]
    pub beta: f64,
    #[serde(default)]
    pub max_minutes: Option<u32>,
    #[serde(default = "default_commute_mode")]
    pub mode: Mode,
    /// Departure time used for skim lookups, seconds after midnight.
    #[serde(default = "default_time_of_day_seconds")]
    pub time_of_day_seconds: u32,
    /// Minutes assumed for unreachable regions when job search falls back
    /// to inverse travel time.
    #[serde(default = "default_fallback_cap_minutes")]
    pub fallback_cap_minutes: u32,
}

impl Default for CommuteConfig {
    fn default() -> Self {
        Self {
            beta: default_commute_beta(),
            max_minutes: None,
            mode: default_commute_mode(),
            time_of_day_seconds: default_time_of_day_seconds(),
            fallback_cap_minutes: default_fallback_cap_minutes(),
        }
    }
}

/// `count` identical dwellings in one zone; the first `occupied_share` of
/// them (rounded) start occupied.
#[derive(Debug, Clone, Deserialize)]
pub struct DwellingGroup {
    pub zone: u32,
    pub count: u32,
    #[serde(rename = "type")]
    pub dwelling_type: DwellingType,
    pub price: f64,
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default = "default_bedrooms")]
    pub bedrooms: u8,
    #[serde(default = "default_year_built")]
    pub year_built: i32,
    #[serde(default = "default_occupied_share")]
    pub occupied_share: f64,
    /// Shared by every dwelling of the group.
    #[serde(default)]
    pub coordinate: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobGroup {
    pub zone: u32,
    pub count: u32,
    pub job_type: String,
    #[serde(default = "default_filled_share")]
    pub filled_share: f64,
    #[serde(default)]
    pub start_time_seconds: Option<u32>,
    #[serde(default)]
    pub work_duration_seconds: Option<u32>,
}

/// Household incomes are drawn uniformly from this range.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomeRange {
    #[serde(default = "default_min_income")]
    pub min: f64,
    #[serde(default = "default_max_income")]
    pub max: f64,
}

impl Default for IncomeRange {
    fn default() -> Self {
        Self {
            min: default_min_income(),
            max: default_max_income(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemsConfig {
    #[serde(default)]
    pub real_estate: RealEstateConfig,
    #[serde(default)]
    pub labor: LaborMarketConfig,
    #[serde(default)]
    pub pricing: PricingSystemConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevelopmentConfig {
    #[serde(default = "default_capacity_mode")]
    pub mode: CapacityMode,
    /// CSV text: `zone,capacity,<type codes...>`.
    #[serde(default)]
    pub table: Option<String>,
}

impl Default for DevelopmentConfig {
    fn default() -> Self {
        Self {
            mode: default_capacity_mode(),
            table: None,
        }
    }
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    /// Builds the initial world. The same scenario always yields the same
    /// world: ids are sequential and incomes come from a stream seeded by
    /// `seed`.
    pub fn build_world(&self) -> Result<World> {
        if self.incomes.min > self.incomes.max {
            bail!(
                "income range is inverted ({} > {})",
                self.incomes.min,
                self.incomes.max
            );
        }

        self.systems
            .real_estate
            .validate()
            .context("Invalid real-estate settings")?;
        self.systems
            .labor
            .validate()
            .context("Invalid labor-market settings")?;

        let geo = GeoData::new(self.zones.iter().map(|z| Zone {
            id: ZoneId(z.id),
            region: RegionId(z.region),
            area_acres: z.area_acres,
        }))
        .context("Invalid zone list")?;

        let development = match &self.development.table {
            Some(table) => DevelopmentLedger::from_table(self.development.mode, table, &geo)
                .context("Invalid development constraints")?,
            None => DevelopmentLedger::new(self.development.mode),
        };

        let mut skim = TravelTimeMatrix::new();
        for entry in &self.travel_times {
            skim.set(ZoneId(entry.origin), RegionId(entry.region), entry.minutes);
        }
        let sampler = RegionSampler::new(
            Arc::new(skim),
            Arc::new(ExponentialCommuteDecay {
                beta: self.commute.beta,
                max_minutes: self.commute.max_minutes,
            }),
        )
        .with_mode(self.commute.mode)
        .with_time_of_day(self.commute.time_of_day_seconds)
        .with_fallback_cap(self.commute.fallback_cap_minutes);

        let mut world = World::new(
            self.start_year,
            geo,
            self.pricing.clone(),
            sampler,
            development,
        );

        let mut rng = RngManager::new(self.seed);
        let mut incomes = rng.stream("scenario-incomes");
        let mut next_dwelling = 1;
        let mut next_household = 1;
        for group in &self.dwellings {
            let occupied = occupied_count(group.count, group.occupied_share);
            for n in 0..group.count {
                let mut dwelling = Dwelling::new(
                    DwellingId(next_dwelling),
                    ZoneId(group.zone),
                    group.dwelling_type,
                    group.bedrooms,
                    group.quality,
                    group.price,
                    group.year_built,
                );
                next_dwelling += 1;
                if let Some((x, y)) = group.coordinate {
                    dwelling = dwelling.with_coordinate(x, y);
                }
                if n < occupied {
                    let household = HouseholdId(next_household);
                    next_household += 1;
                    dwelling = dwelling.with_occupant(household);
                    let income = if self.incomes.max > self.incomes.min {
                        incomes.gen_range(self.incomes.min..self.incomes.max)
                    } else {
                        self.incomes.min
                    };
                    world.set_household_income(household, income);
                }
                world
                    .insert_dwelling(dwelling)
                    .with_context(|| format!("Invalid dwelling group in zone {}", group.zone))?;
            }
        }

        let mut next_job = 1;
        let mut next_person = 1;
        for group in &self.jobs {
            let filled = occupied_count(group.count, group.filled_share);
            for n in 0..group.count {
                let mut job = Job::new(JobId(next_job), ZoneId(group.zone), &group.job_type);
                next_job += 1;
                if let (Some(start), Some(duration)) =
                    (group.start_time_seconds, group.work_duration_seconds)
                {
                    job = job.with_schedule(start, duration);
                }
                if n < filled {
                    job = job.with_worker(PersonId(next_person));
                    next_person += 1;
                }
                world
                    .insert_job(job)
                    .with_context(|| format!("Invalid job group in zone {}", group.zone))?;
            }
        }

        Ok(world)
    }

    pub fn years(&self, override_years: Option<u32>) -> u32 {
        override_years.unwrap_or(self.years)
    }

    pub fn engine_settings(
        &self,
        snapshot_dir: impl Into<PathBuf>,
        snapshot_interval_years: Option<u32>,
    ) -> EngineSettings {
        EngineSettings {
            scenario_name: self.name.clone(),
            seed: self.seed,
            snapshot_interval_years: snapshot_interval_years
                .unwrap_or(self.snapshot_interval_years),
            snapshot_dir: snapshot_dir.into(),
        }
    }
}

fn occupied_count(count: u32, share: f64) -> u32 {
    (count as f64 * share.clamp(0.0, 1.0)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: two_zones
seed: 3
zones:
  - { id: 1, region: 1, area_acres: 10.0 }
  - { id: 2, region: 2, area_acres: 5.0 }
dwellings:
  - { zone: 1, count: 4, type: SFD, price: 800.0, occupied_share: 0.5 }
jobs:
  - { zone: 2, count: 2, job_type: retail, filled_share: 0.0, start_time_seconds: 32400, work_duration_seconds: 28800 }
commute:
  mode: transit
"#;

    #[test]
    fn defaults_fill_missing_fields() {
        let scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(scenario.start_year, 2011);
        assert_eq!(scenario.snapshot_interval_years, 5);
        assert_eq!(scenario.logging.level, "info");
        assert_eq!(scenario.pricing.quality_levels, 4);
        assert_eq!(scenario.development.mode, CapacityMode::Units);
        assert_eq!(scenario.dwellings[0].bedrooms, 2);
        assert_eq!(scenario.dwellings[0].coordinate, None);
        assert_eq!(scenario.commute.mode, Mode::Transit);
        assert_eq!(scenario.commute.time_of_day_seconds, PEAK_HOUR_SECONDS);
    }

    #[test]
    fn builds_occupancy_from_shares() {
        let scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        let mut world = scenario.build_world().unwrap();
        world.setup();
        assert_eq!(world.real_estate.dwelling_count(), 4);
        assert_eq!(world.vacant_dwellings(), 2);
        assert_eq!(world.vacant_jobs(), 2);
        assert_eq!(world.real_estate.vacant_count(RegionId(1)), 2);
        assert_eq!(world.labor.vacant_count(RegionId(2)), 2);

        let job = world.labor.job(JobId(1)).unwrap();
        assert_eq!(job.start_time_seconds, Some(32_400));
        assert_eq!(job.work_duration_seconds, Some(28_800));
    }

    #[test]
    fn incomes_are_seeded() {
        let scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        let build = || {
            let mut world = scenario.build_world().unwrap();
            world.setup();
            world
                .real_estate
                .pricing()
                .affordability()
                .distribution(crate::pricing::IncomeCategory::VeryHigh)
                .to_vec()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn out_of_range_rates_are_rejected() {
        let mut scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        scenario.systems.labor.quit_rate = f64::NAN;
        assert!(scenario.build_world().is_err());

        let mut scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        scenario.systems.real_estate.move_out_rate = 1.5;
        assert!(scenario.build_world().is_err());
    }

    #[test]
    fn unreachable_job_region_is_still_searched() {
        let scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(scenario.commute.fallback_cap_minutes, 180);
        let mut world = scenario.build_world().unwrap();
        world.setup();
        let mut rng = RngManager::new(1);
        let mut stream = rng.stream("search");
        let job = world
            .labor
            .take_vacant_job_anywhere(PersonId(50), Some(ZoneId(1)), &mut stream);
        assert!(job.is_some());
    }

    #[test]
    fn dwelling_in_unknown_zone_is_rejected() {
        let yaml = MINIMAL.replace("{ zone: 1, count: 4", "{ zone: 9, count: 4");
        let scenario: Scenario = serde_yaml::from_str(&yaml).unwrap();
        assert!(scenario.build_world().is_err());
    }
}
