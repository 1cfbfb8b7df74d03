use std::collections::BTreeMap;

use anyhow::{bail, Result};
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    dwelling::DwellingType,
    engine::{System, SystemContext},
    ids::{DwellingId, HouseholdId, RegionId, ZoneId},
    rng::SystemRng,
    world::World,
};

fn default_move_out_rate() -> f64 {
    0.05
}

fn default_units_per_project() -> u32 {
    2
}

fn default_new_quality() -> u8 {
    3
}

fn default_new_bedrooms() -> u8 {
    3
}

fn default_new_price() -> f64 {
    1000.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealEstateConfig {
    /// Yearly chance that an occupied dwelling's household moves out.
    #[serde(default = "default_move_out_rate")]
    pub move_out_rate: f64,
    /// Units built per project when a region runs tight. 0 disables construction.
    #[serde(default = "default_units_per_project")]
    pub units_per_project: u32,
    #[serde(default = "default_new_quality")]
    pub new_quality: u8,
    #[serde(default = "default_new_bedrooms")]
    pub new_bedrooms: u8,
    /// Price of new units where the type has no stock to price from.
    #[serde(default = "default_new_price")]
    pub new_price: f64,
}

impl RealEstateConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.move_out_rate) {
            bail!("move_out_rate must lie in [0, 1], got {}", self.move_out_rate);
        }
        Ok(())
    }
}

impl Default for RealEstateConfig {
    fn default() -> Self {
        Self {
            move_out_rate: default_move_out_rate(),
            units_per_project: default_units_per_project(),
            new_quality: default_new_quality(),
            new_bedrooms: default_new_bedrooms(),
            new_price: default_new_price(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocationStats {
    pub moved_out: usize,
    pub moved_in: usize,
    pub left_area: usize,
    pub units_built: usize,
}

/// Household relocation and new construction. Households that move out pick
/// a region in proportion to its vacant dwellings and a dwelling at random
/// within it; households that find nothing leave the study area.
pub struct RealEstateSystem {
    config: RealEstateConfig,
    last_year: RelocationStats,
}

impl RealEstateSystem {
    pub fn new(config: RealEstateConfig) -> Self {
        Self {
            config,
            last_year: RelocationStats::default(),
        }
    }

    pub fn last_year(&self) -> RelocationStats {
        self.last_year
    }

    /// One project per region whose vacancy sits below the structural rate
    /// of its tightest buildable type.
    fn construct(&self, world: &mut World) -> Result<usize> {
        if self.config.units_per_project == 0 {
            return Ok(0);
        }
        let mut projects: Vec<(ZoneId, DwellingType, f64)> = Vec::new();
        for region in world.geo().region_ids() {
            let pricing = world.real_estate.pricing();
            let mut candidates: Vec<(DwellingType, f64)> = DwellingType::ALL
                .into_iter()
                .map(|t| (t, t.structural_vacancy() - pricing.vacancy_rate(t, region)))
                .filter(|(_, pressure)| *pressure > 0.0)
                .collect();
            candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

            let project = candidates.into_iter().find_map(|(t, _)| {
                world
                    .geo()
                    .zones_in(region)
                    .iter()
                    .copied()
                    .find(|&zone| {
                        world
                            .development
                            .can_build(zone, t, self.config.units_per_project)
                    })
                    .map(|zone| (zone, t))
            });
            if let Some((zone, t)) = project {
                let average = pricing.average_price_by_type(t, region);
                let price = if average > 0.0 && average.is_finite() {
                    average
                } else {
                    self.config.new_price
                };
                projects.push((zone, t, price));
            }
        }

        let mut built = 0;
        for (zone, dwelling_type, price) in projects {
            if let Some(ids) = world.construct(
                zone,
                dwelling_type,
                self.config.units_per_project,
                self.config.new_bedrooms,
                self.config.new_quality,
                price,
            )? {
                debug!(zone = %zone, dwelling_type = %dwelling_type, units = ids.len(), "dwellings built");
                built += ids.len();
            }
        }
        Ok(built)
    }

    fn relocate<R: Rng + ?Sized>(&self, world: &mut World, rng: &mut R) -> RelocationStats {
        let mut stats = RelocationStats::default();
        let occupied: Vec<DwellingId> = {
            let dwellings = world.real_estate.dwellings();
            let mut ids: Vec<DwellingId> = dwellings
                .values()
                .filter(|d| !d.occupant.is_vacant())
                .map(|d| d.id())
                .collect();
            ids.sort();
            ids
        };

        let mut movers: Vec<HouseholdId> = Vec::new();
        for id in occupied {
            if rng.gen_bool(self.config.move_out_rate) {
                if let Some(household) = world.real_estate.vacate(id) {
                    movers.push(household);
                }
            }
        }
        stats.moved_out = movers.len();

        for household in movers {
            match pick_vacant_dwelling(world, rng) {
                Some(id) if world.real_estate.move_in(id, household) => stats.moved_in += 1,
                _ => stats.left_area += 1,
            }
        }
        stats
    }
}

fn pick_vacant_dwelling<R: Rng + ?Sized>(world: &World, rng: &mut R) -> Option<DwellingId> {
    let counts: BTreeMap<RegionId, usize> = world.real_estate.vacancies().counts_by_region();
    let regions: Vec<(RegionId, usize)> = counts.into_iter().filter(|(_, n)| *n > 0).collect();
    let dist = WeightedIndex::new(regions.iter().map(|(_, n)| *n)).ok()?;
    let (region, _) = regions[dist.sample(rng)];
    let listed = world.real_estate.vacant_in_region(region);
    if listed.is_empty() {
        return None;
    }
    Some(listed[rng.gen_range(0..listed.len())])
}

impl Default for RealEstateSystem {
    fn default() -> Self {
        Self::new(RealEstateConfig::default())
    }
}

impl System for RealEstateSystem {
    fn name(&self) -> &str {
        "real-estate"
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
        let units_built = self.construct(world)?;
        let mut stats = self.relocate(world, rng);
        stats.units_built = units_built;
        info!(
            year = ctx.year,
            moved_out = stats.moved_out,
            moved_in = stats.moved_in,
            left_area = stats.left_area,
            units_built = stats.units_built,
            "households relocated"
        );
        self.last_year = stats;
        Ok(())
    }
}
