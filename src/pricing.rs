//! Pricing & quality aggregates over the dwelling stock.
//!
//! Everything here is recomputed from a full scan of the store. Scans fan out
//! over rayon and merge per-worker partial maps at the end.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dwelling::{DwellingStore, DwellingType};
use crate::geo::GeoData;
use crate::ids::{HouseholdId, RegionId};

fn default_quality_levels() -> u8 {
    4
}

fn default_rent_category_width() -> f64 {
    200.0
}

fn default_max_rent_category() -> usize {
    25
}

fn default_income_limits() -> [f64; 3] {
    [20_000.0, 40_000.0, 60_000.0]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_quality_levels")]
    pub quality_levels: u8,
    #[serde(default = "default_rent_category_width")]
    pub rent_category_width: f64,
    /// Highest rent category index; prices above it are folded into it.
    #[serde(default = "default_max_rent_category")]
    pub max_rent_category: usize,
    /// Upper income bounds of the low, medium and high categories.
    #[serde(default = "default_income_limits")]
    pub income_limits: [f64; 3],
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            quality_levels: default_quality_levels(),
            rent_category_width: default_rent_category_width(),
            max_rent_category: default_max_rent_category(),
            income_limits: default_income_limits(),
        }
    }
}

impl PricingConfig {
    pub fn rent_category(&self, price: f64) -> usize {
        if !(self.rent_category_width > 0.0) || !price.is_finite() {
            return self.max_rent_category;
        }
        let category = (price.max(0.0) / self.rent_category_width) as usize;
        category.min(self.max_rent_category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeCategory {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl IncomeCategory {
    pub const ALL: [IncomeCategory; 4] = [
        IncomeCategory::Low,
        IncomeCategory::Medium,
        IncomeCategory::High,
        IncomeCategory::VeryHigh,
    ];

    pub fn for_income(income: f64, limits: &[f64; 3]) -> Self {
        if income < limits[0] {
            IncomeCategory::Low
        } else if income < limits[1] {
            IncomeCategory::Medium
        } else if income < limits[2] {
            IncomeCategory::High
        } else {
            IncomeCategory::VeryHigh
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn highest() -> Self {
        IncomeCategory::VeryHigh
    }
}

/// Income lookup supplied by the demographic model.
pub trait HouseholdIncomes: Sync {
    fn annual_income(&self, household: HouseholdId) -> Option<f64>;
}

impl HouseholdIncomes for HashMap<HouseholdId, f64> {
    fn annual_income(&self, household: HouseholdId) -> Option<f64> {
        self.get(&household).copied()
    }
}

impl HouseholdIncomes for BTreeMap<HouseholdId, f64> {
    fn annual_income(&self, household: HouseholdId) -> Option<f64> {
        self.get(&household).copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeRegionStats {
    pub total: usize,
    pub vacant: usize,
    /// 0 when the cell holds no dwellings.
    pub vacancy_rate: f64,
    /// 0 when the cell holds no dwellings.
    pub average_price: f64,
}

/// Share of households in each income category living at each rent category.
/// Each income row sums to 1, or is all zeros when the category is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffordabilityTable {
    shares: Vec<Vec<f64>>,
}

impl AffordabilityTable {
    fn empty(rent_categories: usize) -> Self {
        Self {
            shares: vec![vec![0.0; rent_categories]; IncomeCategory::ALL.len()],
        }
    }

    pub fn share(&self, income: IncomeCategory, rent_category: usize) -> f64 {
        self.shares[income.index()]
            .get(rent_category)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn distribution(&self, income: IncomeCategory) -> &[f64] {
        &self.shares[income.index()]
    }
}

#[derive(Default)]
struct Tally {
    count: usize,
    vacant: usize,
    price_sum: f64,
}

impl Tally {
    fn merge(&mut self, other: &Tally) {
        self.count += other.count;
        self.vacant += other.vacant;
        self.price_sum += other.price_sum;
    }
}

fn merge_tallies<K: std::hash::Hash + Eq>(
    mut a: HashMap<K, Tally>,
    b: HashMap<K, Tally>,
) -> HashMap<K, Tally> {
    for (key, tally) in b {
        a.entry(key).or_default().merge(&tally);
    }
    a
}

/// Tallies dwellings per (type, region) in parallel.
fn tally_by_type_region(
    store: &DwellingStore,
    geo: &GeoData,
) -> HashMap<(DwellingType, RegionId), Tally> {
    let entries = store.read();
    entries
        .par_iter()
        .fold(HashMap::new, |mut acc: HashMap<_, Tally>, (_, dwelling)| {
            if let Some(region) = geo.region_of(dwelling.zone()) {
                let tally = acc.entry((dwelling.dwelling_type, region)).or_default();
                tally.count += 1;
                tally.price_sum += dwelling.price;
                if dwelling.occupant.is_vacant() {
                    tally.vacant += 1;
                }
            }
            acc
        })
        .reduce(HashMap::new, merge_tallies)
}

/// Mean dwelling price per region. Regions without dwellings report
/// `f64::INFINITY`: there is no market there to afford.
pub fn region_average_prices(store: &DwellingStore, geo: &GeoData) -> BTreeMap<RegionId, f64> {
    averages_by_region(&tally_by_type_region(store, geo), geo)
}

/// Vacancy rate and mean price for every (type, region) pair of the zone system.
pub fn type_region_stats(
    store: &DwellingStore,
    geo: &GeoData,
) -> BTreeMap<(DwellingType, RegionId), TypeRegionStats> {
    stats_by_cell(&tally_by_type_region(store, geo), geo)
}

fn averages_by_region(
    by_cell: &HashMap<(DwellingType, RegionId), Tally>,
    geo: &GeoData,
) -> BTreeMap<RegionId, f64> {
    let mut by_region: HashMap<RegionId, Tally> = HashMap::new();
    for ((_, region), tally) in by_cell {
        by_region.entry(*region).or_default().merge(tally);
    }
    geo.region_ids()
        .map(|region| {
            let average = match by_region.get(&region) {
                Some(t) if t.count > 0 => t.price_sum / t.count as f64,
                _ => f64::INFINITY,
            };
            (region, average)
        })
        .collect()
}

fn stats_by_cell(
    by_cell: &HashMap<(DwellingType, RegionId), Tally>,
    geo: &GeoData,
) -> BTreeMap<(DwellingType, RegionId), TypeRegionStats> {
    let mut table = BTreeMap::new();
    for dwelling_type in DwellingType::ALL {
        for region in geo.region_ids() {
            let stats = match by_cell.get(&(dwelling_type, region)) {
                Some(t) if t.count > 0 => TypeRegionStats {
                    total: t.count,
                    vacant: t.vacant,
                    vacancy_rate: t.vacant as f64 / t.count as f64,
                    average_price: t.price_sum / t.count as f64,
                },
                _ => TypeRegionStats::default(),
            };
            table.insert((dwelling_type, region), stats);
        }
    }
    table
}

/// Fraction of all dwellings at each quality level `1..=levels`; index 0 holds
/// level 1. Out-of-range qualities are clamped into the scale.
pub fn quality_shares(store: &DwellingStore, levels: u8) -> Vec<f64> {
    let levels = usize::from(levels.max(1));
    let entries = store.read();
    let counts = entries
        .par_iter()
        .fold(
            || vec![0_usize; levels],
            |mut acc, (_, dwelling)| {
                let level = usize::from(dwelling.quality).clamp(1, levels);
                acc[level - 1] += 1;
                acc
            },
        )
        .reduce(
            || vec![0_usize; levels],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                a
            },
        );
    let total: usize = counts.iter().sum();
    counts
        .into_iter()
        .map(|c| if total > 0 { c as f64 / total as f64 } else { 0.0 })
        .collect()
}

/// Tabulates which rent categories each income category occupies today.
pub fn affordability_table(
    store: &DwellingStore,
    incomes: &dyn HouseholdIncomes,
    config: &PricingConfig,
) -> AffordabilityTable {
    let categories = config.max_rent_category + 1;
    let mut counts = vec![vec![0.0_f64; categories]; IncomeCategory::ALL.len()];
    let mut unknown = 0_usize;
    {
        let entries = store.read();
        for dwelling in entries.values() {
            let Some(household) = dwelling.occupant.occupant() else {
                continue;
            };
            let Some(income) = incomes.annual_income(household) else {
                unknown += 1;
                continue;
            };
            let income_category = IncomeCategory::for_income(income, &config.income_limits);
            counts[income_category.index()][config.rent_category(dwelling.price)] += 1.0;
        }
    }
    if unknown > 0 {
        warn!(households = unknown, "occupied dwellings without a household income skipped");
    }
    // The richest bracket can always afford the top rent category.
    counts[IncomeCategory::highest().index()][config.max_rent_category] += 1.0;

    let mut table = AffordabilityTable::empty(categories);
    for (row, shares) in counts.iter().zip(table.shares.iter_mut()) {
        let sum: f64 = row.iter().sum();
        if sum > 0.0 {
            for (share, count) in shares.iter_mut().zip(row) {
                *share = count / sum;
            }
        }
    }
    table
}

/// Yearly market aggregates. Values are stale between `prepare_year` calls.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    config: PricingConfig,
    region_prices: BTreeMap<RegionId, f64>,
    type_region: BTreeMap<(DwellingType, RegionId), TypeRegionStats>,
    initial_quality: Vec<f64>,
    current_quality: Vec<f64>,
    affordability: AffordabilityTable,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        let levels = usize::from(config.quality_levels.max(1));
        let categories = config.max_rent_category + 1;
        Self {
            config,
            region_prices: BTreeMap::new(),
            type_region: BTreeMap::new(),
            initial_quality: vec![0.0; levels],
            current_quality: vec![0.0; levels],
            affordability: AffordabilityTable::empty(categories),
        }
    }

    /// One-time baseline: initial quality distribution and affordability shares.
    pub fn setup(&mut self, store: &DwellingStore, incomes: &dyn HouseholdIncomes) {
        self.initial_quality = quality_shares(store, self.config.quality_levels);
        self.current_quality = self.initial_quality.clone();
        self.affordability = affordability_table(store, incomes, &self.config);
    }

    pub fn prepare_year(&mut self, year: i32, store: &DwellingStore, geo: &GeoData) {
        let by_cell = tally_by_type_region(store, geo);
        self.region_prices = averages_by_region(&by_cell, geo);
        self.type_region = stats_by_cell(&by_cell, geo);
        self.current_quality = quality_shares(store, self.config.quality_levels);
        info!(
            year,
            regions = self.region_prices.len(),
            dwellings = store.len(),
            "real-estate aggregates recomputed"
        );
    }

    pub fn average_price(&self, region: RegionId) -> f64 {
        self.region_prices
            .get(&region)
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    pub fn region_prices(&self) -> &BTreeMap<RegionId, f64> {
        &self.region_prices
    }

    pub fn stats(&self, dwelling_type: DwellingType, region: RegionId) -> TypeRegionStats {
        self.type_region
            .get(&(dwelling_type, region))
            .copied()
            .unwrap_or_default()
    }

    pub fn vacancy_rate(&self, dwelling_type: DwellingType, region: RegionId) -> f64 {
        self.stats(dwelling_type, region).vacancy_rate
    }

    pub fn average_price_by_type(&self, dwelling_type: DwellingType, region: RegionId) -> f64 {
        self.stats(dwelling_type, region).average_price
    }

    /// Vacant share of all dwellings in the region, 0 when it has none.
    pub fn region_vacancy_rate(&self, region: RegionId) -> f64 {
        let (total, vacant) = DwellingType::ALL
            .into_iter()
            .map(|t| self.stats(t, region))
            .fold((0, 0), |(n, v), s| (n + s.total, v + s.vacant));
        if total > 0 {
            vacant as f64 / total as f64
        } else {
            0.0
        }
    }

    pub fn quality_shares(&self) -> &[f64] {
        &self.current_quality
    }

    pub fn initial_quality_shares(&self) -> &[f64] {
        &self.initial_quality
    }

    pub fn affordability(&self) -> &AffordabilityTable {
        &self.affordability
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dwelling::Dwelling;
    use crate::geo::Zone;
    use crate::ids::{DwellingId, ZoneId};

    fn geo() -> GeoData {
        GeoData::new([
            Zone {
                id: ZoneId(1),
                region: RegionId(1),
                area_acres: 50.0,
            },
            Zone {
                id: ZoneId(2),
                region: RegionId(2),
                area_acres: 50.0,
            },
        ])
        .unwrap()
    }

    fn dwelling(id: u32, zone: u32, price: f64, quality: u8) -> Dwelling {
        Dwelling::new(
            DwellingId(id),
            ZoneId(zone),
            DwellingType::SingleFamilyDetached,
            3,
            quality,
            price,
            2000,
        )
    }

    #[test]
    fn region_prices_average_and_flag_empty_regions() {
        let store = DwellingStore::new();
        store.add(dwelling(1, 1, 100.0, 1));
        store.add(dwelling(2, 1, 200.0, 2));
        store.add(dwelling(3, 1, 300.0, 3));
        let prices = region_average_prices(&store, &geo());
        assert_eq!(prices[&RegionId(1)], 200.0);
        assert!(prices[&RegionId(2)].is_infinite() && prices[&RegionId(2)] > 0.0);
    }

    #[test]
    fn empty_region_has_zero_vacancy_for_every_type() {
        let store = DwellingStore::new();
        store.add(dwelling(1, 1, 100.0, 1));
        let table = type_region_stats(&store, &geo());
        for t in DwellingType::ALL {
            let stats = table[&(t, RegionId(2))];
            assert_eq!(stats.vacancy_rate, 0.0);
            assert_eq!(stats.average_price, 0.0);
        }
        let sfd = table[&(DwellingType::SingleFamilyDetached, RegionId(1))];
        assert_eq!(sfd.vacancy_rate, 1.0);
        assert_eq!(sfd.average_price, 100.0);
    }

    #[test]
    fn prepare_year_region_prices_agree_with_type_stats() {
        let store = DwellingStore::new();
        store.add(dwelling(1, 1, 100.0, 1));
        store.add(dwelling(2, 1, 300.0, 2));
        let mut other = dwelling(3, 1, 500.0, 2);
        other.dwelling_type = DwellingType::MobileHome;
        store.add(other);

        let mut engine = PricingEngine::new(PricingConfig::default());
        engine.prepare_year(2011, &store, &geo());

        assert_eq!(engine.average_price(RegionId(1)), 300.0);
        assert!(engine.average_price(RegionId(2)).is_infinite());
        assert_eq!(engine.region_prices(), &region_average_prices(&store, &geo()));
        let sfd = engine.stats(DwellingType::SingleFamilyDetached, RegionId(1));
        assert_eq!((sfd.total, sfd.average_price), (2, 200.0));
        assert_eq!(engine.region_vacancy_rate(RegionId(1)), 1.0);
    }

    #[test]
    fn quality_shares_sum_to_one() {
        let store = DwellingStore::new();
        for (id, quality) in [(1, 1), (2, 1), (3, 3), (4, 9)] {
            store.add(dwelling(id, 1, 100.0, quality));
        }
        let shares = quality_shares(&store, 4);
        assert_eq!(shares, vec![0.5, 0.0, 0.25, 0.25]);
        assert_eq!(quality_shares(&DwellingStore::new(), 4), vec![0.0; 4]);
    }

    #[test]
    fn affordability_rows_are_normalized_and_empty_rows_are_zero() {
        let config = PricingConfig::default();
        let store = DwellingStore::new();
        store.add(dwelling(1, 1, 450.0, 2).with_occupant(HouseholdId(1)));
        store.add(dwelling(2, 1, 650.0, 2).with_occupant(HouseholdId(2)));
        store.add(dwelling(3, 1, 99_000.0, 2).with_occupant(HouseholdId(3)));
        let incomes: HashMap<HouseholdId, f64> = [
            (HouseholdId(1), 30_000.0),
            (HouseholdId(2), 35_000.0),
            (HouseholdId(3), 120_000.0),
        ]
        .into_iter()
        .collect();

        let table = affordability_table(&store, &incomes, &config);
        assert!(table
            .distribution(IncomeCategory::Low)
            .iter()
            .all(|share| *share == 0.0));
        assert_eq!(table.share(IncomeCategory::Medium, 2), 0.5);
        assert_eq!(table.share(IncomeCategory::Medium, 3), 0.5);
        // real household plus the seeded one, both at the top category
        assert_eq!(table.share(IncomeCategory::VeryHigh, config.max_rent_category), 1.0);
        for category in IncomeCategory::ALL {
            let sum: f64 = table.distribution(category).iter().sum();
            assert!(sum == 0.0 || (sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn rent_category_is_capped() {
        let config = PricingConfig::default();
        assert_eq!(config.rent_category(0.0), 0);
        assert_eq!(config.rent_category(399.0), 1);
        assert_eq!(config.rent_category(1.0e9), config.max_rent_category);
    }
}
