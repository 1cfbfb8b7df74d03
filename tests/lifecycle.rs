use landmarket::{
    engine::{EngineBuilder, Phase},
    ids::{DwellingId, JobId, RegionId, ZoneId},
    scenario::{Scenario, ScenarioLoader},
    snapshot::load_snapshot,
    systems::{LaborMarketSystem, PricingSystem, RealEstateSystem},
    world::World,
};
use tempfile::tempdir;

fn scenario() -> Scenario {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/small_county.yaml")
        .unwrap()
}

fn build_engine(scenario: &Scenario, dir: &std::path::Path, interval: u32) -> EngineBuilder {
    EngineBuilder::new(scenario.engine_settings(dir, Some(interval)))
        .with_system(RealEstateSystem::new(scenario.systems.real_estate.clone()))
        .with_system(LaborMarketSystem::new(scenario.systems.labor.clone()))
        .with_system(PricingSystem::new(scenario.systems.pricing.clone()))
}

fn assert_indices_match_stock(world: &World) {
    let dwellings: Vec<(DwellingId, bool)> = world
        .real_estate
        .dwellings()
        .values()
        .map(|d| (d.id(), d.occupant.is_vacant()))
        .collect();
    for (id, vacant) in &dwellings {
        assert_eq!(
            world.real_estate.is_listed_vacant(*id),
            *vacant,
            "dwelling {id} listing disagrees with occupancy"
        );
    }
    let vacant_dwellings = dwellings.iter().filter(|(_, vacant)| *vacant).count();
    assert_eq!(world.vacant_dwellings(), vacant_dwellings);

    let jobs: Vec<(JobId, bool)> = world
        .labor
        .jobs()
        .values()
        .map(|j| (j.id(), j.worker.is_vacant()))
        .collect();
    for (id, vacant) in &jobs {
        assert_eq!(
            world.labor.is_listed_vacant(*id),
            *vacant,
            "job {id} listing disagrees with worker"
        );
    }
    let vacant_jobs = jobs.iter().filter(|(_, vacant)| *vacant).count();
    assert_eq!(world.vacant_jobs(), vacant_jobs);
}

#[test]
fn phases_must_run_in_order() {
    let scenario = scenario();
    let mut world = scenario.build_world().unwrap();
    let temp = tempdir().unwrap();
    let mut engine = build_engine(&scenario, temp.path(), 0).build();

    assert!(engine.prepare_year(&mut world).is_err());
    assert!(engine.run_year(&mut world).is_err());

    engine.setup(&mut world).unwrap();
    assert!(engine.setup(&mut world).is_err());
    assert!(engine.run_year(&mut world).is_err());
    assert!(engine.end_year(&mut world).is_err());

    engine.prepare_year(&mut world).unwrap();
    assert_eq!(engine.phase(), Phase::YearPrepared(2011));
    assert!(engine.end_simulation(&mut world).is_err());
    engine.run_year(&mut world).unwrap();
    engine.end_year(&mut world).unwrap();
    assert_eq!(world.year(), 2012);

    engine.end_simulation(&mut world).unwrap();
    assert_eq!(engine.phase(), Phase::Finished);
}

#[test]
fn setup_rejects_invalid_turnover_rates() {
    let scenario = scenario();
    let mut world = scenario.build_world().unwrap();
    let temp = tempdir().unwrap();
    let mut labor = scenario.systems.labor.clone();
    labor.quit_rate = f64::NAN;
    let mut engine = EngineBuilder::new(scenario.engine_settings(temp.path(), Some(0)))
        .with_system(LaborMarketSystem::new(labor))
        .build();

    assert!(engine.setup(&mut world).is_err());
    assert_eq!(engine.phase(), Phase::Created);
}

#[test]
fn vacancy_indices_track_the_stock_every_year() {
    let scenario = scenario();
    let mut world = scenario.build_world().unwrap();
    let temp = tempdir().unwrap();
    let mut engine = build_engine(&scenario, temp.path(), 0).build();

    engine.setup(&mut world).unwrap();
    assert_indices_match_stock(&world);
    for _ in 0..8 {
        engine.step(&mut world).unwrap();
        assert_indices_match_stock(&world);
    }
}

#[test]
fn same_seed_reproduces_the_run() {
    let scenario = scenario();
    let temp = tempdir().unwrap();

    let run = || {
        let mut world = scenario.build_world().unwrap();
        let mut engine = build_engine(&scenario, temp.path(), 0).build();
        engine.run(&mut world, 5).unwrap();
        world.snapshot(&scenario.name)
    };
    let a = run();
    let b = run();

    assert_eq!(a.dwellings.len(), b.dwellings.len());
    for (x, y) in a.dwellings.iter().zip(&b.dwellings) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.household, y.household);
        assert!((x.price - y.price).abs() <= 1e-6 * x.price.abs().max(1.0));
    }
    let workers_a: Vec<_> = a.jobs.iter().map(|j| (j.id, j.worker)).collect();
    let workers_b: Vec<_> = b.jobs.iter().map(|j| (j.id, j.worker)).collect();
    assert_eq!(workers_a, workers_b);
}

#[test]
fn snapshots_follow_the_interval() {
    let scenario = scenario();
    let mut world = scenario.build_world().unwrap();
    let temp = tempdir().unwrap();
    let mut engine = build_engine(&scenario, temp.path(), 5).build();

    let mut written = Vec::new();
    let final_path = engine
        .run_with_hook(&mut world, 10, |summary| {
            if let Some(path) = &summary.snapshot_path {
                written.push((summary.year, path.clone()));
            }
        })
        .unwrap();

    let dir = temp.path().join("small_county");
    assert_eq!(
        written,
        vec![
            (2015, dir.join("year_2015.json")),
            (2020, dir.join("year_2020.json")),
        ]
    );
    assert_eq!(final_path, dir.join("final.json"));

    let last = load_snapshot(&final_path).unwrap();
    assert_eq!(last.metadata.scenario, "small_county");
    assert_eq!(last.metadata.year, 2021);
    assert_eq!(last.world.dwellings.len(), world.real_estate.dwelling_count());
    assert_eq!(last.world.jobs.len(), world.labor.job_count());
    assert_eq!(last.world.initial_quality_shares.len(), 4);
    let sum: f64 = last.world.quality_shares.iter().sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

#[test]
fn region_without_dwellings_has_no_average_price() {
    let scenario = scenario();
    let mut world = scenario.build_world().unwrap();
    world.setup();
    world.prepare_year();

    let pricing = world.real_estate.pricing();
    assert!(pricing.average_price(RegionId(3)).is_infinite());
    assert!(pricing.average_price(RegionId(1)).is_finite());
    assert_eq!(pricing.region_vacancy_rate(RegionId(3)), 0.0);

    let snapshot = world.snapshot(&scenario.name);
    let empty = snapshot
        .regions
        .iter()
        .find(|r| r.id == RegionId(3))
        .unwrap();
    assert_eq!(empty.average_price, None);
    assert!(empty.vacant_jobs > 0);
}

#[test]
fn tight_core_gets_new_construction() {
    let scenario = scenario();
    let mut world = scenario.build_world().unwrap();
    let initial = world.real_estate.dwelling_count();
    let temp = tempdir().unwrap();
    let mut engine = build_engine(&scenario, temp.path(), 0).build();

    engine.setup(&mut world).unwrap();
    engine.step(&mut world).unwrap();

    assert!(world.real_estate.dwelling_count() > initial);
    assert!(world.development.available_capacity(ZoneId(1)) < 10.0);
    assert_eq!(world.development.available_capacity(ZoneId(5)), 0.0);
    let new_zones: Vec<ZoneId> = world
        .real_estate
        .dwellings()
        .values()
        .filter(|d| d.year_built == 2011)
        .map(|d| d.zone())
        .collect();
    assert!(!new_zones.is_empty());
    assert!(new_zones.contains(&ZoneId(1)));
}
