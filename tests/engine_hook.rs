use landmarket::{
    engine::EngineBuilder,
    scenario::ScenarioLoader,
    systems::{LaborMarketSystem, PricingSystem, RealEstateSystem},
};
use tempfile::tempdir;

#[test]
fn engine_runs_hook_each_year() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader
        .load("scenarios/small_county.yaml")
        .expect("scenario should load");
    let mut world = scenario.build_world().expect("world builds");
    let temp = tempdir().expect("tempdir");
    let settings = scenario.engine_settings(temp.path(), Some(0));
    let mut engine = EngineBuilder::new(settings)
        .with_system(RealEstateSystem::new(scenario.systems.real_estate.clone()))
        .with_system(LaborMarketSystem::new(scenario.systems.labor.clone()))
        .with_system(PricingSystem::new(scenario.systems.pricing.clone()))
        .build();

    let mut years = Vec::new();
    let mut system_names = Vec::new();
    engine
        .run_with_hook(&mut world, 6, |summary| {
            years.push(summary.year);
            system_names = summary
                .system_reports
                .iter()
                .map(|r| r.name.clone())
                .collect();
            assert!(summary.snapshot_path.is_none());
        })
        .expect("run succeeds");

    assert_eq!(years, vec![2011, 2012, 2013, 2014, 2015, 2016]);
    assert_eq!(system_names, vec!["real-estate", "labor-market", "pricing"]);
    assert_eq!(world.year(), 2017);
}
