use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use landmarket::{
    engine::EngineBuilder,
    scenario::ScenarioLoader,
    systems::{LaborMarketSystem, PricingSystem, RealEstateSystem},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Real-estate and labor market runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/small_county.yaml")]
    scenario: PathBuf,

    /// Override the number of simulated years
    #[arg(long)]
    years: Option<u32>,

    /// Override snapshot interval in years (0 disables periodic snapshots)
    #[arg(long)]
    snapshot_interval: Option<u32>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&scenario.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut world = scenario.build_world()?;
    let years = scenario.years(cli.years);
    let snapshot_dir = cli
        .snapshot_dir
        .unwrap_or_else(|| PathBuf::from("snapshots"));
    let settings = scenario.engine_settings(snapshot_dir, cli.snapshot_interval);

    let mut engine = EngineBuilder::new(settings)
        .with_system(RealEstateSystem::new(scenario.systems.real_estate.clone()))
        .with_system(LaborMarketSystem::new(scenario.systems.labor.clone()))
        .with_system(PricingSystem::new(scenario.systems.pricing.clone()))
        .build();

    let final_snapshot = engine.run(&mut world, years)?;
    println!(
        "Scenario '{}' completed for {} years ({} dwellings, {} vacant). Final snapshot: {}",
        scenario.name,
        years,
        world.real_estate.dwelling_count(),
        world.vacant_dwellings(),
        final_snapshot.display()
    );
    Ok(())
}
