pub mod dwelling;
pub mod engine;
pub mod error;
pub mod geo;
pub mod ids;
pub mod job;
pub mod land;
pub mod market;
pub mod pricing;
pub mod rng;
pub mod sampler;
pub mod scenario;
pub mod snapshot;
pub mod store;
pub mod systems;
pub mod travel;
pub mod vacancy;
pub mod world;

pub use engine::{Engine, EngineBuilder, EngineSettings, YearSummary};
pub use scenario::Scenario;
pub use world::World;
