mod labor;
mod pricing;
mod real_estate;

pub use labor::{LaborMarketConfig, LaborMarketSystem, TurnoverStats};
pub use pricing::{PricingSystem, PricingSystemConfig};
pub use real_estate::{RealEstateConfig, RealEstateSystem, RelocationStats};
