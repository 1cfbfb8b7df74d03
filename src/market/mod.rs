mod labor;
mod real_estate;

pub use labor::LaborMarket;
pub use real_estate::RealEstateMarket;
