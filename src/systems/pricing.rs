use anyhow::Result;
use serde::Deserialize;
use tracing::info;

use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    world::World,
};

fn default_slope() -> f64 {
    2.0
}

fn default_max_change() -> f64 {
    0.1
}

fn default_min_price() -> f64 {
    50.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingSystemConfig {
    /// Relative price change per point of vacancy below the structural rate.
    #[serde(default = "default_slope")]
    pub slope: f64,
    #[serde(default = "default_max_change")]
    pub max_change: f64,
    #[serde(default = "default_min_price")]
    pub min_price: f64,
}

impl Default for PricingSystemConfig {
    fn default() -> Self {
        Self {
            slope: default_slope(),
            max_change: default_max_change(),
            min_price: default_min_price(),
        }
    }
}

/// Moves every price toward the level where its type and region would sit at
/// the structural vacancy rate. Reads the aggregates from the last
/// `prepare_year`.
pub struct PricingSystem {
    config: PricingSystemConfig,
}

impl PricingSystem {
    pub fn new(config: PricingSystemConfig) -> Self {
        Self { config }
    }
}

impl Default for PricingSystem {
    fn default() -> Self {
        Self::new(PricingSystemConfig::default())
    }
}

impl System for PricingSystem {
    fn name(&self) -> &str {
        "pricing"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let geo = world.geo();
        let market = &world.real_estate;
        let pricing = market.pricing();
        let mut raised = 0usize;
        let mut lowered = 0usize;
        market.update_prices(|d| {
            let Some(region) = geo.region_of(d.zone()) else {
                return d.price;
            };
            let next = adjust_price(
                d.price,
                d.dwelling_type.structural_vacancy(),
                pricing.vacancy_rate(d.dwelling_type, region),
                &self.config,
            );
            if next > d.price {
                raised += 1;
            } else if next < d.price {
                lowered += 1;
            }
            next
        });
        info!(year = ctx.year, raised, lowered, "dwelling prices adjusted");
        Ok(())
    }
}

fn adjust_price(price: f64, structural: f64, vacancy: f64, config: &PricingSystemConfig) -> f64 {
    let change = (config.slope * (structural - vacancy)).clamp(-config.max_change, config.max_change);
    (price * (1.0 + change)).max(config.min_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tight_market_raises_prices() {
        let config = PricingSystemConfig::default();
        let next = adjust_price(1000.0, 0.05, 0.0, &config);
        assert!((next - 1100.0).abs() < 1e-9);
    }

    #[test]
    fn slack_market_lowers_prices_within_bound() {
        let config = PricingSystemConfig::default();
        let next = adjust_price(1000.0, 0.05, 0.5, &config);
        assert!((next - 900.0).abs() < 1e-9);
        let small = adjust_price(1000.0, 0.05, 0.06, &config);
        assert!((small - 980.0).abs() < 1e-9);
    }

    #[test]
    fn balanced_market_holds_price() {
        let config = PricingSystemConfig::default();
        assert_eq!(adjust_price(750.0, 0.03, 0.03, &config), 750.0);
    }

    #[test]
    fn price_never_drops_below_floor() {
        let config = PricingSystemConfig::default();
        assert_eq!(adjust_price(52.0, 0.01, 1.0, &config), 50.0);
    }
}
