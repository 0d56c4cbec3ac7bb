//! Synthetic exogenous inputs: household load, PV production and grid tariffs.

/// Double-peak household consumption generator.
pub mod load;
/// Retail grid tariff generator.
pub mod price;
/// Bell-curve photovoltaic production generator.
pub mod solar;
pub mod types;

pub use load::DoublePeakLoad;
pub use price::RetailTariff;
pub use solar::BellCurvePv;
pub use types::{LoadProvider, Matrix, PriceProvider, ProductionProvider};

use crate::config::ScenarioConfig;

/// Seed offsets keep the three generators' random streams uncorrelated.
const LOAD_SEED_OFFSET: u64 = 11;
const PV_SEED_OFFSET: u64 = 23;
const PRICE_SEED_OFFSET: u64 = 37;

/// The raw inputs that drive one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExogenousSeries {
    /// Consumption in kWh, `load[agent][step]`.
    pub load: Matrix,
    /// Production in kWh, `production[agent][step]`.
    pub production: Matrix,
    /// Installed PV capacity per agent in kW (0 = pure consumer).
    pub capacities: Vec<f64>,
    /// Grid price per step.
    pub grid_price: Vec<f64>,
    /// Constant feed-in tariff.
    pub feed_in_price: f64,
}

impl ExogenousSeries {
    /// Collects the series produced by three providers.
    pub fn from_providers(
        load: &mut impl LoadProvider,
        production: &mut impl ProductionProvider,
        price: &mut impl PriceProvider,
        agents: usize,
        steps: usize,
    ) -> Self {
        let load = load.load_kwh(agents, steps);
        let (production, capacities) = production.production_kwh(agents, steps);
        let (grid_price, feed_in_price) = price.prices(steps);
        Self {
            load,
            production,
            capacities,
            grid_price,
            feed_in_price,
        }
    }

    /// Builds the synthetic series described by `config`.
    pub fn synthetic(config: &ScenarioConfig) -> Self {
        let s = &config.simulation;

        let l = &config.load;
        let mut load = DoublePeakLoad::new(
            l.daily_energy_min_kwh,
            l.daily_energy_max_kwh,
            l.noise_std,
            s.steps_per_day,
            s.seed.wrapping_add(LOAD_SEED_OFFSET),
        );

        let sol = &config.solar;
        let mut pv = BellCurvePv::new(
            sol.capacity_max_kw,
            config.prosumer.pv_share,
            sol.peak_hour,
            sol.width_hours,
            sol.noise_std,
            (sol.day_factor_min, sol.day_factor_max),
            s.steps_per_day,
            s.seed.wrapping_add(PV_SEED_OFFSET),
        );

        let p = &config.price;
        let mut tariff = RetailTariff::new(
            p.base,
            p.amplitude,
            p.peak_hour,
            p.noise_std,
            p.floor,
            p.cap,
            p.feed_in,
            s.steps_per_day,
            s.seed.wrapping_add(PRICE_SEED_OFFSET),
        );

        Self::from_providers(&mut load, &mut pv, &mut tariff, s.agents, s.steps)
    }

    /// Number of agents covered by the series.
    pub fn agents(&self) -> usize {
        self.load.len()
    }

    /// Number of steps covered by the series.
    pub fn steps(&self) -> usize {
        self.grid_price.len()
    }

    /// Checks that every matrix and vector matches `agents × steps`.
    ///
    /// Returns a description of the first mismatch, if any.
    pub fn shape_mismatch(&self, agents: usize, steps: usize) -> Option<String> {
        if self.load.len() != agents {
            return Some(format!("load has {} rows, expected {agents}", self.load.len()));
        }
        if self.production.len() != agents {
            return Some(format!(
                "production has {} rows, expected {agents}",
                self.production.len()
            ));
        }
        if self.capacities.len() != agents {
            return Some(format!(
                "capacities has {} entries, expected {agents}",
                self.capacities.len()
            ));
        }
        if self.grid_price.len() != steps {
            return Some(format!(
                "grid price has {} steps, expected {steps}",
                self.grid_price.len()
            ));
        }
        let short_row = self
            .load
            .iter()
            .chain(&self.production)
            .position(|row| row.len() != steps);
        short_row.map(|i| format!("row {i} does not have {steps} steps"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_series_matches_config_shape() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.agents = 8;
        cfg.simulation.steps = 30;
        let series = ExogenousSeries::synthetic(&cfg);
        assert_eq!(series.agents(), 8);
        assert_eq!(series.steps(), 30);
        assert_eq!(series.shape_mismatch(8, 30), None);
        assert_eq!(series.feed_in_price, cfg.price.feed_in);
    }

    #[test]
    fn synthetic_series_is_seed_deterministic() {
        let cfg = ScenarioConfig::baseline();
        assert_eq!(ExogenousSeries::synthetic(&cfg), ExogenousSeries::synthetic(&cfg));

        let mut other = cfg.clone();
        other.simulation.seed += 1;
        assert_ne!(
            ExogenousSeries::synthetic(&cfg).load,
            ExogenousSeries::synthetic(&other).load
        );
    }

    #[test]
    fn shape_mismatch_reports_wrong_dimensions() {
        let cfg = ScenarioConfig::baseline();
        let series = ExogenousSeries::synthetic(&cfg);
        assert!(series.shape_mismatch(99, 24).is_some());
        assert!(series.shape_mismatch(100, 25).is_some());
    }
}
