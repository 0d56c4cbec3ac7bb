//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::ledger::{MAX_DIFFICULTY, MIN_VALIDATORS};
use crate::regulator::{Objective, UnderParticipation};

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Population, horizon and seed.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Behavioural defaults of every prosumer.
    #[serde(default)]
    pub prosumer: ProsumerConfig,
    /// Synthetic household load parameters.
    #[serde(default)]
    pub load: LoadConfig,
    /// Synthetic PV production parameters.
    #[serde(default)]
    pub solar: SolarConfig,
    /// Synthetic grid tariff parameters.
    #[serde(default)]
    pub price: PriceConfig,
    /// Regulator incentive policy.
    #[serde(default)]
    pub regulator: RegulatorConfig,
    /// Proof-of-work ledger parameters.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Population, horizon and seed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of prosumers in the community (must be > 0).
    pub agents: usize,
    /// Number of simulated steps (must be > 0).
    pub steps: usize,
    /// Steps per simulated day; sets the daily profile resolution (must be > 0).
    pub steps_per_day: usize,
    /// Master random seed.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            agents: 100,
            steps: 24,
            steps_per_day: 24,
            seed: 42,
        }
    }
}

/// Behavioural defaults of every prosumer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProsumerConfig {
    /// Fraction of agents (0.0–1.0) with generation capacity.
    pub pv_share: f64,
    /// Initial trade propensity: fraction of the imbalance offered to the market.
    pub trade_fraction: f64,
    /// Seller price as a multiple of the grid price (0.0 exclusive – 1.0).
    pub undercut_factor: f64,
    /// Smallest imbalance or order quantity worth trading (kWh).
    pub min_trade_kwh: f64,
    /// Optional cap on a single order's quantity (kWh).
    pub max_offer_kwh: Option<f64>,
}

impl Default for ProsumerConfig {
    fn default() -> Self {
        Self {
            pv_share: 0.7,
            trade_fraction: 0.75,
            undercut_factor: 0.9,
            min_trade_kwh: 1e-3,
            max_offer_kwh: None,
        }
    }
}

/// Synthetic household load parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Lower bound of an agent's average daily consumption (kWh).
    pub daily_energy_min_kwh: f64,
    /// Upper bound of an agent's average daily consumption (kWh).
    pub daily_energy_max_kwh: f64,
    /// Per-step multiplicative noise standard deviation.
    pub noise_std: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            daily_energy_min_kwh: 8.0,
            daily_energy_max_kwh: 25.0,
            noise_std: 0.15,
        }
    }
}

/// Synthetic PV production parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarConfig {
    /// Upper bound of installed capacity per generating agent (kW).
    pub capacity_max_kw: f64,
    /// Hour of peak irradiance.
    pub peak_hour: f64,
    /// Bell width in hours.
    pub width_hours: f64,
    /// Per-step multiplicative noise standard deviation.
    pub noise_std: f64,
    /// Lower bound of the daily weather factor.
    pub day_factor_min: f64,
    /// Upper bound of the daily weather factor.
    pub day_factor_max: f64,
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self {
            capacity_max_kw: 10.0,
            peak_hour: 12.0,
            width_hours: 3.0,
            noise_std: 0.05,
            day_factor_min: 0.8,
            day_factor_max: 1.2,
        }
    }
}

/// Synthetic grid tariff parameters (currency per kWh).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriceConfig {
    /// Off-peak grid price.
    pub base: f64,
    /// Peak surcharge.
    pub amplitude: f64,
    /// Hour of the most expensive tariff.
    pub peak_hour: f64,
    /// Additive noise standard deviation.
    pub noise_std: f64,
    /// Lowest admissible grid price.
    pub floor: f64,
    /// Highest admissible grid price.
    pub cap: f64,
    /// Constant feed-in tariff paid for exports.
    pub feed_in: f64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            base: 0.20,
            amplitude: 0.10,
            peak_hour: 19.0,
            noise_std: 0.01,
            floor: 0.12,
            cap: 0.45,
            feed_in: 0.08,
        }
    }
}

/// Regulator incentive policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegulatorConfig {
    /// System objective reported each step.
    pub objective: Objective,
    /// What happens to agents below `punish_threshold`.
    pub under_participation: UnderParticipation,
    /// Participation ratio below which an agent is punished.
    pub punish_threshold: f64,
    /// Participation ratio from which the medium reward applies.
    pub silver_threshold: f64,
    /// Participation ratio from which the largest reward applies.
    pub gold_threshold: f64,
    /// Monetary fine for under-participation.
    pub fine: f64,
    /// Propensity increase applied together with the fine.
    pub punish_propensity_step: f64,
    /// Reward for `punish_threshold <= ratio < silver_threshold`.
    pub bronze_reward: f64,
    /// Propensity increase in the bronze tier.
    pub bronze_propensity_step: f64,
    /// Reward for `silver_threshold <= ratio < gold_threshold`.
    pub silver_reward: f64,
    /// Propensity increase in the silver tier.
    pub silver_propensity_step: f64,
    /// Reward for `ratio >= gold_threshold`.
    pub gold_reward: f64,
    /// Propensity increase in the gold tier.
    pub gold_propensity_step: f64,
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        Self {
            objective: Objective::MaximizeP2p,
            under_participation: UnderParticipation::Fine,
            punish_threshold: 0.1,
            silver_threshold: 0.5,
            gold_threshold: 0.8,
            fine: 0.1,
            punish_propensity_step: 0.1,
            bronze_reward: 0.05,
            bronze_propensity_step: 0.05,
            silver_reward: 0.1,
            silver_propensity_step: 0.03,
            gold_reward: 0.2,
            gold_propensity_step: 0.01,
        }
    }
}

/// Proof-of-work ledger parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Required number of leading `0` hex characters in a block fingerprint.
    pub difficulty: usize,
    /// Size of the validator pool (must be >= 10).
    pub validators: u32,
    /// Timestamp of the genesis block (seconds since the Unix epoch).
    pub genesis_timestamp: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: 3,
            validators: 10,
            genesis_timestamp: 1_700_000_000,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("config error: {field} — {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.agents"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario: 100 agents over one hourly day.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the high-solar preset: most households generate, with larger arrays.
    pub fn high_solar() -> Self {
        Self {
            prosumer: ProsumerConfig {
                pv_share: 0.9,
                ..ProsumerConfig::default()
            },
            solar: SolarConfig {
                capacity_max_kw: 14.0,
                width_hours: 3.5,
                ..SolarConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the strict-regulator preset: higher thresholds, harsher fines,
    /// and a shy initial trading propensity.
    pub fn strict_regulator() -> Self {
        Self {
            prosumer: ProsumerConfig {
                trade_fraction: 0.3,
                ..ProsumerConfig::default()
            },
            regulator: RegulatorConfig {
                punish_threshold: 0.4,
                silver_threshold: 0.7,
                gold_threshold: 0.9,
                fine: 0.5,
                punish_propensity_step: 0.2,
                ..RegulatorConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "high_solar", "strict_regulator"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "high_solar" => Ok(Self::high_solar()),
            "strict_regulator" => Ok(Self::strict_regulator()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let s = &self.simulation;
        if s.agents == 0 {
            errors.push(ConfigError::new("simulation.agents", "must be > 0"));
        }
        if s.steps == 0 {
            errors.push(ConfigError::new("simulation.steps", "must be > 0"));
        }
        if s.steps_per_day == 0 {
            errors.push(ConfigError::new("simulation.steps_per_day", "must be > 0"));
        }

        let p = &self.prosumer;
        if !(0.0..=1.0).contains(&p.pv_share) {
            errors.push(ConfigError::new("prosumer.pv_share", "must be in [0.0, 1.0]"));
        }
        if !(0.0..=1.0).contains(&p.trade_fraction) {
            errors.push(ConfigError::new(
                "prosumer.trade_fraction",
                "must be in [0.0, 1.0]",
            ));
        }
        if p.undercut_factor <= 0.0 || p.undercut_factor > 1.0 {
            errors.push(ConfigError::new(
                "prosumer.undercut_factor",
                "must be in (0.0, 1.0]",
            ));
        }
        if p.min_trade_kwh < 0.0 {
            errors.push(ConfigError::new("prosumer.min_trade_kwh", "must be >= 0"));
        }
        if p.max_offer_kwh.is_some_and(|cap| cap < 0.0) {
            errors.push(ConfigError::new("prosumer.max_offer_kwh", "must be >= 0"));
        }

        let l = &self.load;
        if l.daily_energy_min_kwh < 0.0 {
            errors.push(ConfigError::new("load.daily_energy_min_kwh", "must be >= 0"));
        }
        if l.daily_energy_min_kwh > l.daily_energy_max_kwh {
            errors.push(ConfigError::new(
                "load.daily_energy_min_kwh",
                "must be <= load.daily_energy_max_kwh",
            ));
        }

        let sol = &self.solar;
        if sol.capacity_max_kw < 0.0 {
            errors.push(ConfigError::new("solar.capacity_max_kw", "must be >= 0"));
        }
        if sol.width_hours <= 0.0 {
            errors.push(ConfigError::new("solar.width_hours", "must be > 0"));
        }
        if sol.day_factor_min > sol.day_factor_max {
            errors.push(ConfigError::new(
                "solar.day_factor_min",
                "must be <= solar.day_factor_max",
            ));
        }

        let pr = &self.price;
        if pr.floor < 0.0 {
            errors.push(ConfigError::new("price.floor", "must be >= 0"));
        }
        if pr.floor >= pr.cap {
            errors.push(ConfigError::new("price.floor", "must be < price.cap"));
        }
        if pr.feed_in < 0.0 {
            errors.push(ConfigError::new("price.feed_in", "must be >= 0"));
        }

        let r = &self.regulator;
        if !(0.0 <= r.punish_threshold
            && r.punish_threshold <= r.silver_threshold
            && r.silver_threshold <= r.gold_threshold)
        {
            errors.push(ConfigError::new(
                "regulator.punish_threshold",
                "thresholds must satisfy 0 <= punish <= silver <= gold",
            ));
        }
        if r.fine < 0.0 {
            errors.push(ConfigError::new("regulator.fine", "must be >= 0"));
        }
        for (field, value) in [
            ("regulator.punish_propensity_step", r.punish_propensity_step),
            ("regulator.bronze_propensity_step", r.bronze_propensity_step),
            ("regulator.silver_propensity_step", r.silver_propensity_step),
            ("regulator.gold_propensity_step", r.gold_propensity_step),
            ("regulator.bronze_reward", r.bronze_reward),
            ("regulator.silver_reward", r.silver_reward),
            ("regulator.gold_reward", r.gold_reward),
        ] {
            if value < 0.0 {
                errors.push(ConfigError::new(field, "must be >= 0"));
            }
        }

        let led = &self.ledger;
        if (led.validators as usize) < MIN_VALIDATORS {
            errors.push(ConfigError::new(
                "ledger.validators",
                format!("must be >= {MIN_VALIDATORS}"),
            ));
        }
        if led.difficulty > MAX_DIFFICULTY {
            errors.push(ConfigError::new(
                "ledger.difficulty",
                format!("must be <= {MAX_DIFFICULTY}"),
            ));
        }

        errors
    }
}
