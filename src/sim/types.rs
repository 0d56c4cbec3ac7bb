//! Step statistics, run output and simulation errors.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::ledger::{Ledger, LedgerError};
use crate::market::MarketError;
use crate::profiles::ExogenousSeries;
use crate::prosumer::Prosumer;
use crate::regulator::RegulationSummary;

/// Guards the p2p share against an empty step.
pub const SHARE_EPSILON: f64 = 1e-6;

/// Community-level aggregates of one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepStats {
    /// Step index.
    pub step: usize,
    /// Consumption of all agents (kWh).
    pub total_load: f64,
    /// Production of all agents with generation capacity (kWh).
    pub total_production: f64,
    /// Energy cleared peer-to-peer (kWh).
    pub p2p_energy: f64,
    /// Energy cleared in the local market (kWh).
    pub local_energy: f64,
    /// Energy bought from the grid (kWh).
    pub grid_import: f64,
    /// Energy sold to the grid (kWh).
    pub grid_export: f64,
    /// Sum of all balances after settlement.
    pub community_profit: f64,
    /// `p2p / (p2p + local + ε)`.
    pub p2p_share: f64,
    /// Regulator objective for this step.
    pub objective_value: f64,
    pub p2p_trades: usize,
    pub local_trades: usize,
    /// Regulator actions taken at the end of the step.
    pub regulation: RegulationSummary,
}

/// Selects one per-step series of [`StepStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TotalLoad,
    TotalProduction,
    P2pEnergy,
    LocalEnergy,
    GridImport,
    GridExport,
    CommunityProfit,
    P2pShare,
    ObjectiveValue,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::TotalLoad,
        Metric::TotalProduction,
        Metric::P2pEnergy,
        Metric::LocalEnergy,
        Metric::GridImport,
        Metric::GridExport,
        Metric::CommunityProfit,
        Metric::P2pShare,
        Metric::ObjectiveValue,
    ];

    /// Snake-case name of the series.
    pub fn name(self) -> &'static str {
        match self {
            Metric::TotalLoad => "total_load",
            Metric::TotalProduction => "total_production",
            Metric::P2pEnergy => "p2p_energy",
            Metric::LocalEnergy => "local_energy",
            Metric::GridImport => "grid_import",
            Metric::GridExport => "grid_export",
            Metric::CommunityProfit => "community_profit",
            Metric::P2pShare => "p2p_share",
            Metric::ObjectiveValue => "objective_value",
        }
    }
}

impl StepStats {
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::TotalLoad => self.total_load,
            Metric::TotalProduction => self.total_production,
            Metric::P2pEnergy => self.p2p_energy,
            Metric::LocalEnergy => self.local_energy,
            Metric::GridImport => self.grid_import,
            Metric::GridExport => self.grid_export,
            Metric::CommunityProfit => self.community_profit,
            Metric::P2pShare => self.p2p_share,
            Metric::ObjectiveValue => self.objective_value,
        }
    }
}

impl fmt::Display for StepStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>3} | load={:>7.2} pv={:>7.2} kWh | p2p={:>6.2} ({}) local={:>6.2} ({}) | \
             import={:>7.2} export={:>7.2} | share={:.3} profit={:>9.2} | \
             rewarded={} fined={} suspended={}",
            self.step,
            self.total_load,
            self.total_production,
            self.p2p_energy,
            self.p2p_trades,
            self.local_energy,
            self.local_trades,
            self.grid_import,
            self.grid_export,
            self.p2p_share,
            self.community_profit,
            self.regulation.rewarded,
            self.regulation.punished,
            self.regulation.suspended,
        )
    }
}

/// Everything a completed run produces.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    /// One entry per step, in order.
    pub history: Vec<StepStats>,
    /// Final chain: genesis plus one block per step.
    pub ledger: Ledger,
    /// The exogenous series the run consumed.
    pub inputs: ExogenousSeries,
    /// Final agent states.
    pub prosumers: Vec<Prosumer>,
}

impl SimulationOutput {
    /// Per-step values of `metric`.
    pub fn series(&self, metric: Metric) -> Vec<f64> {
        self.history.iter().map(|s| s.metric(metric)).collect()
    }
}

/// Errors that abort a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("market: {0}")]
    Market(#[from] MarketError),
    #[error("input series do not match the configuration: {0}")]
    InputShape(String),
    #[error("step {step} is outside the {steps}-step horizon")]
    StepOutOfRange { step: usize, steps: usize },
    #[error("step {step} requested but step {expected} is next")]
    StepOutOfOrder { step: usize, expected: usize },
}
