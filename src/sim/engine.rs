//! Simulation loop wiring agents, markets, regulator and ledger.

use tracing::{debug, info};

use crate::config::ScenarioConfig;
use crate::ledger::{BlockClock, Ledger};
use crate::market::{OrderBook, match_local, match_orders};
use crate::profiles::ExogenousSeries;
use crate::prosumer::{GridSettlement, OfferRules, Prosumer, Role};
use crate::regulator::{CommunityBalance, Regulator};

use super::types::{SHARE_EPSILON, SimError, SimulationOutput, StepStats};

/// Offset of the validator-selection stream from the master seed.
const VALIDATOR_SEED_OFFSET: u64 = 53;
const SECONDS_PER_DAY: u64 = 86_400;

/// One simulation run: agents, policy, ledger and accumulated history.
///
/// Every phase of a step reads and writes only this value, so independent
/// runs can coexist in one process.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: ScenarioConfig,
    inputs: ExogenousSeries,
    prosumers: Vec<Prosumer>,
    regulator: Regulator,
    ledger: Ledger,
    rules: OfferRules,
    history: Vec<StepStats>,
}

impl Simulation {
    /// Builds a run over synthetic inputs generated from `config`.
    ///
    /// # Errors
    ///
    /// Returns the first configuration violation, or a ledger error.
    pub fn new(config: &ScenarioConfig) -> Result<Self, SimError> {
        check_config(config)?;
        Self::with_inputs(config, ExogenousSeries::synthetic(config))
    }

    /// Builds a run over externally supplied inputs.
    ///
    /// The series must cover `simulation.agents` agents and
    /// `simulation.steps` steps. Agents with a positive installed capacity
    /// own generation.
    pub fn with_inputs(config: &ScenarioConfig, inputs: ExogenousSeries) -> Result<Self, SimError> {
        check_config(config)?;
        let s = &config.simulation;
        if let Some(mismatch) = inputs.shape_mismatch(s.agents, s.steps) {
            return Err(SimError::InputShape(mismatch));
        }

        let p = &config.prosumer;
        let prosumers = inputs
            .capacities
            .iter()
            .enumerate()
            .map(|(id, &capacity)| {
                Prosumer::new(id, capacity > 0.0).with_behaviour(p.trade_fraction, p.undercut_factor)
            })
            .collect();

        let l = &config.ledger;
        let clock = BlockClock::Simulated {
            start: l.genesis_timestamp,
            step_secs: SECONDS_PER_DAY / s.steps_per_day as u64,
        };
        let ledger = Ledger::new(
            l.difficulty,
            (0..l.validators).collect(),
            s.seed.wrapping_add(VALIDATOR_SEED_OFFSET),
            clock,
        )?;

        Ok(Self {
            config: config.clone(),
            inputs,
            prosumers,
            regulator: Regulator::from_config(&config.regulator),
            ledger,
            rules: OfferRules {
                min_trade_kwh: p.min_trade_kwh,
                max_offer_kwh: p.max_offer_kwh,
            },
            history: Vec::with_capacity(s.steps),
        })
    }

    /// Executes step `t` and records its statistics.
    ///
    /// Phases run in a fixed order: self-balance and offers, p2p round,
    /// local round on the p2p leftovers, trade settlement, grid settlement,
    /// statistics and objective, regulator, ledger commit.
    ///
    /// Steps run in order, once each: `t` must equal the number of steps
    /// already executed.
    pub fn step(&mut self, t: usize) -> Result<StepStats, SimError> {
        let steps = self.inputs.steps();
        if t >= steps {
            return Err(SimError::StepOutOfRange { step: t, steps });
        }
        let expected = self.history.len();
        if t != expected {
            return Err(SimError::StepOutOfOrder { step: t, expected });
        }
        let grid_price = self.inputs.grid_price[t];
        let feed_in_price = self.inputs.feed_in_price;
        let n = self.prosumers.len();

        // 1. Self-balance and offers
        let mut book = OrderBook::default();
        let mut imbalances = Vec::with_capacity(n);
        let mut total_load = 0.0;
        let mut total_production = 0.0;
        for p in &mut self.prosumers {
            let load = self.inputs.load[p.id][t];
            let production = if p.has_pv {
                self.inputs.production[p.id][t]
            } else {
                0.0
            };
            total_load += load;
            total_production += production;

            let imbalance = p.self_balance(load, production);
            imbalances.push(imbalance);
            book.push(p.id, &p.decide_offer(imbalance, grid_price, &self.rules));
        }

        // 2. Markets
        let p2p = match_orders(&book.asks, &book.bids)?;
        let local = match_local(&p2p.leftover_asks, &p2p.leftover_bids, grid_price)?;

        // 3. Trade settlement; net_sold is positive for net sellers
        let mut net_sold = vec![0.0; n];
        for trade in p2p.trades.iter().chain(&local.trades) {
            self.prosumers[trade.seller].apply_trade_result(Role::Seller, trade.quantity, trade.price);
            self.prosumers[trade.buyer].apply_trade_result(Role::Buyer, trade.quantity, trade.price);
            net_sold[trade.seller] += trade.quantity;
            net_sold[trade.buyer] -= trade.quantity;
        }

        // 4. Grid settlement
        let mut grid = GridSettlement::default();
        for ((p, imbalance), sold) in self.prosumers.iter_mut().zip(&imbalances).zip(&net_sold) {
            let settled = p.settle_with_grid(imbalance - sold, grid_price, feed_in_price);
            grid.import_kwh += settled.import_kwh;
            grid.export_kwh += settled.export_kwh;
        }

        // 5. Statistics
        let p2p_energy = p2p.volume();
        let local_energy = local.volume();
        let mut stats = StepStats {
            step: t,
            total_load,
            total_production,
            p2p_energy,
            local_energy,
            grid_import: grid.import_kwh,
            grid_export: grid.export_kwh,
            community_profit: self.prosumers.iter().map(|p| p.balance).sum(),
            p2p_share: p2p_energy / (p2p_energy + local_energy + SHARE_EPSILON),
            objective_value: 0.0,
            p2p_trades: p2p.trades.len(),
            local_trades: local.trades.len(),
            regulation: Default::default(),
        };

        // 6. Regulator
        stats.objective_value = self.regulator.evaluate_objective(&stats);
        let community = CommunityBalance::from_imbalances(&imbalances);
        stats.regulation = self.regulator.apply_rules(&mut self.prosumers, community);

        // 7. Ledger
        let mut trades = p2p.trades;
        trades.extend(local.trades);
        let block = self.ledger.mine_block(trades)?;

        debug!(
            step = t,
            load = total_load,
            production = total_production,
            p2p = p2p_energy,
            local = local_energy,
            import = stats.grid_import,
            export = stats.grid_export,
            block = block.index,
            "step complete"
        );

        self.history.push(stats.clone());
        Ok(stats)
    }

    /// Runs every remaining step and returns the output bundle.
    pub fn run(mut self) -> Result<SimulationOutput, SimError> {
        let steps = self.inputs.steps();
        info!(
            agents = self.prosumers.len(),
            steps,
            difficulty = self.ledger.difficulty(),
            seed = self.config.simulation.seed,
            "simulation started"
        );

        for t in self.history.len()..steps {
            self.step(t)?;
        }

        info!(
            blocks = self.ledger.len(),
            tip = %self.ledger.tip().fingerprint,
            "simulation finished"
        );
        Ok(SimulationOutput {
            history: self.history,
            ledger: self.ledger,
            inputs: self.inputs,
            prosumers: self.prosumers,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn inputs(&self) -> &ExogenousSeries {
        &self.inputs
    }

    pub fn prosumers(&self) -> &[Prosumer] {
        &self.prosumers
    }

    pub fn regulator(&self) -> &Regulator {
        &self.regulator
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Statistics of the steps executed so far.
    pub fn history(&self) -> &[StepStats] {
        &self.history
    }
}

fn check_config(config: &ScenarioConfig) -> Result<(), SimError> {
    match config.validate().into_iter().next() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ScenarioConfig {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.agents = 6;
        cfg.simulation.steps = 4;
        cfg.ledger.difficulty = 1;
        cfg
    }

    /// Two agents over one step: agent 0 has 4 kWh surplus, agent 1 a 2 kWh deficit.
    fn two_agent_inputs() -> ExogenousSeries {
        ExogenousSeries {
            load: vec![vec![1.0], vec![2.0]],
            production: vec![vec![5.0], vec![0.0]],
            capacities: vec![5.0, 0.0],
            grid_price: vec![0.30],
            feed_in_price: 0.08,
        }
    }

    fn two_agent_config() -> ScenarioConfig {
        let mut cfg = small_config();
        cfg.simulation.agents = 2;
        cfg.simulation.steps = 1;
        cfg
    }

    #[test]
    fn hand_built_step_trades_and_settles() {
        let mut sim = Simulation::with_inputs(&two_agent_config(), two_agent_inputs()).unwrap();
        let stats = sim.step(0).unwrap();

        // seller asks 3.0 at 0.27, buyer bids 1.5 at 0.30
        assert_eq!(stats.p2p_trades, 1);
        assert!((stats.p2p_energy - 1.5).abs() < 1e-12);
        assert_eq!(stats.local_energy, 0.0);
        // seller exports 4 - 1.5, buyer imports 2 - 1.5
        assert!((stats.grid_export - 2.5).abs() < 1e-12);
        assert!((stats.grid_import - 0.5).abs() < 1e-12);
        assert!((stats.total_production - stats.total_load - (stats.grid_export - stats.grid_import)).abs() < 1e-9);
        assert!(stats.p2p_share > 0.99);

        let trade = &sim.ledger().tip().trades[0];
        assert_eq!((trade.seller, trade.buyer), (0, 1));
        assert!((trade.price - 0.285).abs() < 1e-12);
        assert_eq!(sim.ledger().len(), 2);
    }

    #[test]
    fn balances_reflect_trade_and_grid() {
        let mut sim = Simulation::with_inputs(&two_agent_config(), two_agent_inputs()).unwrap();
        let stats = sim.step(0).unwrap();
        let seller = &sim.prosumers()[0];
        let buyer = &sim.prosumers()[1];
        let seller_expected = 1.5 * 0.285 + 2.5 * 0.08;
        let buyer_expected = -1.5 * 0.285 - 0.5 * 0.30;
        // 1.5 of 2.0 achievable on both sides: silver reward
        assert!((seller.balance - (seller_expected + 0.1)).abs() < 1e-9);
        assert!((buyer.balance - (buyer_expected + 0.1)).abs() < 1e-9);
        // community profit is taken before rewards
        assert!((stats.community_profit - (seller_expected + buyer_expected)).abs() < 1e-9);
        assert_eq!(stats.regulation.rewarded, 2);
    }

    #[test]
    fn run_produces_one_block_per_step() {
        let out = Simulation::new(&small_config()).unwrap().run().unwrap();
        assert_eq!(out.history.len(), 4);
        assert_eq!(out.ledger.len(), 5);
        assert!(out.ledger.is_valid());
        let traded: usize = out.history.iter().map(|s| s.p2p_trades + s.local_trades).sum();
        assert_eq!(out.ledger.summary().trades, traded);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut cfg = two_agent_config();
        cfg.simulation.agents = 3;
        let err = Simulation::with_inputs(&cfg, two_agent_inputs()).unwrap_err();
        assert!(matches!(err, SimError::InputShape(_)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = small_config();
        cfg.ledger.validators = 4;
        assert!(matches!(Simulation::new(&cfg), Err(SimError::Config(_))));
    }

    #[test]
    fn step_outside_horizon_is_an_error() {
        let mut sim = Simulation::with_inputs(&two_agent_config(), two_agent_inputs()).unwrap();
        assert!(matches!(
            sim.step(1),
            Err(SimError::StepOutOfRange { step: 1, steps: 1 })
        ));
    }

    #[test]
    fn steps_must_run_in_order_once() {
        let mut cfg = small_config();
        cfg.simulation.steps = 4;
        let mut sim = Simulation::new(&cfg).unwrap();

        assert!(matches!(
            sim.step(3),
            Err(SimError::StepOutOfOrder { step: 3, expected: 0 })
        ));
        assert!(sim.history().is_empty());
        assert_eq!(sim.ledger().len(), 1);

        sim.step(0).unwrap();
        assert!(matches!(
            sim.step(0),
            Err(SimError::StepOutOfOrder { step: 0, expected: 1 })
        ));

        let out = sim.run().unwrap();
        let steps: Vec<usize> = out.history.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![0, 1, 2, 3]);
        assert_eq!(out.ledger.len(), 5);
        assert!(out.ledger.is_valid());
    }

    #[test]
    fn consumers_ignore_production_series() {
        let mut inputs = two_agent_inputs();
        // capacity 0 marks a consumer even if the series says otherwise
        inputs.production[1][0] = 9.0;
        let mut sim = Simulation::with_inputs(&two_agent_config(), inputs).unwrap();
        let stats = sim.step(0).unwrap();
        assert_eq!(stats.total_production, 5.0);
    }
}
