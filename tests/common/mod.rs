//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use rand::{Rng, SeedableRng, rngs::StdRng};

use prosumer_sim::config::ScenarioConfig;
use prosumer_sim::market::Order;

/// Small, fast scenario: 5 agents, 10 hourly steps, difficulty 2, seed 42.
pub fn small_config() -> ScenarioConfig {
    let mut cfg = ScenarioConfig::baseline();
    cfg.simulation.agents = 5;
    cfg.simulation.steps = 10;
    cfg.simulation.seed = 42;
    cfg.ledger.difficulty = 2;
    cfg
}

/// Medium scenario used for aggregate checks: 30 agents over one day.
pub fn day_config() -> ScenarioConfig {
    let mut cfg = ScenarioConfig::baseline();
    cfg.simulation.agents = 30;
    cfg.simulation.steps = 24;
    cfg.ledger.difficulty = 1;
    cfg
}

/// Random order book side with `n` orders; prices in `[0.05, 0.45]`.
///
/// Agent ids start at `first_agent`.
pub fn random_orders(rng: &mut StdRng, n: usize, first_agent: usize) -> Vec<Order> {
    (0..n)
        .map(|k| {
            Order::new(
                first_agent + k,
                rng.random_range(0.0..=5.0),
                rng.random_range(0.05..=0.45),
            )
        })
        .collect()
}

/// Seeded RNG for property loops.
pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
