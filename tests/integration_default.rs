//! Integration tests for full simulation runs.

mod common;

use prosumer_sim::ledger::MIN_VALIDATORS;
use prosumer_sim::market::Tier;
use prosumer_sim::profiles::ExogenousSeries;
use prosumer_sim::regulator::UnderParticipation;
use prosumer_sim::sim::{Metric, RunReport, SimError, Simulation};

#[test]
fn same_seed_reproduces_ledger_and_series() {
    let cfg = common::small_config();
    let a = Simulation::new(&cfg).unwrap().run().unwrap();
    let b = Simulation::new(&cfg).unwrap().run().unwrap();

    assert_eq!(a.ledger.tip().fingerprint, b.ledger.tip().fingerprint);
    assert_eq!(a.ledger.blocks(), b.ledger.blocks());
    assert_eq!(a.history, b.history);
    for metric in Metric::ALL {
        assert_eq!(a.series(metric), b.series(metric), "{}", metric.name());
    }
}

#[test]
fn different_seed_changes_the_run() {
    let cfg = common::small_config();
    let mut other = cfg.clone();
    other.simulation.seed = 7;
    let a = Simulation::new(&cfg).unwrap().run().unwrap();
    let b = Simulation::new(&other).unwrap().run().unwrap();
    assert_ne!(a.series(Metric::TotalLoad), b.series(Metric::TotalLoad));
}

#[test]
fn run_commits_one_valid_block_per_step() {
    let cfg = common::small_config();
    let out = Simulation::new(&cfg).unwrap().run().unwrap();

    assert_eq!(out.history.len(), 10);
    assert_eq!(out.ledger.len(), 11);
    assert!(out.ledger.is_valid());
    assert_eq!(out.ledger.verify(), Ok(()));
    for block in &out.ledger.blocks()[1..] {
        assert!(block.fingerprint.starts_with("00"));
    }

    let summary = out.ledger.summary();
    assert_eq!(summary.validators, MIN_VALIDATORS);
    assert_eq!(summary.difficulty, 2);
}

#[test]
fn energy_balances_every_step() {
    let out = Simulation::new(&common::day_config()).unwrap().run().unwrap();
    for s in &out.history {
        let net = s.total_production - s.total_load;
        let grid = s.grid_export - s.grid_import;
        assert!(
            (net - grid).abs() < 1e-6,
            "step {}: production - load = {net}, export - import = {grid}",
            s.step
        );
    }
}

#[test]
fn step_statistics_are_consistent() {
    let out = Simulation::new(&common::day_config()).unwrap().run().unwrap();
    for (s, block) in out.history.iter().zip(&out.ledger.blocks()[1..]) {
        assert!((0.0..=1.0).contains(&s.p2p_share));
        assert!(s.grid_import >= 0.0 && s.grid_export >= 0.0);
        assert_eq!(block.trades.len(), s.p2p_trades + s.local_trades);

        let p2p: f64 = block
            .trades
            .iter()
            .filter(|t| t.tier == Tier::PeerToPeer)
            .map(|t| t.quantity)
            .sum();
        assert!((p2p - s.p2p_energy).abs() < 1e-9);

        let grid_price = out.inputs.grid_price[s.step];
        for t in block.trades.iter().filter(|t| t.tier == Tier::LocalMarket) {
            assert!(t.price <= grid_price);
        }
    }
}

#[test]
fn default_objective_tracks_p2p_share() {
    let out = Simulation::new(&common::small_config()).unwrap().run().unwrap();
    assert_eq!(out.series(Metric::ObjectiveValue), out.series(Metric::P2pShare));
}

#[test]
fn report_matches_history() {
    let out = Simulation::new(&common::day_config()).unwrap().run().unwrap();
    let report = RunReport::from_history(&out.history);
    let p2p_total: f64 = out.series(Metric::P2pEnergy).iter().sum();
    assert!((report.p2p_energy_kwh - p2p_total).abs() < 1e-9);
    assert_eq!(report.trades, out.ledger.summary().trades);
    assert_eq!(
        report.final_community_profit,
        out.history.last().unwrap().community_profit
    );
    assert!((0.0..=1.0).contains(&report.self_sufficiency));
}

#[test]
fn suspension_mode_collects_no_fines() {
    let mut cfg = common::day_config();
    cfg.regulator.under_participation = UnderParticipation::Suspend;
    let out = Simulation::new(&cfg).unwrap().run().unwrap();
    for s in &out.history {
        assert_eq!(s.regulation.punished, 0);
        assert_eq!(s.regulation.fines_collected, 0.0);
    }
}

#[test]
fn external_inputs_drive_the_run() {
    let mut cfg = common::small_config();
    cfg.simulation.agents = 2;
    cfg.simulation.steps = 2;
    let inputs = ExogenousSeries {
        load: vec![vec![1.0, 1.0], vec![3.0, 3.0]],
        production: vec![vec![4.0, 0.0], vec![0.0, 0.0]],
        capacities: vec![4.0, 0.0],
        grid_price: vec![0.25, 0.25],
        feed_in_price: 0.05,
    };
    let out = Simulation::with_inputs(&cfg, inputs.clone()).unwrap().run().unwrap();
    assert_eq!(out.inputs, inputs);
    assert!(out.history[0].p2p_energy > 0.0);
    // nobody has surplus in the second step
    assert_eq!(out.history[1].p2p_energy, 0.0);
    assert_eq!(out.ledger.blocks()[2].trades.len(), 0);
}

#[test]
fn undersized_validator_pool_fails_before_running() {
    let mut cfg = common::small_config();
    cfg.ledger.validators = 9;
    match Simulation::new(&cfg) {
        Err(SimError::Config(e)) => assert_eq!(e.field, "ledger.validators"),
        other => panic!("expected config error, got {other:?}"),
    }
}
