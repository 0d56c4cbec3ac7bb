//! Post-hoc run report computed from step statistics.

use std::fmt;

use super::types::StepStats;

/// Aggregate indicators of a complete run.
///
/// Computed from the step history so the report can never disagree with
/// the per-step series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Number of steps covered.
    pub steps: usize,
    /// Total community consumption (kWh).
    pub total_load_kwh: f64,
    /// Total community production (kWh).
    pub total_production_kwh: f64,
    /// Energy cleared peer-to-peer (kWh).
    pub p2p_energy_kwh: f64,
    /// Energy cleared in the local market (kWh).
    pub local_energy_kwh: f64,
    /// Energy imported from the grid (kWh).
    pub grid_import_kwh: f64,
    /// Energy exported to the grid (kWh).
    pub grid_export_kwh: f64,
    /// Number of trades across both tiers.
    pub trades: usize,
    /// Mean of the per-step p2p share.
    pub mean_p2p_share: f64,
    /// Community profit after the last step.
    pub final_community_profit: f64,
    /// Share of consumption not imported from the grid, in `[0, 1]`.
    pub self_sufficiency: f64,
    /// Total rewards paid by the regulator.
    pub rewards_paid: f64,
    /// Total fines collected by the regulator.
    pub fines_collected: f64,
    /// Total agent-steps spent suspended.
    pub suspensions: usize,
}

impl RunReport {
    /// Computes the report from a step history; an empty history yields zeros.
    pub fn from_history(history: &[StepStats]) -> Self {
        let Some(last) = history.last() else {
            return Self::default();
        };

        let mut r = Self {
            steps: history.len(),
            final_community_profit: last.community_profit,
            ..Self::default()
        };
        let mut share_sum = 0.0;

        for s in history {
            r.total_load_kwh += s.total_load;
            r.total_production_kwh += s.total_production;
            r.p2p_energy_kwh += s.p2p_energy;
            r.local_energy_kwh += s.local_energy;
            r.grid_import_kwh += s.grid_import;
            r.grid_export_kwh += s.grid_export;
            r.trades += s.p2p_trades + s.local_trades;
            r.rewards_paid += s.regulation.rewards_paid;
            r.fines_collected += s.regulation.fines_collected;
            r.suspensions += s.regulation.suspended;
            share_sum += s.p2p_share;
        }

        r.mean_p2p_share = share_sum / history.len() as f64;
        r.self_sufficiency = if r.total_load_kwh > 0.0 {
            (1.0 - r.grid_import_kwh / r.total_load_kwh).clamp(0.0, 1.0)
        } else {
            0.0
        };
        r
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Report ---")?;
        writeln!(f, "Steps:                 {}", self.steps)?;
        writeln!(f, "Total load:            {:.2} kWh", self.total_load_kwh)?;
        writeln!(f, "Total production:      {:.2} kWh", self.total_production_kwh)?;
        writeln!(f, "P2P energy:            {:.2} kWh", self.p2p_energy_kwh)?;
        writeln!(f, "Local market energy:   {:.2} kWh", self.local_energy_kwh)?;
        writeln!(f, "Grid import:           {:.2} kWh", self.grid_import_kwh)?;
        writeln!(f, "Grid export:           {:.2} kWh", self.grid_export_kwh)?;
        writeln!(f, "Trades:                {}", self.trades)?;
        writeln!(f, "Mean P2P share:        {:.3}", self.mean_p2p_share)?;
        writeln!(f, "Self-sufficiency:      {:.1}%", self.self_sufficiency * 100.0)?;
        writeln!(
            f,
            "Regulator:             {:.2} rewarded, {:.2} fined, {} suspensions",
            self.rewards_paid, self.fines_collected, self.suspensions
        )?;
        write!(f, "Final community profit: {:.2}", self.final_community_profit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regulator::RegulationSummary;

    fn make_stats(load: f64, import: f64, p2p: f64, share: f64, profit: f64) -> StepStats {
        StepStats {
            total_load: load,
            grid_import: import,
            p2p_energy: p2p,
            p2p_share: share,
            community_profit: profit,
            p2p_trades: 2,
            local_trades: 1,
            regulation: RegulationSummary {
                rewards_paid: 0.5,
                fines_collected: 0.1,
                ..RegulationSummary::default()
            },
            ..StepStats::default()
        }
    }

    #[test]
    fn empty_history_gives_zero_report() {
        assert_eq!(RunReport::from_history(&[]), RunReport::default());
    }

    #[test]
    fn totals_and_means() {
        let history = [
            make_stats(10.0, 4.0, 2.0, 1.0, -1.0),
            make_stats(10.0, 6.0, 1.0, 0.5, -3.0),
        ];
        let r = RunReport::from_history(&history);
        assert_eq!(r.steps, 2);
        assert_eq!(r.total_load_kwh, 20.0);
        assert_eq!(r.p2p_energy_kwh, 3.0);
        assert_eq!(r.trades, 6);
        assert!((r.mean_p2p_share - 0.75).abs() < 1e-12);
        assert!((r.self_sufficiency - 0.5).abs() < 1e-12);
        assert_eq!(r.final_community_profit, -3.0);
        assert!((r.rewards_paid - 1.0).abs() < 1e-12);
        assert!((r.fines_collected - 0.2).abs() < 1e-12);
    }

    #[test]
    fn self_sufficiency_is_zero_without_load() {
        let r = RunReport::from_history(&[make_stats(0.0, 0.0, 0.0, 0.0, 0.0)]);
        assert_eq!(r.self_sufficiency, 0.0);
    }

    #[test]
    fn display_lists_every_indicator() {
        let r = RunReport::from_history(&[make_stats(10.0, 4.0, 2.0, 1.0, 1.0)]);
        let s = r.to_string();
        assert!(s.contains("P2P energy:            2.00 kWh"));
        assert!(s.contains("Final community profit: 1.00"));
    }
}
