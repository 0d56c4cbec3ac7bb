//! Participation-based incentive policy.
//!
//! After each step the regulator compares what every agent traded against the
//! volume it could have traded given the community's counter-volume, then
//! rewards, fines or suspends it and nudges its trade propensity. Rewards are
//! an ordered tier table; falling below the lowest tier triggers the
//! under-participation rule.

use serde::Deserialize;
use tracing::debug;

use crate::config::RegulatorConfig;
use crate::prosumer::Prosumer;
use crate::sim::StepStats;

/// Achievable volumes at or below this are treated as zero.
pub const ACHIEVABLE_EPSILON: f64 = 1e-6;

/// Community-level quantity the regulator reports each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Share of traded energy that cleared peer-to-peer.
    #[default]
    MaximizeP2p,
    /// Sum of all agents' balances.
    MaximizeProfit,
    /// Any unrecognized objective; always evaluates to 0.
    #[serde(other)]
    Unspecified,
}

/// Treatment of agents whose participation falls below the punish threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderParticipation {
    /// Charge a fine and raise the trade propensity.
    #[default]
    Fine,
    /// Exclude the agent from the next step's markets.
    Suspend,
}

/// One row of the reward table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncentiveTier {
    /// Lowest participation ratio that qualifies for this tier.
    pub min_ratio: f64,
    /// Money credited to the agent.
    pub reward: f64,
    /// Increase of the agent's trade propensity.
    pub propensity_step: f64,
}

/// Aggregate surplus and deficit of the community in one step (both >= 0).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CommunityBalance {
    pub surplus: f64,
    pub deficit: f64,
}

impl CommunityBalance {
    /// Sums the positive and negative parts of `imbalances`.
    pub fn from_imbalances(imbalances: &[f64]) -> Self {
        imbalances.iter().fold(Self::default(), |mut acc, &x| {
            if x > 0.0 {
                acc.surplus += x;
            } else {
                acc.deficit -= x;
            }
            acc
        })
    }
}

/// What one application of the rules did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegulationSummary {
    pub rewarded: usize,
    /// Agents fined for under-participation.
    pub punished: usize,
    /// Agents suspended for the next step.
    pub suspended: usize,
    /// Agents skipped because they were suspended during the evaluated step.
    pub exempt: usize,
    pub rewards_paid: f64,
    pub fines_collected: f64,
}

/// Outcome of evaluating a single agent.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Verdict {
    Skip,
    Exempt,
    Reward(IncentiveTier),
    Fine,
    Suspend,
}

/// Regulator policy. Immutable once the simulation starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Regulator {
    objective: Objective,
    mode: UnderParticipation,
    punish_threshold: f64,
    fine: f64,
    punish_propensity_step: f64,
    /// Sorted by `min_ratio`, highest first.
    tiers: Vec<IncentiveTier>,
}

impl Regulator {
    /// Creates a policy with fines for under-participation.
    ///
    /// `tiers` may be given in any order. Ratios below `punish_threshold` are
    /// punished even if a tier starts lower.
    pub fn new(
        objective: Objective,
        punish_threshold: f64,
        fine: f64,
        punish_propensity_step: f64,
        mut tiers: Vec<IncentiveTier>,
    ) -> Self {
        tiers.sort_by(|a, b| b.min_ratio.total_cmp(&a.min_ratio));
        Self {
            objective,
            mode: UnderParticipation::Fine,
            punish_threshold,
            fine,
            punish_propensity_step,
            tiers,
        }
    }

    /// Builds the gold/silver/bronze policy from configuration.
    pub fn from_config(cfg: &RegulatorConfig) -> Self {
        let tiers = vec![
            IncentiveTier {
                min_ratio: cfg.gold_threshold,
                reward: cfg.gold_reward,
                propensity_step: cfg.gold_propensity_step,
            },
            IncentiveTier {
                min_ratio: cfg.silver_threshold,
                reward: cfg.silver_reward,
                propensity_step: cfg.silver_propensity_step,
            },
            IncentiveTier {
                min_ratio: cfg.punish_threshold,
                reward: cfg.bronze_reward,
                propensity_step: cfg.bronze_propensity_step,
            },
        ];
        Self::new(
            cfg.objective,
            cfg.punish_threshold,
            cfg.fine,
            cfg.punish_propensity_step,
            tiers,
        )
        .with_mode(cfg.under_participation)
    }

    pub fn with_mode(mut self, mode: UnderParticipation) -> Self {
        self.mode = mode;
        self
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn mode(&self) -> UnderParticipation {
        self.mode
    }

    /// Reward table, highest threshold first.
    pub fn tiers(&self) -> &[IncentiveTier] {
        &self.tiers
    }

    /// Reads the configured objective from one step's statistics.
    pub fn evaluate_objective(&self, stats: &StepStats) -> f64 {
        match self.objective {
            Objective::MaximizeP2p => stats.p2p_share,
            Objective::MaximizeProfit => stats.community_profit,
            Objective::Unspecified => 0.0,
        }
    }

    /// Volume `p` could have traded given the community's counter-volume.
    pub fn achievable_volume(p: &Prosumer, community: CommunityBalance) -> f64 {
        if p.last_imbalance > 0.0 {
            p.surplus_today.min(community.deficit)
        } else if p.last_imbalance < 0.0 {
            (-p.last_imbalance).min(community.surplus)
        } else {
            0.0
        }
    }

    fn verdict(&self, p: &Prosumer, was_suspended: bool, community: CommunityBalance) -> Verdict {
        if was_suspended {
            return Verdict::Exempt;
        }
        let achievable = Self::achievable_volume(p, community);
        if achievable <= ACHIEVABLE_EPSILON {
            return Verdict::Skip;
        }

        let ratio = p.traded_today / achievable;
        let floor = self.punish_threshold;
        if let Some(tier) = self.tiers.iter().find(|t| ratio >= t.min_ratio.max(floor)) {
            return Verdict::Reward(*tier);
        }

        match self.mode {
            UnderParticipation::Fine => Verdict::Fine,
            UnderParticipation::Suspend => Verdict::Suspend,
        }
    }

    /// Evaluates every agent after settlement and prepares it for the next step.
    ///
    /// Clears last step's suspension, applies the verdict and resets the
    /// per-step metrics.
    pub fn apply_rules(
        &self,
        prosumers: &mut [Prosumer],
        community: CommunityBalance,
    ) -> RegulationSummary {
        let mut summary = RegulationSummary::default();

        for p in prosumers.iter_mut() {
            let was_suspended = std::mem::take(&mut p.suspended);

            match self.verdict(p, was_suspended, community) {
                Verdict::Skip => {}
                Verdict::Exempt => summary.exempt += 1,
                Verdict::Reward(tier) => {
                    p.balance += tier.reward;
                    p.trade_propensity =
                        (p.trade_propensity + tier.propensity_step).clamp(0.0, 1.0);
                    summary.rewarded += 1;
                    summary.rewards_paid += tier.reward;
                }
                Verdict::Fine => {
                    p.balance -= self.fine;
                    p.trade_propensity =
                        (p.trade_propensity + self.punish_propensity_step).clamp(0.0, 1.0);
                    summary.punished += 1;
                    summary.fines_collected += self.fine;
                    debug!(agent = p.id, fine = self.fine, "under-participation fined");
                }
                Verdict::Suspend => {
                    p.suspended = true;
                    summary.suspended += 1;
                    debug!(agent = p.id, "under-participation suspended for next step");
                }
            }

            p.reset_step_metrics();
        }

        summary
    }
}

impl Default for Regulator {
    fn default() -> Self {
        Self::from_config(&RegulatorConfig::default())
    }
}
