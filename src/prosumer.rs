//! Prosumer agent: self-balancing, order decisions and settlement.

use crate::market::Order;

/// Stable identifier of a prosumer; equals its index in the community.
pub type AgentId = usize;

/// Default fraction of the imbalance an agent offers to the market.
pub const DEFAULT_TRADE_PROPENSITY: f64 = 0.75;
/// Default seller price as a multiple of the grid price.
pub const DEFAULT_UNDERCUT_FACTOR: f64 = 0.9;

/// Market side an agent takes in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Offers surplus energy (an ask).
    Seller,
    /// Requests energy to cover a deficit (a bid).
    Buyer,
    /// Does not participate this step.
    Idle,
}

/// An agent's decision for one step: side, quantity (kWh) and unit price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offer {
    pub role: Role,
    pub quantity: f64,
    pub price: f64,
}

impl Offer {
    /// The no-op decision.
    pub const IDLE: Offer = Offer {
        role: Role::Idle,
        quantity: 0.0,
        price: 0.0,
    };

    /// Turns a non-idle offer into a market order for `agent`.
    pub fn order(&self, agent: AgentId) -> Option<Order> {
        match self.role {
            Role::Seller | Role::Buyer => Some(Order::new(agent, self.quantity, self.price)),
            Role::Idle => None,
        }
    }
}

/// Market-wide limits applied to every offer decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfferRules {
    /// Imbalances and quantities below this floor are not traded (kWh).
    pub min_trade_kwh: f64,
    /// Optional upper bound on one order's quantity (kWh).
    pub max_offer_kwh: Option<f64>,
}

impl Default for OfferRules {
    fn default() -> Self {
        Self {
            min_trade_kwh: 1e-3,
            max_offer_kwh: None,
        }
    }
}

/// Energy exchanged with the utility grid during settlement (both >= 0).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridSettlement {
    pub import_kwh: f64,
    pub export_kwh: f64,
}

/// One member of the energy community.
///
/// Economic state (`balance`, `suspended`) persists across steps; the
/// per-step metrics are cleared by [`Prosumer::reset_step_metrics`] once the
/// regulator has read them. `trade_propensity` and `undercut_factor` are only
/// changed by the regulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Prosumer {
    /// Stable identifier.
    pub id: AgentId,
    /// Whether the agent owns generation capacity.
    pub has_pv: bool,

    /// Cumulative net money earned (negative = net cost).
    pub balance: f64,
    /// Excluded from trading for the upcoming step.
    pub suspended: bool,

    /// Surplus observed during this step (kWh).
    pub surplus_today: f64,
    /// Quantity traded in any market tier during this step (kWh).
    pub traded_today: f64,
    /// Latest imbalance; positive = surplus, negative = deficit (kWh).
    pub last_imbalance: f64,

    /// Fraction of the imbalance offered to the market, in `[0, 1]`.
    pub trade_propensity: f64,
    /// Seller price multiplier applied to the grid price.
    pub undercut_factor: f64,
}

impl Prosumer {
    /// Creates an agent with default behaviour and a zero balance.
    pub fn new(id: AgentId, has_pv: bool) -> Self {
        Self {
            id,
            has_pv,
            balance: 0.0,
            suspended: false,
            surplus_today: 0.0,
            traded_today: 0.0,
            last_imbalance: 0.0,
            trade_propensity: DEFAULT_TRADE_PROPENSITY,
            undercut_factor: DEFAULT_UNDERCUT_FACTOR,
        }
    }

    /// Overrides the behavioural parameters; the propensity is clamped to `[0, 1]`.
    pub fn with_behaviour(mut self, trade_propensity: f64, undercut_factor: f64) -> Self {
        self.trade_propensity = trade_propensity.clamp(0.0, 1.0);
        self.undercut_factor = undercut_factor;
        self
    }

    /// Balances own production against own load.
    ///
    /// Production is ignored for agents without generation capacity.
    /// Returns `production - load` and records it as the latest imbalance;
    /// positive imbalances accumulate into `surplus_today`.
    pub fn self_balance(&mut self, load_kwh: f64, production_kwh: f64) -> f64 {
        let production = if self.has_pv { production_kwh } else { 0.0 };
        let imbalance = production - load_kwh;
        self.last_imbalance = imbalance;
        if imbalance > 0.0 {
            self.surplus_today += imbalance;
        }
        imbalance
    }

    /// Decides what to offer to the market for `imbalance`.
    ///
    /// Suspended agents and imbalances (or capped quantities) under the floor
    /// yield [`Offer::IDLE`]. Sellers ask `undercut_factor × grid_price`;
    /// buyers bid exactly the grid price.
    pub fn decide_offer(&self, imbalance: f64, grid_price: f64, rules: &OfferRules) -> Offer {
        if self.suspended || imbalance.abs() < rules.min_trade_kwh {
            return Offer::IDLE;
        }

        let mut quantity = imbalance.abs() * self.trade_propensity;
        if let Some(cap) = rules.max_offer_kwh {
            quantity = quantity.min(cap.max(0.0));
        }
        if quantity < rules.min_trade_kwh {
            return Offer::IDLE;
        }

        if imbalance > 0.0 {
            Offer {
                role: Role::Seller,
                quantity,
                price: self.undercut_factor * grid_price,
            }
        } else {
            Offer {
                role: Role::Buyer,
                quantity,
                price: grid_price,
            }
        }
    }

    /// Books a settled trade. Both sides count the full quantity as traded.
    pub fn apply_trade_result(&mut self, role: Role, quantity: f64, price: f64) {
        if quantity <= 0.0 {
            return;
        }
        match role {
            Role::Seller => {
                self.balance += quantity * price;
                self.traded_today += quantity;
            }
            Role::Buyer => {
                self.balance -= quantity * price;
                self.traded_today += quantity;
            }
            Role::Idle => {}
        }
    }

    /// Settles what the markets left over with the grid.
    ///
    /// A positive remainder is exported at the feed-in tariff, a negative one
    /// imported at the grid price.
    pub fn settle_with_grid(
        &mut self,
        remaining_imbalance: f64,
        grid_price: f64,
        feed_in_price: f64,
    ) -> GridSettlement {
        if remaining_imbalance > 0.0 {
            self.balance += remaining_imbalance * feed_in_price;
            GridSettlement {
                import_kwh: 0.0,
                export_kwh: remaining_imbalance,
            }
        } else if remaining_imbalance < 0.0 {
            let import = -remaining_imbalance;
            self.balance -= import * grid_price;
            GridSettlement {
                import_kwh: import,
                export_kwh: 0.0,
            }
        } else {
            GridSettlement::default()
        }
    }

    /// Clears the per-step metrics.
    pub fn reset_step_metrics(&mut self) {
        self.surplus_today = 0.0;
        self.traded_today = 0.0;
        self.last_imbalance = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> OfferRules {
        OfferRules::default()
    }

    #[test]
    fn self_balance_is_production_minus_load() {
        let mut p = Prosumer::new(0, true);
        assert_eq!(p.self_balance(2.0, 5.0), 3.0);
        assert_eq!(p.last_imbalance, 3.0);
        assert_eq!(p.surplus_today, 3.0);

        assert_eq!(p.self_balance(4.0, 1.0), -3.0);
        assert_eq!(p.last_imbalance, -3.0);
        // deficits never reduce the surplus metric
        assert_eq!(p.surplus_today, 3.0);
    }

    #[test]
    fn consumer_ignores_production() {
        let mut p = Prosumer::new(1, false);
        assert_eq!(p.self_balance(1.5, 10.0), -1.5);
        assert_eq!(p.surplus_today, 0.0);
    }

    #[test]
    fn seller_undercuts_grid_price() {
        let p = Prosumer::new(0, true);
        let offer = p.decide_offer(4.0, 0.30, &rules());
        assert_eq!(offer.role, Role::Seller);
        assert!((offer.quantity - 3.0).abs() < 1e-12);
        assert!((offer.price - 0.27).abs() < 1e-12);
        assert!(offer.price < 0.30);
    }

    #[test]
    fn buyer_bids_grid_price() {
        let p = Prosumer::new(0, false);
        let offer = p.decide_offer(-2.0, 0.25, &rules());
        assert_eq!(offer.role, Role::Buyer);
        assert!((offer.quantity - 1.5).abs() < 1e-12);
        assert_eq!(offer.price, 0.25);
    }

    #[test]
    fn suspended_agent_stays_idle() {
        let mut p = Prosumer::new(0, true);
        p.suspended = true;
        assert_eq!(p.decide_offer(5.0, 0.3, &rules()), Offer::IDLE);
    }

    #[test]
    fn tiny_imbalance_stays_idle() {
        let p = Prosumer::new(0, true);
        assert_eq!(p.decide_offer(5e-4, 0.3, &rules()), Offer::IDLE);
    }

    #[test]
    fn cap_limits_quantity_and_can_idle() {
        let p = Prosumer::new(0, true);
        let capped = OfferRules {
            min_trade_kwh: 1e-3,
            max_offer_kwh: Some(1.0),
        };
        assert_eq!(p.decide_offer(10.0, 0.3, &capped).quantity, 1.0);

        let zero_cap = OfferRules {
            min_trade_kwh: 1e-3,
            max_offer_kwh: Some(0.0),
        };
        assert_eq!(p.decide_offer(10.0, 0.3, &zero_cap), Offer::IDLE);
    }

    #[test]
    fn zero_propensity_stays_idle() {
        let p = Prosumer::new(0, true).with_behaviour(0.0, 0.9);
        assert_eq!(p.decide_offer(10.0, 0.3, &rules()), Offer::IDLE);
    }

    #[test]
    fn idle_offer_has_no_order() {
        assert_eq!(Offer::IDLE.order(3), None);
        let p = Prosumer::new(3, true);
        let order = p.decide_offer(2.0, 0.2, &rules()).order(p.id);
        assert_eq!(order.map(|o| o.agent), Some(3));
    }

    #[test]
    fn trade_result_is_symmetric_in_traded_metric() {
        let mut seller = Prosumer::new(0, true);
        let mut buyer = Prosumer::new(1, false);
        seller.apply_trade_result(Role::Seller, 2.0, 0.25);
        buyer.apply_trade_result(Role::Buyer, 2.0, 0.25);
        assert_eq!(seller.balance, 0.5);
        assert_eq!(buyer.balance, -0.5);
        assert_eq!(seller.traded_today, 2.0);
        assert_eq!(buyer.traded_today, 2.0);
    }

    #[test]
    fn non_positive_trade_is_ignored() {
        let mut p = Prosumer::new(0, true);
        p.apply_trade_result(Role::Seller, 0.0, 0.25);
        p.apply_trade_result(Role::Buyer, -1.0, 0.25);
        p.apply_trade_result(Role::Idle, 3.0, 0.25);
        assert_eq!(p.balance, 0.0);
        assert_eq!(p.traded_today, 0.0);
    }

    #[test]
    fn grid_settlement_directions() {
        let mut p = Prosumer::new(0, true);
        let export = p.settle_with_grid(2.0, 0.3, 0.08);
        assert_eq!(export, GridSettlement { import_kwh: 0.0, export_kwh: 2.0 });
        assert!((p.balance - 0.16).abs() < 1e-12);

        let import = p.settle_with_grid(-1.0, 0.3, 0.08);
        assert_eq!(import, GridSettlement { import_kwh: 1.0, export_kwh: 0.0 });
        assert!((p.balance - (0.16 - 0.3)).abs() < 1e-12);

        assert_eq!(p.settle_with_grid(0.0, 0.3, 0.08), GridSettlement::default());
    }

    #[test]
    fn reset_clears_metrics_only() {
        let mut p = Prosumer::new(0, true);
        p.self_balance(1.0, 3.0);
        p.apply_trade_result(Role::Seller, 1.0, 0.2);
        p.suspended = true;
        p.reset_step_metrics();
        assert_eq!(p.surplus_today, 0.0);
        assert_eq!(p.traded_today, 0.0);
        assert_eq!(p.last_imbalance, 0.0);
        assert!(p.suspended);
        assert_eq!(p.balance, 0.2);
    }
}
