//! Two-tier double auction: a peer-to-peer round followed by a local-market
//! round over the peer-to-peer leftovers.
//!
//! Both rounds share one matching primitive. Asks are walked cheapest first,
//! bids richest first, and each crossing pair clears at the midpoint of the
//! two prices.

use serde::Serialize;
use thiserror::Error;

use crate::prosumer::{AgentId, Offer, Role};

/// Remaining quantities at or below this are treated as fully consumed.
pub const QUANTITY_EPSILON: f64 = 1e-6;

/// An ask or bid: `quantity` kWh at `price` per kWh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Order {
    pub agent: AgentId,
    pub quantity: f64,
    pub price: f64,
}

impl Order {
    pub fn new(agent: AgentId, quantity: f64, price: f64) -> Self {
        Self {
            agent,
            quantity,
            price,
        }
    }

    fn is_well_formed(&self) -> bool {
        self.quantity.is_finite()
            && self.price.is_finite()
            && self.quantity >= 0.0
            && self.price >= 0.0
    }
}

/// The market tier a trade settled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    #[serde(rename = "p2p")]
    PeerToPeer,
    #[serde(rename = "local_market")]
    LocalMarket,
}

/// A settled match between one seller and one buyer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub seller: AgentId,
    pub buyer: AgentId,
    pub quantity: f64,
    pub price: f64,
    pub tier: Tier,
}

/// Trades plus whatever the round could not clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub trades: Vec<Trade>,
    /// Unconsumed asks, cheapest first; a partially filled head keeps its
    /// reduced quantity.
    pub leftover_asks: Vec<Order>,
    /// Unconsumed bids, richest first.
    pub leftover_bids: Vec<Order>,
}

impl MatchOutcome {
    /// Total quantity across all trades.
    pub fn volume(&self) -> f64 {
        self.trades.iter().map(|t| t.quantity).sum()
    }
}

/// Orders collected from the community during one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    pub asks: Vec<Order>,
    pub bids: Vec<Order>,
}

impl OrderBook {
    /// Files `offer` under the matching side; idle offers are dropped.
    pub fn push(&mut self, agent: AgentId, offer: &Offer) {
        let Some(order) = offer.order(agent) else {
            return;
        };
        match offer.role {
            Role::Seller => self.asks.push(order),
            Role::Buyer => self.bids.push(order),
            Role::Idle => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.asks.is_empty() && self.bids.is_empty()
    }
}

/// Internal-consistency faults of the matcher.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    #[error("malformed {side} from agent {agent}: quantity {quantity}, price {price}")]
    InvalidOrder {
        side: &'static str,
        agent: AgentId,
        quantity: f64,
        price: f64,
    },
}

fn check_book(orders: &[Order], side: &'static str) -> Result<(), MarketError> {
    match orders.iter().find(|o| !o.is_well_formed()) {
        Some(o) => Err(MarketError::InvalidOrder {
            side,
            agent: o.agent,
            quantity: o.quantity,
            price: o.price,
        }),
        None => Ok(()),
    }
}

fn clear(asks: &[Order], bids: &[Order], tier: Tier) -> Result<MatchOutcome, MarketError> {
    check_book(asks, "ask")?;
    check_book(bids, "bid")?;

    // sort_by is stable: equal prices keep submission order
    let mut asks = asks.to_vec();
    asks.sort_by(|a, b| a.price.total_cmp(&b.price));
    let mut bids = bids.to_vec();
    bids.sort_by(|a, b| b.price.total_cmp(&a.price));

    let mut trades = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < asks.len() && j < bids.len() {
        let ask = asks[i];
        let bid = bids[j];
        if bid.price < ask.price {
            break;
        }

        let quantity = ask.quantity.min(bid.quantity);
        let price = (ask.price + bid.price) / 2.0;
        debug_assert!(
            (ask.price..=bid.price).contains(&price),
            "clearing price outside the crossed spread"
        );

        if quantity > 0.0 {
            trades.push(Trade {
                seller: ask.agent,
                buyer: bid.agent,
                quantity,
                price,
                tier,
            });
        }

        let ask_left = ask.quantity - quantity;
        let bid_left = bid.quantity - quantity;

        if ask_left <= QUANTITY_EPSILON {
            i += 1;
        } else {
            asks[i].quantity = ask_left;
        }
        if bid_left <= QUANTITY_EPSILON {
            j += 1;
        } else {
            bids[j].quantity = bid_left;
        }
    }

    Ok(MatchOutcome {
        trades,
        leftover_asks: asks.split_off(i),
        leftover_bids: bids.split_off(j),
    })
}

/// Peer-to-peer round.
///
/// Runs until the richest remaining bid no longer covers the cheapest
/// remaining ask, or one side is exhausted. Traded quantity never exceeds
/// either order and the clearing price lies between ask and bid.
///
/// # Errors
///
/// Returns [`MarketError::InvalidOrder`] if any order carries a negative or
/// non-finite quantity or price.
pub fn match_orders(asks: &[Order], bids: &[Order]) -> Result<MatchOutcome, MarketError> {
    clear(asks, bids, Tier::PeerToPeer)
}

/// Local-market round, normally run over the peer-to-peer leftovers.
///
/// Same matching as [`match_orders`], but every trade is tagged
/// [`Tier::LocalMarket`] and priced at most `grid_price`.
pub fn match_local(
    asks: &[Order],
    bids: &[Order],
    grid_price: f64,
) -> Result<MatchOutcome, MarketError> {
    let mut outcome = clear(asks, bids, Tier::LocalMarket)?;
    for trade in &mut outcome.trades {
        trade.price = trade.price.min(grid_price);
    }
    Ok(outcome)
}
