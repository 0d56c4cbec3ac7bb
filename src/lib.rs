//! Energy-community simulator: prosumers trading through a two-tier double
//! auction, a participation regulator and a proof-of-work trade ledger.

pub mod config;
/// Hash-chained trade ledger.
pub mod ledger;
pub mod market;
/// Synthetic load, production and price series.
pub mod profiles;
pub mod prosumer;
pub mod regulator;
/// Simulation loop, step statistics and run report.
pub mod sim;
