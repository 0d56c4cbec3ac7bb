//! Hash-chained, proof-of-work sealed record of settled trades.

pub mod block;
pub mod chain;

pub use block::{Block, Fingerprinter, GENESIS_PREVIOUS, Sha256Fingerprinter};
pub use chain::{BlockClock, Ledger, LedgerSummary};

use thiserror::Error;

/// Smallest accepted validator pool.
pub const MIN_VALIDATORS: usize = 10;
/// Length of a hex SHA-256 digest; no higher difficulty can be met.
pub const MAX_DIFFICULTY: usize = 64;

/// Errors raised while building or extending a ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validator pool has {got} members, at least {min} required")]
    ValidatorPoolTooSmall { got: usize, min: usize },
    #[error("difficulty {got} exceeds the {max} characters of a fingerprint")]
    DifficultyTooHigh { got: usize, max: usize },
    #[error("failed to encode block: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("no nonce meets difficulty {0}")]
    NonceSpaceExhausted(usize),
}

/// Which integrity check a block failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ViolationKind {
    #[error("stored fingerprint does not match contents")]
    FingerprintMismatch,
    #[error("previous fingerprint does not match parent block")]
    BrokenLink,
    #[error("fingerprint misses the difficulty target")]
    DifficultyUnmet,
}

/// First integrity failure found by [`Ledger::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("block {index}: {kind}")]
pub struct ChainViolation {
    pub index: u64,
    pub kind: ViolationKind,
}
