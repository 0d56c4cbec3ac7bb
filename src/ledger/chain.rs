use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};

use super::block::{Block, Fingerprinter, GENESIS_PREVIOUS, Sha256Fingerprinter, meets_difficulty};
use super::{ChainViolation, LedgerError, MAX_DIFFICULTY, MIN_VALIDATORS, ViolationKind};
use crate::market::Trade;

/// Source of block timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockClock {
    /// Block `i` is stamped `start + i * step_secs`.
    Simulated { start: u64, step_secs: u64 },
    /// Current system time.
    Wall,
}

impl BlockClock {
    fn timestamp(&self, index: u64) -> u64 {
        match *self {
            BlockClock::Simulated { start, step_secs } => {
                start.saturating_add(index.saturating_mul(step_secs))
            }
            BlockClock::Wall => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

/// Aggregate view of a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSummary {
    pub blocks: usize,
    pub trades: usize,
    pub difficulty: usize,
    pub validators: usize,
    pub tip_fingerprint: String,
}

impl fmt::Display for LedgerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Ledger ---")?;
        writeln!(f, "Blocks:            {}", self.blocks)?;
        writeln!(f, "Trades recorded:   {}", self.trades)?;
        writeln!(f, "Difficulty:        {}", self.difficulty)?;
        writeln!(f, "Validators:        {}", self.validators)?;
        write!(f, "Tip fingerprint:   {}", self.tip_fingerprint)
    }
}

/// Append-only hash chain sealed by proof of work.
///
/// Holds at least the genesis block at all times. Only [`Ledger::mine_block`]
/// appends.
#[derive(Debug, Clone)]
pub struct Ledger<F: Fingerprinter = Sha256Fingerprinter> {
    chain: Vec<Block>,
    difficulty: usize,
    validators: Vec<u32>,
    clock: BlockClock,
    rng: StdRng,
    fingerprinter: F,
}

impl Ledger<Sha256Fingerprinter> {
    /// Creates a SHA-256 ledger holding only the genesis block.
    ///
    /// # Errors
    ///
    /// Fails if fewer than [`MIN_VALIDATORS`] validators are given or the
    /// difficulty exceeds [`MAX_DIFFICULTY`].
    pub fn new(
        difficulty: usize,
        validators: Vec<u32>,
        seed: u64,
        clock: BlockClock,
    ) -> Result<Self, LedgerError> {
        Self::with_fingerprinter(difficulty, validators, seed, clock, Sha256Fingerprinter)
    }
}

impl<F: Fingerprinter> Ledger<F> {
    /// Creates a ledger sealed by a custom digest.
    pub fn with_fingerprinter(
        difficulty: usize,
        validators: Vec<u32>,
        seed: u64,
        clock: BlockClock,
        fingerprinter: F,
    ) -> Result<Self, LedgerError> {
        if validators.len() < MIN_VALIDATORS {
            return Err(LedgerError::ValidatorPoolTooSmall {
                got: validators.len(),
                min: MIN_VALIDATORS,
            });
        }
        if difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::DifficultyTooHigh {
                got: difficulty,
                max: MAX_DIFFICULTY,
            });
        }

        let mut ledger = Self {
            chain: Vec::new(),
            difficulty,
            validators,
            clock,
            rng: StdRng::seed_from_u64(seed),
            fingerprinter,
        };
        ledger.create_genesis()?;
        info!(
            difficulty,
            validators = ledger.validators.len(),
            genesis = %ledger.chain[0].fingerprint,
            "ledger initialised"
        );
        Ok(ledger)
    }

    /// Genesis is hashed once with nonce 0; it is not mined.
    fn create_genesis(&mut self) -> Result<(), LedgerError> {
        let validator = self.pick_validator();
        let mut genesis = Block {
            index: 0,
            previous_fingerprint: GENESIS_PREVIOUS.to_string(),
            trades: Vec::new(),
            validator,
            timestamp: self.clock.timestamp(0),
            nonce: 0,
            fingerprint: String::new(),
        };
        genesis.fingerprint = genesis.compute_fingerprint(&self.fingerprinter)?;
        // invariant: chain is never empty after this point; blocks are only appended
        self.chain.push(genesis);
        Ok(())
    }

    fn pick_validator(&mut self) -> u32 {
        let i = self.rng.random_range(0..self.validators.len());
        self.validators[i]
    }

    /// Seals `trades` into a new block on top of the tip.
    ///
    /// Searches nonces upward from 0 until the fingerprint carries the
    /// required number of leading zeros. Blocks until found.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Encoding`] if the block cannot be serialized and
    /// [`LedgerError::NonceSpaceExhausted`] if no `u64` nonce qualifies.
    pub fn mine_block(&mut self, trades: Vec<Trade>) -> Result<&Block, LedgerError> {
        let tip = self.tip();
        let index = tip.index + 1;
        let previous_fingerprint = tip.fingerprint.clone();
        let validator = self.pick_validator();

        let mut block = Block {
            index,
            previous_fingerprint,
            trades,
            validator,
            timestamp: self.clock.timestamp(index),
            nonce: 0,
            fingerprint: String::new(),
        };

        let mut buf = block.open_payload()?;
        let open_len = buf.len();
        let mut sealed = None;
        for nonce in 0..=u64::MAX {
            Block::seal_payload(&mut buf, open_len, nonce);
            let fingerprint = self.fingerprinter.fingerprint(&buf);
            if meets_difficulty(&fingerprint, self.difficulty) {
                sealed = Some((nonce, fingerprint));
                break;
            }
        }
        let (nonce, fingerprint) =
            sealed.ok_or(LedgerError::NonceSpaceExhausted(self.difficulty))?;
        block.nonce = nonce;
        block.fingerprint = fingerprint;

        debug!(
            index,
            nonce,
            validator,
            trades = block.trades.len(),
            "block mined"
        );
        self.chain.push(block);
        Ok(self.tip())
    }

    /// Checks every block after genesis for content, link and difficulty.
    ///
    /// Returns the first violation found.
    pub fn verify(&self) -> Result<(), ChainViolation> {
        for pair in self.chain.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            let violation = |kind| ChainViolation {
                index: current.index,
                kind,
            };

            let recomputed = current.compute_fingerprint(&self.fingerprinter).ok();
            if recomputed.as_deref() != Some(current.fingerprint.as_str()) {
                return Err(violation(ViolationKind::FingerprintMismatch));
            }
            if current.previous_fingerprint != previous.fingerprint {
                return Err(violation(ViolationKind::BrokenLink));
            }
            if !current.meets_difficulty(self.difficulty) {
                return Err(violation(ViolationKind::DifficultyUnmet));
            }
        }
        Ok(())
    }

    /// `true` if [`Ledger::verify`] finds no violation.
    pub fn is_valid(&self) -> bool {
        match self.verify() {
            Ok(()) => true,
            Err(violation) => {
                warn!(%violation, "ledger failed validation");
                false
            }
        }
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            blocks: self.chain.len(),
            trades: self.chain.iter().map(|b| b.trades.len()).sum(),
            difficulty: self.difficulty,
            validators: self.validators.len(),
            tip_fingerprint: self.tip().fingerprint.clone(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    /// Most recent block; genesis on a fresh ledger.
    pub fn tip(&self) -> &Block {
        match self.chain.last() {
            Some(block) => block,
            None => unreachable!("ledger constructed without genesis"),
        }
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn validators(&self) -> &[u32] {
        &self.validators
    }
}
