use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::market::Trade;

/// Previous-fingerprint sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS: &str = "0";

/// Digest used to seal blocks.
///
/// Implementations must be deterministic: the same payload always yields the
/// same fingerprint.
pub trait Fingerprinter {
    fn fingerprint(&self, payload: &[u8]) -> String;
}

/// Lowercase hex SHA-256.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sha256Fingerprinter;

impl Fingerprinter for Sha256Fingerprinter {
    fn fingerprint(&self, payload: &[u8]) -> String {
        hex::encode(Sha256::digest(payload))
    }
}

/// One committed batch of trades.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    /// Position in the chain; genesis is 0.
    pub index: u64,
    pub previous_fingerprint: String,
    /// Trades settled during the step, in settlement order.
    pub trades: Vec<Trade>,
    /// Validator that sealed the block.
    pub validator: u32,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Proof-of-work counter.
    pub nonce: u64,
    /// Digest of every other field.
    pub fingerprint: String,
}

impl Block {
    /// Encoding of every field except `nonce` and `fingerprint`, left open so
    /// that [`Block::seal_payload`] can append a nonce.
    pub(crate) fn open_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = serde_json::to_vec(&(
            self.index,
            &self.previous_fingerprint,
            &self.trades,
            self.validator,
            self.timestamp,
        ))?;
        // `[a,b,c,d,e]` becomes `[a,b,c,d,e,`
        buf.pop();
        buf.push(b',');
        Ok(buf)
    }

    /// Completes an open payload with `nonce`. Reuses `buf` across calls.
    pub(crate) fn seal_payload(buf: &mut Vec<u8>, open_len: usize, nonce: u64) {
        buf.truncate(open_len);
        buf.extend_from_slice(nonce.to_string().as_bytes());
        buf.push(b']');
    }

    /// Canonical bytes that the fingerprint is computed over.
    pub fn payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = self.open_payload()?;
        let open_len = buf.len();
        Self::seal_payload(&mut buf, open_len, self.nonce);
        Ok(buf)
    }

    /// Recomputes the fingerprint from the block's current contents.
    pub fn compute_fingerprint<F: Fingerprinter>(
        &self,
        fingerprinter: &F,
    ) -> Result<String, serde_json::Error> {
        Ok(fingerprinter.fingerprint(&self.payload()?))
    }

    /// Whether the stored fingerprint starts with `difficulty` zero characters.
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.fingerprint, difficulty)
    }
}

pub(crate) fn meets_difficulty(fingerprint: &str, difficulty: usize) -> bool {
    fingerprint.len() >= difficulty && fingerprint.bytes().take(difficulty).all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Tier;

    fn block() -> Block {
        Block {
            index: 3,
            previous_fingerprint: "00ab".into(),
            trades: vec![Trade {
                seller: 0,
                buyer: 1,
                quantity: 3.0,
                price: 0.225,
                tier: Tier::PeerToPeer,
            }],
            validator: 7,
            timestamp: 1_700_000_000,
            nonce: 42,
            fingerprint: String::new(),
        }
    }

    #[test]
    fn payload_is_the_json_tuple_of_all_fields() {
        let b = block();
        let expected = serde_json::to_vec(&(
            b.index,
            &b.previous_fingerprint,
            &b.trades,
            b.validator,
            b.timestamp,
            b.nonce,
        ))
        .unwrap();
        assert_eq!(b.payload().unwrap(), expected);
    }

    #[test]
    fn sealing_reuses_the_open_prefix() {
        let b = block();
        let mut buf = b.open_payload().unwrap();
        let open_len = buf.len();
        Block::seal_payload(&mut buf, open_len, 1_000);
        Block::seal_payload(&mut buf, open_len, 42);
        assert_eq!(buf, b.payload().unwrap());
    }

    #[test]
    fn sha256_fingerprint_is_lowercase_hex() {
        let fp = Sha256Fingerprinter.fingerprint(b"abc");
        assert_eq!(
            fp,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn fingerprint_changes_with_any_field() {
        let base = block().compute_fingerprint(&Sha256Fingerprinter).unwrap();
        let mut b = block();
        b.trades[0].quantity = 3.5;
        assert_ne!(b.compute_fingerprint(&Sha256Fingerprinter).unwrap(), base);
        let mut b = block();
        b.nonce += 1;
        assert_ne!(b.compute_fingerprint(&Sha256Fingerprinter).unwrap(), base);
    }

    #[test]
    fn difficulty_prefix() {
        assert!(meets_difficulty("000abc", 3));
        assert!(!meets_difficulty("00abc", 3));
        assert!(meets_difficulty("abc", 0));
        assert!(!meets_difficulty("00", 3));
    }
}
