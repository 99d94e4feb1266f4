//! Enrollment manager (spec §4.5).
//!
//! Holds the active validator table keyed by `utxo_key`. An enrollment
//! commits the *terminal* hash of a pre-image chain
//! (`p_0 = secret, p_{i+1} = hash(p_i)`, chain length `cycle_length`); the
//! committed value is `p_{cycle_length-1}` and is stored verbatim as
//! [`agora_core::Enrollment::random_seed`] (spec §3: "the terminal hash of
//! a precomputed pre-image chain"). The enrolling node reveals
//! `p_{cycle_length-1-k}` at height `enrolled_at + k`; a correct reveal
//! hashes forward `k` times to reproduce the committed head.

use std::collections::HashMap;

use agora_core::crypto::{
    ed25519_public_to_curve_point, ed25519_secret_to_curve_scalar, hash_bytes, schnorr_sign,
    schnorr_verify,
};
use agora_core::{Enrollment, Hash, KeyPair, PublicKey, UtxoKey};

use crate::error::{ConsensusError, ConsensusResult};

/// A currently-enrolled validator's stake commitment and pre-image chain.
#[derive(Debug, Clone)]
pub struct ValidatorEntry {
    pub enrolled_at_height: u64,
    pub cycle_length: u32,
    /// The committed terminal hash (`preimages[cycle_length - 1]`).
    pub random_seed: Hash,
    /// The full chain, known only to the enrolling node. Empty for
    /// entries learned from peers (those only know `random_seed`).
    pub preimages: Vec<Hash>,
}

impl ValidatorEntry {
    pub fn expires_at(&self) -> u64 {
        self.enrolled_at_height + self.cycle_length as u64
    }

    pub fn is_active_at(&self, height: u64) -> bool {
        self.expires_at() > height
    }
}

/// Builds a fresh pre-image chain of length `cycle_length` from a random
/// base secret, returning `(random_seed, chain)` where `random_seed` is
/// the committed terminal hash (`chain[cycle_length - 1]`).
pub fn build_preimage_chain(base_secret: Hash, cycle_length: u32) -> (Hash, Vec<Hash>) {
    let mut chain = Vec::with_capacity(cycle_length as usize);
    chain.push(base_secret);
    for i in 1..cycle_length as usize {
        chain.push(hash_bytes(chain[i - 1].as_bytes()));
    }
    let random_seed = *chain.last().expect("cycle_length >= 1");
    (random_seed, chain)
}

/// Verifies that `revealed` hashed forward `steps` times reproduces `head`.
pub fn verify_preimage_reveal(head: &Hash, revealed: &Hash, steps: u32) -> bool {
    let mut current = *revealed;
    for _ in 0..steps {
        current = hash_bytes(current.as_bytes());
    }
    &current == head
}

/// Signs an enrollment over `utxo_key` using the node's Ed25519 key,
/// converted to a Curve25519 scalar for the Schnorr signature (spec §4.5).
pub fn make_enrollment(
    key_pair: &KeyPair,
    utxo_key: UtxoKey,
    base_secret: Hash,
    cycle_length: u32,
) -> (Enrollment, Vec<Hash>) {
    let (random_seed, chain) = build_preimage_chain(base_secret, cycle_length);
    let scalar = ed25519_secret_to_curve_scalar(&key_pair.secret);
    let unsigned = Enrollment {
        utxo_key,
        random_seed,
        cycle_length,
        enroll_sig: agora_core::SchnorrSignature { r: [0; 32], s: [0; 32] },
    };
    let msg = unsigned.signing_message();
    let enroll_sig = schnorr_sign(&scalar, &msg);
    (
        Enrollment {
            enroll_sig,
            ..unsigned
        },
        chain,
    )
}

/// Verifies an enrollment's Schnorr signature against the Ed25519 public
/// key of the owner of the frozen UTXO (spec §4.5: "verification
/// reconstructs the scalar's public point from the Ed25519 public key").
/// Returns `false` (never panics) if `enroller_public` does not decode to
/// a valid curve point.
pub fn verify_enrollment_signature(enrollment: &Enrollment, enroller_public: &PublicKey) -> bool {
    let point = match ed25519_public_to_curve_point(enroller_public) {
        Some(point) => point,
        None => return false,
    };
    let msg = enrollment.signing_message();
    schnorr_verify(&point, &enrollment.enroll_sig, &msg)
}

/// The active validator table (spec §4.5).
#[derive(Debug, Clone, Default)]
pub struct EnrollmentManager {
    entries: HashMap<UtxoKey, ValidatorEntry>,
}

impl EnrollmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries still active at `height` (spec §4.5
    /// `validator_count(height)`).
    pub fn validator_count(&self, height: u64) -> usize {
        self.entries.values().filter(|e| e.is_active_at(height)).count()
    }

    pub fn get(&self, key: &UtxoKey) -> Option<&ValidatorEntry> {
        self.entries.get(key)
    }

    pub fn is_enrolled(&self, key: &UtxoKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Accepts an enrollment that was verified by the block validator,
    /// recording the chain if this node generated it (`chain` non-empty)
    /// or just the commitment otherwise.
    pub fn accept(&mut self, enrollment: &Enrollment, enrolled_at_height: u64, chain: Vec<Hash>) {
        self.entries.insert(
            enrollment.utxo_key,
            ValidatorEntry {
                enrolled_at_height,
                cycle_length: enrollment.cycle_length,
                random_seed: enrollment.random_seed,
                preimages: chain,
            },
        );
    }

    /// Evicts entries that have expired as of `height`.
    pub fn expire(&mut self, height: u64) {
        self.entries.retain(|_, entry| entry.is_active_at(height));
    }

    /// Reveals this node's pre-image for `utxo_key` at `height`, provided
    /// this manager holds the full chain (i.e. this node is the enroller).
    pub fn reveal_preimage_at(&self, utxo_key: &UtxoKey, height: u64) -> ConsensusResult<Hash> {
        let entry = self.entries.get(utxo_key).ok_or(ConsensusError::NotEnrolled)?;
        if entry.preimages.is_empty() {
            return Err(ConsensusError::NoLocalChain);
        }
        if !entry.is_active_at(height) || height < entry.enrolled_at_height {
            return Err(ConsensusError::OutOfCycle);
        }
        let k = (height - entry.enrolled_at_height) as usize;
        let idx = entry.cycle_length as usize - 1 - k;
        Ok(entry.preimages[idx])
    }

    /// Validates a peer-reported reveal against the stored commitment. A
    /// reveal whose hash chain does not reach the committed head is a
    /// slashable fault; here it is simply rejected (spec §4.5).
    pub fn check_reveal(&self, utxo_key: &UtxoKey, height: u64, revealed: &Hash) -> ConsensusResult<()> {
        let entry = self.entries.get(utxo_key).ok_or(ConsensusError::NotEnrolled)?;
        if height < entry.enrolled_at_height {
            return Err(ConsensusError::OutOfCycle);
        }
        let k = (height - entry.enrolled_at_height) as u32;
        if verify_preimage_reveal(&entry.random_seed, revealed, k) {
            Ok(())
        } else {
            Err(ConsensusError::BadPreimageReveal)
        }
    }
}
