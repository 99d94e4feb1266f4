//! Genesis block construction (spec §4.3).
//!
//! Lives in this crate rather than `agora-core` because it must build
//! enrollments, and `agora-core` cannot depend on `agora-consensus`
//! without a cycle.

use agora_core::config::Config;
use agora_core::crypto::hash_bytes;
use agora_core::{Block, BlockHeader, Hash, KeyPair, Transaction, TxKind, TxOutput, UtxoKey};

use crate::enrollment::make_enrollment;

/// Constructs a height-0 block: one payment-distribution transaction
/// funding every validator, one Freeze transaction per validator, and an
/// enrollment over each resulting freeze UTXO (spec §4.3). Fully
/// deterministic in `validator_keys` and `cycle_length` — calling this
/// twice with the same inputs yields byte-identical output (scenario S3),
/// since the per-validator pre-image chain base secret is derived from
/// the validator's own public key rather than drawn from an RNG.
pub fn make_genesis_block(config: &Config, validator_keys: &[KeyPair], cycle_length: u32) -> Block {
    let distribution = Transaction {
        kind: TxKind::Payment,
        inputs: vec![],
        outputs: validator_keys
            .iter()
            .map(|kp| TxOutput {
                amount: config.min_freeze_amount,
                destination: kp.public,
            })
            .collect(),
    };

    let freeze_txs: Vec<Transaction> = validator_keys
        .iter()
        .map(|kp| Transaction {
            kind: TxKind::Freeze,
            inputs: vec![],
            outputs: vec![TxOutput {
                amount: config.min_freeze_amount,
                destination: kp.public,
            }],
        })
        .collect();

    let mut enrollments: Vec<_> = validator_keys
        .iter()
        .zip(freeze_txs.iter())
        .map(|(kp, freeze_tx)| {
            let utxo_key = UtxoKey::new(freeze_tx.hash(), 0);
            let base_secret = hash_bytes(&kp.public.0);
            let (enrollment, _chain) = make_enrollment(kp, utxo_key, base_secret, cycle_length);
            enrollment
        })
        .collect();
    enrollments.sort_by_key(|e| e.utxo_key);

    let mut txs = vec![distribution];
    txs.extend(freeze_txs);
    txs.sort_by_key(Transaction::hash);

    let leaves: Vec<Hash> = txs.iter().map(Transaction::hash).collect();
    let merkle_tree = agora_core::build_merkle_tree(&leaves);
    let merkle_root = merkle_tree
        .last()
        .and_then(|level| level.first().copied())
        .unwrap_or(Hash::ZERO);

    Block {
        header: BlockHeader {
            prev_block_hash: Hash::ZERO,
            height: 0,
            merkle_root,
            validators_bitfield: Vec::new(),
            aggregate_signature: None,
            enrollments,
        },
        txs,
        merkle_tree,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::is_genesis_invalid_reason;
    use agora_core::crypto::{key_pair_from_seed, Seed};
    use agora_core::CanonicalSerialize;

    fn config() -> Config {
        Config {
            min_freeze_amount: 1_000,
            tx_in_block: 3,
            ..Config::default()
        }
    }

    fn validators() -> Vec<KeyPair> {
        vec![
            key_pair_from_seed(&Seed([1u8; 32])),
            key_pair_from_seed(&Seed([2u8; 32])),
        ]
    }

    #[test]
    fn genesis_is_deterministic() {
        let cfg = config();
        let a = make_genesis_block(&cfg, &validators(), 16);
        let b = make_genesis_block(&cfg, &validators(), 16);
        assert_eq!(a.canonical_encode(), b.canonical_encode());
    }

    #[test]
    fn genesis_passes_its_own_predicate() {
        let cfg = config();
        let genesis = make_genesis_block(&cfg, &validators(), 16);
        assert_eq!(is_genesis_invalid_reason(&genesis, &cfg), None);
    }
}
