//! Block validator (spec §4.6).
//!
//! Pure, side-effect-free predicates. No `&mut` state, no I/O; callers
//! supply a UTXO lookup closure and the current active-enrollment count
//! so the validator never owns ledger state itself.

use std::collections::HashSet;

use agora_core::config::Config;
use agora_core::crypto::verify;
use agora_core::{Block, Hash, Transaction, UtxoKey, UtxoValue};

use crate::enrollment::verify_enrollment_signature;

/// Rule 5 applied to a single transaction against the running overlay.
/// Returns the first failing reason, or `None` if the tx is acceptable,
/// and records its would-be spends/creations into `spent`/`created` so
/// later transactions in the same block see them.
fn validate_tx_against_overlay(
    tx: &Transaction,
    height: u64,
    min_freeze_amount: u64,
    maturity_delay: u64,
    find_utxo: &impl Fn(&UtxoKey) -> Option<UtxoValue>,
    spent: &mut HashSet<UtxoKey>,
    created: &mut std::collections::HashMap<UtxoKey, UtxoValue>,
) -> Option<String> {
    if !tx.is_valid(min_freeze_amount) {
        return Some(format!("transaction {:?} fails structural validation", tx.hash()));
    }
    if tx.outputs.iter().any(|o| o.amount == 0) {
        return Some(format!("transaction {:?} has a zero-value output", tx.hash()));
    }

    let msg = tx.signing_message();
    let mut input_total: u64 = 0;
    for input in &tx.inputs {
        let key = input.utxo_key();
        if spent.contains(&key) {
            return Some(format!("double spend of utxo {:?}", key.0));
        }
        let utxo = created.get(&key).cloned().or_else(|| find_utxo(&key));
        let utxo = match utxo {
            Some(utxo) => utxo,
            None => return Some(format!("input utxo {:?} not found", key.0)),
        };
        if !utxo.is_mature_at(height) {
            return Some(format!("input utxo {:?} is not yet mature", key.0));
        }
        if !verify(&utxo.output.destination, &input.signature, &msg) {
            return Some(format!("signature invalid for input {:?}", key.0));
        }
        input_total = match input_total.checked_add(utxo.output.amount) {
            Some(sum) => sum,
            None => return Some(format!("input amounts overflow for transaction {:?}", tx.hash())),
        };
        spent.insert(key);
    }

    // Sum(inputs) >= Sum(outputs): no coin creation outside genesis.
    // `tx.is_valid` above already bounds the output sum within u64.
    let output_total: u64 = tx.outputs.iter().map(|o| o.amount).sum();
    if output_total > input_total {
        return Some(format!(
            "transaction {:?} creates value: inputs sum to {input_total}, outputs sum to {output_total}",
            tx.hash()
        ));
    }

    let tx_hash = tx.hash();
    for (index, output) in tx.outputs.iter().enumerate() {
        let unlock_height = match tx.kind {
            agora_core::TxKind::Payment => height + 1,
            agora_core::TxKind::Freeze => height + maturity_delay,
        };
        created.insert(
            UtxoKey::new(tx_hash, index as u64),
            UtxoValue {
                unlock_height,
                kind: tx.kind,
                output: output.clone(),
            },
        );
    }

    None
}

fn merkle_root_matches(block: &Block) -> bool {
    let mut hashes: Vec<Hash> = block.txs.iter().map(Transaction::hash).collect();
    hashes.sort();
    let tree = agora_core::build_merkle_tree(&hashes);
    let fresh_root = tree.last().and_then(|l| l.first().copied()).unwrap_or(Hash::ZERO);
    fresh_root == block.header.merkle_root
}

/// `is_invalid_reason` per spec §4.6, checked in the documented rule order.
pub fn is_invalid_reason(
    block: &Block,
    prev_height: u64,
    prev_hash: Hash,
    find_utxo: impl Fn(&UtxoKey) -> Option<UtxoValue>,
    active_enrollments: usize,
    config: &Config,
) -> Option<String> {
    // 1. height = prev_height + 1
    if block.header.height != prev_height + 1 {
        return Some(format!(
            "expected height {}, got {}",
            prev_height + 1,
            block.header.height
        ));
    }
    // 2. prev_block_hash = prev_hash
    if block.header.prev_block_hash != prev_hash {
        return Some("prev_block_hash does not match chain tip".into());
    }
    // 3. |txs| = TxsInBlock
    if block.txs.len() != config.tx_in_block as usize {
        return Some(format!(
            "expected {} transactions, got {}",
            config.tx_in_block,
            block.txs.len()
        ));
    }
    // 4. txs sorted strictly ascending by hash
    for pair in block.txs.windows(2) {
        if pair[0].hash() >= pair[1].hash() {
            return Some("transactions are not strictly ascending by hash".into());
        }
    }
    // 5. every tx passes transaction validation
    let mut spent = HashSet::new();
    let mut created = std::collections::HashMap::new();
    for tx in &block.txs {
        if let Some(reason) = validate_tx_against_overlay(
            tx,
            block.header.height,
            config.min_freeze_amount,
            config.maturity_delay,
            &find_utxo,
            &mut spent,
            &mut created,
        ) {
            return Some(reason);
        }
    }
    // 6. merkle_root matches a freshly computed tree
    if !merkle_root_matches(block) {
        return Some("merkle root does not match a freshly computed tree".into());
    }
    // 7. enrollments strictly ascending by utxo_key
    for pair in block.header.enrollments.windows(2) {
        if pair[0].utxo_key >= pair[1].utxo_key {
            return Some("enrollments are not strictly ascending by utxo_key".into());
        }
    }
    // 8. |enrollments| + active_enrollments >= MinValidatorCount
    if block.header.enrollments.len() + active_enrollments < config.min_validator_count as usize {
        return Some("resulting validator count would fall below the minimum".into());
    }
    // 9. every enrollment passes enrollment validation
    for enrollment in &block.header.enrollments {
        let utxo = created
            .get(&enrollment.utxo_key)
            .cloned()
            .or_else(|| find_utxo(&enrollment.utxo_key));
        let utxo = match utxo {
            Some(utxo) => utxo,
            None => return Some(format!("enrollment utxo {:?} not found", enrollment.utxo_key.0)),
        };
        if utxo.kind != agora_core::TxKind::Freeze {
            return Some(format!("enrollment utxo {:?} is not a freeze output", enrollment.utxo_key.0));
        }
        if utxo.output.amount < config.min_freeze_amount {
            return Some(format!("enrollment utxo {:?} is below the minimum freeze amount", enrollment.utxo_key.0));
        }
        if !verify_enrollment_signature(enrollment, &utxo.output.destination) {
            return Some(format!("enrollment signature invalid for utxo {:?}", enrollment.utxo_key.0));
        }
    }

    None
}

/// `is_genesis_invalid_reason` per spec §4.6.
pub fn is_genesis_invalid_reason(block: &Block, config: &Config) -> Option<String> {
    if block.header.height != 0 {
        return Some("genesis height must be 0".into());
    }
    if block.header.prev_block_hash != Hash::ZERO {
        return Some("genesis prev_block_hash must be zero".into());
    }
    if block.txs.is_empty() || block.txs.len() > config.tx_in_block as usize {
        return Some(format!(
            "genesis must have between 1 and {} transactions",
            config.tx_in_block
        ));
    }
    for tx in &block.txs {
        if !tx.inputs.is_empty() {
            return Some(format!("genesis transaction {:?} must have zero inputs", tx.hash()));
        }
        if tx.outputs.is_empty() || tx.outputs.iter().all(|o| o.amount == 0) {
            return Some(format!(
                "genesis transaction {:?} must have at least one positive-value output",
                tx.hash()
            ));
        }
    }
    if !merkle_root_matches(block) {
        return Some("genesis merkle root does not match a freshly computed tree".into());
    }

    let mut created = std::collections::HashMap::new();
    for tx in &block.txs {
        let tx_hash = tx.hash();
        for (index, output) in tx.outputs.iter().enumerate() {
            created.insert(
                UtxoKey::new(tx_hash, index as u64),
                UtxoValue {
                    unlock_height: 0,
                    kind: tx.kind,
                    output: output.clone(),
                },
            );
        }
    }
    for enrollment in &block.header.enrollments {
        let utxo = match created.get(&enrollment.utxo_key) {
            Some(utxo) => utxo,
            None => {
                return Some(format!(
                    "genesis enrollment utxo {:?} does not reference a genesis output",
                    enrollment.utxo_key.0
                ))
            }
        };
        if utxo.kind != agora_core::TxKind::Freeze {
            return Some(format!("genesis enrollment utxo {:?} is not a freeze output", enrollment.utxo_key.0));
        }
        if !verify_enrollment_signature(enrollment, &utxo.output.destination) {
            return Some(format!("genesis enrollment signature invalid for utxo {:?}", enrollment.utxo_key.0));
        }
    }

    None
}
