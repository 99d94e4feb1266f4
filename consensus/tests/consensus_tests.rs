//! End-to-end coverage that exercises the ledger through `accept_block`
//! rather than the pure validator predicates directly.

use agora_consensus::{make_genesis_block, Ledger};
use agora_core::config::Config;
use agora_core::crypto::{hash_bytes, key_pair_from_seed, sign, Seed};
use agora_core::{Block, BlockHeader, CanonicalSerialize, Hash, Transaction, TxInput, TxKind, TxOutput, UtxoKey};

fn base_config() -> Config {
    Config {
        min_validator_count: 1,
        min_freeze_amount: 1_000,
        maturity_delay: 0,
        ..Config::default()
    }
}

#[test]
fn genesis_is_deterministic_at_larger_scale() {
    let cfg = Config {
        tx_in_block: 6,
        ..base_config()
    };
    let validators: Vec<_> = (0u8..5)
        .map(|i| key_pair_from_seed(&Seed([i; 32])))
        .collect();

    let a = make_genesis_block(&cfg, &validators, 200);
    let b = make_genesis_block(&cfg, &validators, 200);

    assert_eq!(a.canonical_encode(), b.canonical_encode());
    assert_eq!(a.header.enrollments.len(), 5);
}

#[test]
fn double_spend_within_a_block_is_rejected_and_ledger_state_is_unchanged() {
    let cfg = Config {
        tx_in_block: 2,
        ..base_config()
    };
    // A single genesis validator: `make_genesis_block` produces a
    // distribution tx (a spendable payment output owned by the validator)
    // plus the validator's own freeze tx, so `tx_in_block = 2` matches
    // genesis exactly and also matches the two-way double spend below.
    let validators = vec![key_pair_from_seed(&Seed([1u8; 32]))];
    let genesis = make_genesis_block(&cfg, &validators, 200);
    let mut ledger = Ledger::new(cfg, genesis.clone()).expect("genesis accepted");

    let payer = &validators[0];
    let distribution = genesis
        .txs
        .iter()
        .find(|tx| tx.kind == TxKind::Payment)
        .expect("genesis carries a distribution tx");
    let funding_tx_hash = distribution.hash();

    let recipient_a = key_pair_from_seed(&Seed([4u8; 32]));
    let recipient_b = key_pair_from_seed(&Seed([5u8; 32]));

    let unsigned_a = Transaction {
        kind: TxKind::Payment,
        inputs: vec![TxInput { prev_tx: funding_tx_hash, output_index: 0, signature: agora_core::Signature([0; 64]) }],
        outputs: vec![TxOutput { amount: 1_000, destination: recipient_a.public }],
    };
    let sig_a = sign(&payer.secret, &unsigned_a.signing_message());
    let spend_a = Transaction {
        inputs: vec![TxInput { prev_tx: funding_tx_hash, output_index: 0, signature: sig_a }],
        ..unsigned_a
    };

    let unsigned_b = Transaction {
        kind: TxKind::Payment,
        inputs: vec![TxInput { prev_tx: funding_tx_hash, output_index: 0, signature: agora_core::Signature([0; 64]) }],
        outputs: vec![TxOutput { amount: 1_000, destination: recipient_b.public }],
    };
    let sig_b = sign(&payer.secret, &unsigned_b.signing_message());
    let spend_b = Transaction {
        inputs: vec![TxInput { prev_tx: funding_tx_hash, output_index: 0, signature: sig_b }],
        ..unsigned_b
    };

    let mut double_spend_txs = vec![spend_a, spend_b];
    double_spend_txs.sort_by_key(Transaction::hash);
    let bad_block = Block::make_new_block(&genesis.header, double_spend_txs, vec![]);

    let err = ledger.accept_block(bad_block).unwrap_err().to_string();
    assert!(err.contains("double"), "unexpected rejection reason: {err}");
    assert_eq!(ledger.get_block_height(), 0);
}

#[test]
fn expired_validators_are_replaced_by_newly_enrolled_ones() {
    let cfg = Config {
        tx_in_block: 2,
        ..base_config()
    };

    let kp1 = key_pair_from_seed(&Seed([11u8; 32]));
    let kp2 = key_pair_from_seed(&Seed([12u8; 32]));
    let kp3 = key_pair_from_seed(&Seed([13u8; 32]));
    let kp4 = key_pair_from_seed(&Seed([14u8; 32]));
    let kp5 = key_pair_from_seed(&Seed([15u8; 32]));

    // Genesis enrolls kp1/kp2 directly (a zero-input Freeze tx, as genesis
    // uniquely allows) and also funds kp3/kp4/kp5 with plain payment
    // outputs they can later freeze for themselves.
    let enroll_tx = Transaction {
        kind: TxKind::Freeze,
        inputs: vec![],
        outputs: vec![
            TxOutput { amount: cfg.min_freeze_amount, destination: kp1.public },
            TxOutput { amount: cfg.min_freeze_amount, destination: kp2.public },
        ],
    };
    let distribution_tx = Transaction {
        kind: TxKind::Payment,
        inputs: vec![],
        outputs: vec![
            TxOutput { amount: cfg.min_freeze_amount, destination: kp3.public },
            TxOutput { amount: cfg.min_freeze_amount, destination: kp4.public },
            TxOutput { amount: cfg.min_freeze_amount, destination: kp5.public },
        ],
    };
    let enroll_tx_hash = enroll_tx.hash();
    let distribution_tx_hash = distribution_tx.hash();
    let key1 = UtxoKey::new(enroll_tx_hash, 0);
    let key2 = UtxoKey::new(enroll_tx_hash, 1);
    let (enroll1, _) = agora_consensus::enrollment::make_enrollment(&kp1, key1, hash_bytes(&kp1.public.0), 3);
    let (enroll2, _) = agora_consensus::enrollment::make_enrollment(&kp2, key2, hash_bytes(&kp2.public.0), 3);
    let mut enrollments = vec![enroll1, enroll2];
    enrollments.sort_by_key(|e| e.utxo_key);

    let mut leaves = vec![enroll_tx_hash, distribution_tx_hash];
    leaves.sort();
    let merkle_tree = agora_core::build_merkle_tree(&leaves);
    let merkle_root = merkle_tree.last().and_then(|l| l.first().copied()).unwrap_or(Hash::ZERO);
    let genesis = Block {
        header: BlockHeader {
            prev_block_hash: Hash::ZERO,
            height: 0,
            merkle_root,
            validators_bitfield: vec![],
            aggregate_signature: None,
            enrollments,
        },
        txs: vec![enroll_tx, distribution_tx],
        merkle_tree,
    };

    let mut ledger = Ledger::new(cfg, genesis.clone()).expect("genesis accepted");
    assert_eq!(ledger.validator_count(0), 2);

    // Block 1: kp3 and kp4 each freeze their genesis-funded payment output
    // and enroll it, satisfying `tx_in_block = 2` with two real spends.
    let freeze_and_enroll = |kp: &agora_core::KeyPair, prev_tx: Hash, output_index: u32| {
        let unsigned = Transaction {
            kind: TxKind::Freeze,
            inputs: vec![TxInput { prev_tx, output_index, signature: agora_core::Signature([0; 64]) }],
            outputs: vec![TxOutput { amount: cfg.min_freeze_amount, destination: kp.public }],
        };
        let sig = sign(&kp.secret, &unsigned.signing_message());
        let tx = Transaction {
            inputs: vec![TxInput { prev_tx, output_index, signature: sig }],
            ..unsigned
        };
        let key = UtxoKey::new(tx.hash(), 0);
        let (enrollment, _) = agora_consensus::enrollment::make_enrollment(kp, key, hash_bytes(&kp.public.0), 3);
        (tx, enrollment)
    };

    let (tx3, enrollment3) = freeze_and_enroll(&kp3, distribution_tx_hash, 0);
    let (tx4, enrollment4) = freeze_and_enroll(&kp4, distribution_tx_hash, 1);
    let mut block1_enrollments = vec![enrollment3, enrollment4];
    block1_enrollments.sort_by_key(|e| e.utxo_key);
    let mut block1_txs = vec![tx3.clone(), tx4];
    block1_txs.sort_by_key(Transaction::hash);
    let block1 = Block::make_new_block(&genesis.header, block1_txs, block1_enrollments);
    ledger.accept_block(block1.clone()).expect("block 1 accepted");
    assert_eq!(ledger.validator_count(1), 4);

    // Block 2: kp5 freezes its payout and enrolls; kp3 spends its own
    // now-mature freeze output forward as an ordinary payment, just to
    // supply the second transaction `tx_in_block = 2` requires.
    let (tx5, enrollment5) = freeze_and_enroll(&kp5, distribution_tx_hash, 2);
    let tx3_freeze_key = UtxoKey::new(tx3.hash(), 0);
    let unsigned_filler = Transaction {
        kind: TxKind::Payment,
        inputs: vec![TxInput { prev_tx: tx3.hash(), output_index: 0, signature: agora_core::Signature([0; 64]) }],
        outputs: vec![TxOutput { amount: cfg.min_freeze_amount, destination: kp3.public }],
    };
    let filler_sig = sign(&kp3.secret, &unsigned_filler.signing_message());
    let filler = Transaction {
        inputs: vec![TxInput { prev_tx: tx3.hash(), output_index: 0, signature: filler_sig }],
        ..unsigned_filler
    };
    let _ = tx3_freeze_key;

    let mut block2_txs = vec![tx5, filler];
    block2_txs.sort_by_key(Transaction::hash);
    let block2 = Block::make_new_block(&block1.header, block2_txs, vec![enrollment5]);
    ledger.accept_block(block2).expect("block 2 accepted");
    assert_eq!(ledger.validator_count(2), 5);

    // `kp1`/`kp2` (cycle_length = 3, enrolled at height 0) expire at
    // height 3; `validator_count` is a pure query over the current
    // enrollment table, so it can be checked at a height beyond the
    // ledger's current tip without constructing another block.
    assert_eq!(ledger.validator_count(3), 3);
}
