//! Ledger (spec §4.7).
//!
//! Single writer: `accept_block` takes `&mut self` and is the only path
//! that mutates the UTXO set, the enrollment manager, or the transaction
//! pool. Generalizes the teacher's single struct owning `utxos`/`height`/
//! `tip` by adding the enrollment manager and an ordered pool.

use std::collections::BTreeMap;

use agora_core::config::Config;
use agora_core::crypto::hash_full;
use agora_core::{Block, Hash, Transaction, UtxoKey, UtxoSet};

use crate::enrollment::EnrollmentManager;
use crate::error::{ConsensusError, ConsensusResult};
use crate::validator::is_invalid_reason;

/// Owns every piece of mutable chain state for one node (spec §5 "Shared
/// resources": "owned exclusively by the ledger").
pub struct Ledger {
    config: Config,
    utxos: UtxoSet,
    enrollments: EnrollmentManager,
    /// Sorted by hash so block-time consumption order matches arrival-
    /// independent, deterministic ordering (spec §5 "Ordering guarantees").
    pool: BTreeMap<Hash, Transaction>,
    /// Append-only block store (spec §6 "Block store"); an in-memory
    /// stand-in for a file-backed implementation.
    blocks: Vec<Block>,
}

impl Ledger {
    /// Creates a ledger seeded with an already-validated genesis block.
    /// The genesis block is itself re-validated so a bad genesis never
    /// silently becomes the chain's root (spec §9: "the ledger is passed
    /// its genesis").
    pub fn new(config: Config, genesis: Block) -> ConsensusResult<Self> {
        if let Some(reason) = crate::validator::is_genesis_invalid_reason(&genesis, &config) {
            return Err(ConsensusError::BlockRejected(reason));
        }
        let mut ledger = Ledger {
            config,
            utxos: UtxoSet::new(),
            enrollments: EnrollmentManager::new(),
            pool: BTreeMap::new(),
            blocks: Vec::new(),
        };
        ledger.apply_accepted(genesis);
        Ok(ledger)
    }

    pub fn get_block_height(&self) -> u64 {
        self.blocks.len().saturating_sub(1) as u64
    }

    pub fn get_blocks_from(&self, start: u64, max: usize) -> Vec<Block> {
        self.blocks
            .iter()
            .skip(start as usize)
            .take(max)
            .cloned()
            .collect()
    }

    pub fn tip_hash(&self) -> Hash {
        self.blocks.last().map(|b| b.header.hash()).unwrap_or(Hash::ZERO)
    }

    pub fn validator_count(&self, height: u64) -> usize {
        self.enrollments.validator_count(height)
    }

    /// Validates `tx` against the live UTXO set plus the current pool
    /// (so an in-pool transaction may fund another), then inserts it.
    pub fn put_transaction(&mut self, tx: Transaction) -> ConsensusResult<()> {
        if !tx.is_valid(self.config.min_freeze_amount) {
            return Err(ConsensusError::BlockRejected("transaction fails structural validation".into()));
        }
        let height = self.get_block_height();
        for input in &tx.inputs {
            let key = input.utxo_key();
            let spent_in_pool = self.pool.values().any(|pending| {
                pending.inputs.iter().any(|i| i.utxo_key() == key)
            });
            if spent_in_pool {
                return Err(ConsensusError::BlockRejected(format!("utxo {:?} already spent in pool", key.0)));
            }
            let utxo = self.find_utxo_with_pool(&key);
            match utxo {
                Some(utxo) if utxo.is_mature_at(height) => {}
                Some(_) => return Err(ConsensusError::BlockRejected(format!("utxo {:?} not yet mature", key.0))),
                None => return Err(ConsensusError::BlockRejected(format!("utxo {:?} not found", key.0))),
            }
        }
        self.pool.insert(tx.hash(), tx);
        Ok(())
    }

    fn find_utxo_with_pool(&self, key: &UtxoKey) -> Option<agora_core::UtxoValue> {
        if let Some(v) = self.utxos.find(key) {
            return Some(v.clone());
        }
        for pending in self.pool.values() {
            let tx_hash = hash_full(pending);
            for (index, output) in pending.outputs.iter().enumerate() {
                if &UtxoKey::new(tx_hash, index as u64) == key {
                    return Some(agora_core::UtxoValue {
                        unlock_height: self.get_block_height() + 1,
                        kind: pending.kind,
                        output: output.clone(),
                    });
                }
            }
        }
        None
    }

    /// Accepts a block proposed locally or received from a peer: validates
    /// it against current chain state, then applies it (spec §4.7).
    pub fn accept_block(&mut self, block: Block) -> ConsensusResult<()> {
        let prev_height = self.get_block_height();
        let prev_hash = self.tip_hash();
        let active = self.enrollments.validator_count(block.header.height);
        if let Some(reason) = is_invalid_reason(&block, prev_height, prev_hash, |k| self.utxos.find(k).cloned(), active, &self.config) {
            log::warn!("rejected candidate block at height {}: {reason}", block.header.height);
            return Err(ConsensusError::BlockRejected(reason));
        }
        self.apply_accepted(block);
        Ok(())
    }

    /// Re-validates and applies a block the consensus engine externalized.
    /// A failure here is a ledger invariant violation: the node itself
    /// voted for this block and must now halt (spec §6 "Exit behavior").
    pub fn on_externalized(&mut self, block: Block) -> ConsensusResult<()> {
        let prev_height = self.get_block_height();
        let prev_hash = self.tip_hash();
        let active = self.enrollments.validator_count(block.header.height);
        let is_genesis = block.header.height == 0 && self.blocks.is_empty();
        let reason = if is_genesis {
            crate::validator::is_genesis_invalid_reason(&block, &self.config)
        } else {
            is_invalid_reason(&block, prev_height, prev_hash, |k| self.utxos.find(k).cloned(), active, &self.config)
        };
        if let Some(reason) = reason {
            log::error!("externalized block at height {} failed re-validation: {reason}", block.header.height);
            return Err(ConsensusError::Core(agora_core::Error::Fatal(format!(
                "externalized block failed re-validation: {reason}"
            ))));
        }
        self.apply_accepted(block);
        Ok(())
    }

    fn apply_accepted(&mut self, block: Block) {
        let is_genesis = self.blocks.is_empty();
        for tx in &block.txs {
            for input in &tx.inputs {
                let _ = self.utxos.consume(&input.utxo_key());
            }
            self.utxos.put(tx, block.header.height, self.config.maturity_delay, is_genesis);
            self.pool.remove(&tx.hash());
        }
        for enrollment in &block.header.enrollments {
            self.enrollments.accept(enrollment, block.header.height, Vec::new());
        }
        self.enrollments.expire(block.header.height);
        self.evict_now_invalid_pool_entries();
        self.blocks.push(block);
    }

    /// Drops pool transactions whose inputs were consumed by the block
    /// just applied, or that now duplicate an already-committed hash.
    fn evict_now_invalid_pool_entries(&mut self) {
        let stale: Vec<Hash> = self
            .pool
            .iter()
            .filter(|(_, tx)| {
                tx.inputs
                    .iter()
                    .any(|input| self.utxos.find(&input.utxo_key()).is_none())
            })
            .map(|(hash, _)| *hash)
            .collect();
        for hash in stale {
            self.pool.remove(&hash);
        }
    }
}

pub mod shared {
    //! A `tokio::sync::Mutex`-guarded [`Ledger`] for async call sites (the
    //! network client, RPC handlers) that only ever suspend between
    //! operations, never while holding the lock (spec §5 "no cross-
    //! component locks... held during a suspension").
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::Ledger;

    #[derive(Clone)]
    pub struct SharedLedger(Arc<Mutex<Ledger>>);

    impl SharedLedger {
        pub fn new(ledger: Ledger) -> Self {
            Self(Arc::new(Mutex::new(ledger)))
        }

        pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Ledger> {
            self.0.lock().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::make_genesis_block;
    use agora_core::crypto::{key_pair_from_seed, Seed};

    fn test_config() -> Config {
        Config {
            tx_in_block: 1,
            min_validator_count: 1,
            min_freeze_amount: 1_000,
            maturity_delay: 5,
            ..Config::default()
        }
    }

    #[test]
    fn genesis_seeds_ledger_state() {
        let cfg = test_config();
        let kp = key_pair_from_seed(&Seed([11u8; 32]));
        let genesis = make_genesis_block(&cfg, &[kp], 4);
        let ledger = Ledger::new(cfg, genesis).expect("valid genesis");
        assert_eq!(ledger.get_block_height(), 0);
        assert_eq!(ledger.validator_count(0), 1);
    }
}
