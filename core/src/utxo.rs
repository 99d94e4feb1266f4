//! The UTXO set (spec §4.4).
//!
//! Logically a mapping `UtxoKey -> UtxoValue`. Generalizes the teacher's
//! inline `HashMap` mutation inside block application into a reusable
//! component with an overlay for in-block scratch spends, since block
//! validation must be a pure predicate with no visible side effect on
//! rejection (spec §4.6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::crypto::{hash_full, Hash, PublicKey};
use crate::error::{Error, Result};
use crate::model::{Transaction, TxKind, TxOutput};
use crate::wire::CanonicalSerialize;

/// `hash(tx_hash, output_index_as_LE_u64)` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtxoKey(pub Hash);

impl UtxoKey {
    pub fn new(tx_hash: Hash, output_index: u64) -> Self {
        let mut out = Vec::with_capacity(64 + 8);
        tx_hash.canonical_write(&mut out);
        output_index.canonical_write(&mut out);
        UtxoKey(hash_full(&RawBytes(out)))
    }
}

/// Helper wrapper so raw pre-hashed bytes can reuse [`hash_full`]'s
/// canonical-encoding entry point without double-hashing through a second
/// type's own encoding.
struct RawBytes(Vec<u8>);

impl CanonicalSerialize for RawBytes {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        Ok((RawBytes(buf.to_vec()), buf.len()))
    }
}

/// `{ unlock_height, type, output }` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoValue {
    pub unlock_height: u64,
    pub kind: TxKind,
    pub output: TxOutput,
}

impl UtxoValue {
    pub fn is_mature_at(&self, height: u64) -> bool {
        height >= self.unlock_height
    }
}

/// In-memory UTXO set.
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    entries: HashMap<UtxoKey, UtxoValue>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts one UTXO per output of `tx`, keyed by `hash(tx_hash, index)`.
    /// `current_height` is the height of the block containing `tx`, or an
    /// arbitrary value for the genesis block (outputs there always unlock
    /// at height 0 regardless of `current_height`, per spec §4.4).
    pub fn put(&mut self, tx: &Transaction, current_height: u64, maturity_delay: u64, is_genesis: bool) {
        let tx_hash = hash_full(tx);
        for (index, output) in tx.outputs.iter().enumerate() {
            let unlock_height = if is_genesis {
                0
            } else {
                match tx.kind {
                    TxKind::Payment => current_height + 1,
                    TxKind::Freeze => current_height + maturity_delay,
                }
            };
            let key = UtxoKey::new(tx_hash, index as u64);
            self.entries.insert(
                key,
                UtxoValue {
                    unlock_height,
                    kind: tx.kind,
                    output: output.clone(),
                },
            );
        }
    }

    pub fn find(&self, key: &UtxoKey) -> Option<&UtxoValue> {
        self.entries.get(key)
    }

    /// Removes a spent UTXO, failing if it was already absent (double spend
    /// against the live set).
    pub fn consume(&mut self, key: &UtxoKey) -> Result<UtxoValue> {
        self.entries.remove(key).ok_or(Error::UtxoNotFound)
    }

    /// Iterates the UTXOs whose output is owned by `pubkey`, used by the
    /// enrollment manager to locate eligible freeze outputs.
    pub fn get_utxos_for<'a>(
        &'a self,
        pubkey: &'a PublicKey,
    ) -> impl Iterator<Item = (&'a UtxoKey, &'a UtxoValue)> + 'a {
        self.entries
            .iter()
            .filter(move |(_, value)| &value.output.destination == pubkey)
    }
}

/// Tracks in-block spends/creations during validation so a later
/// transaction in the same block may spend an earlier one's output,
/// without mutating the real set until the block is accepted (spec §4.4,
/// last paragraph).
#[derive(Debug, Clone, Default)]
pub struct ScratchOverlay {
    spent: std::collections::HashSet<UtxoKey>,
    created: HashMap<UtxoKey, UtxoValue>,
}

impl ScratchOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a UTXO key against the overlay first, then the base set.
    pub fn find<'a>(&'a self, base: &'a UtxoSet, key: &UtxoKey) -> Option<&'a UtxoValue> {
        if self.spent.contains(key) {
            return None;
        }
        self.created.get(key).or_else(|| base.find(key))
    }

    /// Records a scratch spend. Returns an error if the key was already
    /// spent earlier in the same block (in-block double spend, spec §4.6
    /// rule 5 / scenario S5).
    pub fn spend(&mut self, key: UtxoKey) -> Result<()> {
        if !self.spent.insert(key) {
            return Err(Error::DoubleSpend);
        }
        Ok(())
    }

    /// Records outputs created by a transaction appearing earlier in the
    /// same block, making them visible to later transactions in the block.
    pub fn create(
        &mut self,
        tx: &Transaction,
        current_height: u64,
        maturity_delay: u64,
        is_genesis: bool,
    ) {
        let tx_hash = hash_full(tx);
        for (index, output) in tx.outputs.iter().enumerate() {
            let unlock_height = if is_genesis {
                0
            } else {
                match tx.kind {
                    TxKind::Payment => current_height + 1,
                    TxKind::Freeze => current_height + maturity_delay,
                }
            };
            let key = UtxoKey::new(tx_hash, index as u64);
            self.created.insert(
                key,
                UtxoValue {
                    unlock_height,
                    kind: tx.kind,
                    output: output.clone(),
                },
            );
        }
    }
}
