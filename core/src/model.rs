//! Transaction and block model (spec §3, §4.3).

use serde::{Deserialize, Serialize};

use crate::crypto::{hash_full, Hash, PublicKey, SchnorrSignature, Signature};
use crate::error::{Error, Result};
use crate::utxo::UtxoKey;
use crate::wire::CanonicalSerialize;

/// Transaction kind discriminant (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Payment,
    Freeze,
}

impl CanonicalSerialize for TxKind {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        out.push(match self {
            TxKind::Payment => 0,
            TxKind::Freeze => 1,
        });
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.is_empty() {
            return Err(Error::MalformedWire("empty TxKind".into()));
        }
        let kind = match buf[0] {
            0 => TxKind::Payment,
            1 => TxKind::Freeze,
            other => return Err(Error::MalformedWire(format!("bad TxKind discriminant {other}"))),
        };
        Ok((kind, 1))
    }
}

/// A reference to a previous output being spent, plus the signature
/// authorizing the spend (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_tx: Hash,
    pub output_index: u32,
    pub signature: Signature,
}

impl TxInput {
    pub fn utxo_key(&self) -> UtxoKey {
        UtxoKey::new(self.prev_tx, self.output_index as u64)
    }
}

impl CanonicalSerialize for TxInput {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        self.prev_tx.canonical_write(out);
        self.output_index.canonical_write(out);
        self.signature.canonical_write(out);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (prev_tx, n1) = Hash::canonical_read(buf)?;
        let (output_index, n2) = u32::canonical_read(&buf[n1..])?;
        let (signature, n3) = Signature::canonical_read(&buf[n1 + n2..])?;
        Ok((
            TxInput {
                prev_tx,
                output_index,
                signature,
            },
            n1 + n2 + n3,
        ))
    }
}

/// A spendable output created by a transaction (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub destination: PublicKey,
}

impl CanonicalSerialize for TxOutput {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        self.amount.canonical_write(out);
        self.destination.canonical_write(out);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (amount, n1) = u64::canonical_read(buf)?;
        let (destination, n2) = PublicKey::canonical_read(&buf[n1..])?;
        Ok((TxOutput { amount, destination }, n1 + n2))
    }
}

/// A transfer of value: destroys the UTXOs its inputs reference and
/// creates the outputs it lists (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TxKind,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    pub fn hash(&self) -> Hash {
        hash_full(self)
    }

    /// `isValid()` per spec §3: amounts never overflow when summed and the
    /// minimum freeze amount is met for `Freeze` transactions. Individual
    /// UTXO existence, signature, and balance checks belong to the
    /// validator, not this structural check.
    pub fn is_valid(&self, min_freeze_amount: u64) -> bool {
        let mut total: u64 = 0;
        for output in &self.outputs {
            total = match total.checked_add(output.amount) {
                Some(sum) => sum,
                None => return false,
            };
        }
        if self.kind == TxKind::Freeze {
            return self.outputs.iter().all(|o| o.amount >= min_freeze_amount);
        }
        true
    }

    /// The message every input's signature authenticates: the transaction
    /// with all signatures zeroed out, so a signature never covers itself
    /// (spec §4.6 rule 5: "signatures authenticate the full tx minus
    /// signatures").
    pub fn signing_message(&self) -> Vec<u8> {
        let blanked = Transaction {
            kind: self.kind,
            inputs: self
                .inputs
                .iter()
                .map(|input| TxInput {
                    prev_tx: input.prev_tx,
                    output_index: input.output_index,
                    signature: Signature([0u8; 64]),
                })
                .collect(),
            outputs: self.outputs.clone(),
        };
        blanked.canonical_encode()
    }
}

impl CanonicalSerialize for Transaction {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        self.kind.canonical_write(out);
        self.inputs.canonical_write(out);
        self.outputs.canonical_write(out);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (kind, n1) = TxKind::canonical_read(buf)?;
        let (inputs, n2) = Vec::<TxInput>::canonical_read(&buf[n1..])?;
        let (outputs, n3) = Vec::<TxOutput>::canonical_read(&buf[n1 + n2..])?;
        Ok((
            Transaction { kind, inputs, outputs },
            n1 + n2 + n3,
        ))
    }
}

/// A validator's commitment of a frozen UTXO as stake for one cycle
/// (spec §3, §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub utxo_key: UtxoKey,
    pub random_seed: Hash,
    pub cycle_length: u32,
    pub enroll_sig: SchnorrSignature,
}

impl CanonicalSerialize for Enrollment {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        self.utxo_key.0.canonical_write(out);
        self.random_seed.canonical_write(out);
        self.cycle_length.canonical_write(out);
        self.enroll_sig.canonical_write(out);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (utxo_hash, n1) = Hash::canonical_read(buf)?;
        let (random_seed, n2) = Hash::canonical_read(&buf[n1..])?;
        let (cycle_length, n3) = u32::canonical_read(&buf[n1 + n2..])?;
        let (enroll_sig, n4) = SchnorrSignature::canonical_read(&buf[n1 + n2 + n3..])?;
        Ok((
            Enrollment {
                utxo_key: UtxoKey(utxo_hash),
                random_seed,
                cycle_length,
                enroll_sig,
            },
            n1 + n2 + n3 + n4,
        ))
    }
}

impl Enrollment {
    /// The message the Schnorr signature authenticates: everything except
    /// the signature itself.
    pub fn signing_message(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.utxo_key.0.canonical_write(&mut out);
        self.random_seed.canonical_write(&mut out);
        self.cycle_length.canonical_write(&mut out);
        out
    }
}

/// Block header (spec §3). Height 0 is genesis and has
/// `prev_block_hash = Hash::ZERO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub prev_block_hash: Hash,
    pub height: u64,
    pub merkle_root: Hash,
    pub validators_bitfield: Vec<u8>,
    pub aggregate_signature: Option<Signature>,
    pub enrollments: Vec<Enrollment>,
}

impl CanonicalSerialize for BlockHeader {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        self.prev_block_hash.canonical_write(out);
        self.height.canonical_write(out);
        self.merkle_root.canonical_write(out);
        self.validators_bitfield.canonical_write(out);
        self.aggregate_signature.canonical_write(out);
        self.enrollments.canonical_write(out);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (prev_block_hash, n1) = Hash::canonical_read(buf)?;
        let (height, n2) = u64::canonical_read(&buf[n1..])?;
        let (merkle_root, n3) = Hash::canonical_read(&buf[n1 + n2..])?;
        let mut offset = n1 + n2 + n3;
        let (validators_bitfield, n4) = Vec::<u8>::canonical_read(&buf[offset..])?;
        offset += n4;
        let (aggregate_signature, n5) = Option::<Signature>::canonical_read(&buf[offset..])?;
        offset += n5;
        let (enrollments, n6) = Vec::<Enrollment>::canonical_read(&buf[offset..])?;
        offset += n6;
        Ok((
            BlockHeader {
                prev_block_hash,
                height,
                merkle_root,
                validators_bitfield,
                aggregate_signature,
                enrollments,
            },
            offset,
        ))
    }
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        hash_full(self)
    }
}

/// One level of a Merkle inclusion proof: the sibling hash and whether it
/// sits to the left or right of the running hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MerkleSide {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProofStep {
    pub sibling: Hash,
    pub side: MerkleSide,
}

/// Inclusion proof for a single transaction against a block's merkle root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf: Hash,
    pub steps: Vec<MerkleProofStep>,
}

impl MerkleProof {
    /// Recomputes the root this proof implies and compares it to `root`.
    pub fn verify(&self, root: &Hash) -> bool {
        let mut current = self.leaf;
        for step in &self.steps {
            current = match step.side {
                MerkleSide::Left => hash_concat(&step.sibling, &current),
                MerkleSide::Right => hash_concat(&current, &step.sibling),
            };
        }
        &current == root
    }
}

fn hash_concat(left: &Hash, right: &Hash) -> Hash {
    let mut bytes = Vec::with_capacity(128);
    bytes.extend_from_slice(&left.0);
    bytes.extend_from_slice(&right.0);
    crate::crypto::hash_bytes(&bytes)
}

/// A block: header plus the ordered transactions it commits, plus the full
/// merkle tree (spec §3 / §4.3: "retained alongside the block for
/// efficient inclusion proofs"), stored level by level from the leaves up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Transaction>,
    pub merkle_tree: Vec<Vec<Hash>>,
}

impl CanonicalSerialize for Block {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        self.header.canonical_write(out);
        self.txs.canonical_write(out);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (header, n1) = BlockHeader::canonical_read(buf)?;
        let (txs, n2) = Vec::<Transaction>::canonical_read(&buf[n1..])?;
        let merkle_tree = build_merkle_tree(&sorted_tx_hashes(&txs));
        Ok((
            Block {
                header,
                txs,
                merkle_tree,
            },
            n1 + n2,
        ))
    }
}

fn sorted_tx_hashes(txs: &[Transaction]) -> Vec<Hash> {
    let mut hashes: Vec<Hash> = txs.iter().map(Transaction::hash).collect();
    hashes.sort();
    hashes
}

/// Builds the full merkle tree (leaves through root) over already-sorted
/// leaf hashes. Internal nodes are `hash(left ‖ right)`; an odd level
/// duplicates its last node (spec §4.3).
pub fn build_merkle_tree(leaves: &[Hash]) -> Vec<Vec<Hash>> {
    if leaves.is_empty() {
        return vec![vec![Hash::ZERO]];
    }
    let mut levels = vec![leaves.to_vec()];
    loop {
        let current = levels.last().unwrap();
        if current.len() == 1 {
            break;
        }
        let mut next = Vec::with_capacity(current.len().div_ceil(2));
        let mut i = 0;
        while i < current.len() {
            let left = &current[i];
            let right = if i + 1 < current.len() {
                &current[i + 1]
            } else {
                left
            };
            next.push(hash_concat(left, right));
            i += 2;
        }
        levels.push(next);
    }
    levels
}

/// Builds an inclusion proof for `tx_hash` against a pre-built tree,
/// returning `None` if the hash is not among the leaves.
pub fn build_merkle_proof(tree: &[Vec<Hash>], tx_hash: &Hash) -> Option<MerkleProof> {
    let leaves = tree.first()?;
    let mut index = leaves.iter().position(|h| h == tx_hash)?;
    let mut steps = Vec::new();
    for level in tree.iter().take(tree.len().saturating_sub(1)) {
        let is_right_child = index % 2 == 1;
        let sibling_index = if is_right_child { index - 1 } else { index + 1 };
        let sibling = level.get(sibling_index).copied().unwrap_or(level[index]);
        steps.push(MerkleProofStep {
            sibling,
            side: if is_right_child {
                MerkleSide::Left
            } else {
                MerkleSide::Right
            },
        });
        index /= 2;
    }
    Some(MerkleProof {
        leaf: *tx_hash,
        steps,
    })
}

impl Block {
    pub fn merkle_root(&self) -> Hash {
        self.merkle_tree.last().and_then(|l| l.first().copied()).unwrap_or(Hash::ZERO)
    }

    pub fn inclusion_proof(&self, tx_hash: &Hash) -> Option<MerkleProof> {
        build_merkle_proof(&self.merkle_tree, tx_hash)
    }

    /// Sets `prev_block_hash`, `height`, and `merkle_root` from `prev` and
    /// constructs the block (spec §4.3).
    pub fn make_new_block(prev: &BlockHeader, mut txs: Vec<Transaction>, enrollments: Vec<Enrollment>) -> Self {
        txs.sort_by_key(Transaction::hash);
        let leaves = sorted_tx_hashes(&txs);
        let merkle_tree = build_merkle_tree(&leaves);
        let merkle_root = merkle_tree.last().and_then(|l| l.first().copied()).unwrap_or(Hash::ZERO);
        Block {
            header: BlockHeader {
                prev_block_hash: prev.hash(),
                height: prev.height + 1,
                merkle_root,
                validators_bitfield: Vec::new(),
                aggregate_signature: None,
                enrollments,
            },
            txs,
            merkle_tree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PublicKey;

    fn payment(amount: u64, dest: u8) -> Transaction {
        Transaction {
            kind: TxKind::Payment,
            inputs: vec![],
            outputs: vec![TxOutput {
                amount,
                destination: PublicKey([dest; 32]),
            }],
        }
    }

    #[test]
    fn tx_round_trips_through_canonical_encoding() {
        let tx = payment(42, 9);
        let encoded = tx.canonical_encode();
        let decoded = Transaction::canonical_decode(&encoded).unwrap();
        assert_eq!(tx, decoded);
    }

    #[test]
    fn freeze_below_minimum_is_invalid() {
        let mut tx = payment(10, 1);
        tx.kind = TxKind::Freeze;
        assert!(!tx.is_valid(40_000));
        assert!(tx.is_valid(5));
    }

    #[test]
    fn overflowing_outputs_are_invalid() {
        let tx = Transaction {
            kind: TxKind::Payment,
            inputs: vec![],
            outputs: vec![
                TxOutput {
                    amount: u64::MAX,
                    destination: PublicKey([1; 32]),
                },
                TxOutput {
                    amount: 1,
                    destination: PublicKey([2; 32]),
                },
            ],
        };
        assert!(!tx.is_valid(0));
    }

    #[test]
    fn merkle_root_matches_fresh_tree() {
        let txs = vec![payment(1, 1), payment(2, 2), payment(3, 3)];
        let block = Block::make_new_block(
            &BlockHeader {
                prev_block_hash: Hash::ZERO,
                height: 0,
                merkle_root: Hash::ZERO,
                validators_bitfield: vec![],
                aggregate_signature: None,
                enrollments: vec![],
            },
            txs.clone(),
            vec![],
        );
        let fresh = build_merkle_tree(&sorted_tx_hashes(&txs));
        assert_eq!(block.merkle_root(), fresh.last().unwrap()[0]);
    }

    #[test]
    fn inclusion_proof_verifies() {
        let txs = vec![payment(1, 1), payment(2, 2), payment(3, 3), payment(4, 4)];
        let block = Block::make_new_block(
            &BlockHeader {
                prev_block_hash: Hash::ZERO,
                height: 0,
                merkle_root: Hash::ZERO,
                validators_bitfield: vec![],
                aggregate_signature: None,
                enrollments: vec![],
            },
            txs.clone(),
            vec![],
        );
        for tx in &block.txs {
            let proof = block.inclusion_proof(&tx.hash()).expect("leaf present");
            assert!(proof.verify(&block.merkle_root()));
        }
    }

    #[test]
    fn odd_tx_count_duplicates_last_leaf() {
        let leaves = vec![Hash([1; 64]), Hash([2; 64]), Hash([3; 64])];
        let tree = build_merkle_tree(&leaves);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree[0].len(), 3);
        assert_eq!(tree[1].len(), 2);
        assert_eq!(tree[2].len(), 1);
    }
}
