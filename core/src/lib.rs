//! Agora Core Library
//!
//! Primitives, canonical serialization, the transaction/block model, and
//! the UTXO set — the data layer every other Agora crate builds on
//! (spec §4.1-§4.4).

pub mod address;
pub mod config;
pub mod crypto;
pub mod error;
pub mod model;
pub mod utxo;
pub mod wire;

pub use crypto::{Hash, KeyPair, PublicKey, SchnorrSignature, SecretKey, Seed, Signature};
pub use error::{Error, Result};
pub use model::{
    build_merkle_proof, build_merkle_tree, Block, BlockHeader, Enrollment, MerkleProof,
    MerkleProofStep, MerkleSide, Transaction, TxInput, TxKind, TxOutput,
};
pub use utxo::{ScratchOverlay, UtxoKey, UtxoSet, UtxoValue};
pub use wire::CanonicalSerialize;
