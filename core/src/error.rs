//! Error types for the **Agora** core crate.
//!
//! All fallible operations return [`crate::Result`], an alias for
//! `core::result::Result<T, Error>`. Block-validation rejection reasons are
//! returned as plain `String`s by the pure predicates in the consensus
//! crate (spec §4.6) and only wrapped into [`Error::ProtocolViolation`] at
//! the ledger boundary where a caller needs a single error type.

use thiserror::Error;

/// Core crate error type, covering every kind named in the error design
/// (spec §7).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// Deserialization failed: truncated input, bad discriminant, or a
    /// length prefix that doesn't fit the remaining bytes.
    #[error("malformed wire data: {0}")]
    MalformedWire(String),

    /// Address decoding failed CRC/version/length checks.
    #[error("malformed address: {0}")]
    MalformedAddress(String),

    /// Signature did not verify against the provided public key.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Referenced UTXO is absent from the current ledger state.
    #[error("utxo not found")]
    UtxoNotFound,

    /// The same input is spent twice, either within a block or against the
    /// live UTXO set.
    #[error("double spend attempted")]
    DoubleSpend,

    /// A freeze UTXO does not carry enough stake to enroll.
    #[error("insufficient stake for enrollment")]
    InsufficientStake,

    /// Any block-acceptance rule from spec §4.6 failed; the string is the
    /// human-readable reason produced by the validator predicate.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A network call failed and may be retried.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The peer is currently banned and the call was not attempted.
    #[error("peer is banned")]
    PeerBanned,

    /// A ledger invariant was violated; the process must halt rather than
    /// continue (spec §6 "Exit behavior").
    #[error("fatal invariant violation: {0}")]
    Fatal(String),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
