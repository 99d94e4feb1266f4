//! Error type for the enrollment manager, validator, and ledger.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConsensusError {
    #[error("utxo key is not currently enrolled")]
    NotEnrolled,

    #[error("this node does not hold the local pre-image chain for this enrollment")]
    NoLocalChain,

    #[error("height is outside the enrollment's active cycle")]
    OutOfCycle,

    #[error("revealed pre-image does not hash forward to the committed head")]
    BadPreimageReveal,

    #[error("block rejected: {0}")]
    BlockRejected(String),

    #[error(transparent)]
    Core(#[from] agora_core::Error),
}

pub type ConsensusResult<T> = core::result::Result<T, ConsensusError>;
