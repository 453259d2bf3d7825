use thiserror::Error;

use super::types::GameState;
use crate::elgamal::CodecError;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameError {
    #[error("invalid game configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("operation not allowed in state {0:?}")]
    InvalidState(GameState),
    #[error("caller is not the expected player")]
    NotYourTurn,
    #[error("public key is not on the curve")]
    InvalidPublicKey,
    #[error("card has not been requested for dealing")]
    CardNotRequested,
    #[error("player already submitted a share for this card")]
    DoubleDeal,
    #[error("proof verification failed")]
    ProofFailed,
    #[error("card is not fully decrypted")]
    CardNotFullyDecrypted,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Structural self-checks a game must pass in every state.
pub trait InvariantCheck {
    fn validate_invariants(&self) -> Result<(), GameError>;
}
