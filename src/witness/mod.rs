//! Witness builders for the two circuits: shuffle (permutation plus
//! re-randomization of the whole deck) and deal (one decryption share).
//! Both sides of the protocol must agree bit-exactly on these values, so
//! the public-signal layouts live here as typed, length-checked records.

pub mod deal;
pub mod shuffle;

pub use deal::{
    build_deal_witness, build_deal_witness_compressed, prepare_decrypt_data, recover_card,
    DealPublicInput, DealWitness,
};
pub use shuffle::{
    build_shuffle_witness, sample_randomness, Permutation, ShufflePublicInput, ShuffleWitness,
};

use thiserror::Error;

use crate::curve::CurveError;
use crate::elgamal::CodecError;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WitnessError {
    #[error("permutation is not a bijection over the deck")]
    InvalidPermutation,
    #[error("expected {expected} elements, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("public signal vector has {got} elements, expected {expected}")]
    MalformedSignals { expected: usize, got: usize },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Curve(#[from] CurveError),
}
