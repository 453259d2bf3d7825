use serde::{Deserialize, Serialize};

use crate::curve::Point;
use crate::elgamal::{BitVector, ElGamalCiphertext};
use crate::proof::PackedProof;

/// Externally assigned, non-zero game identifier.
pub type GameId = u64;
/// Authenticated caller address on the shared store.
pub type PlayerAddr = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    Created,
    Registration,
    Shuffle,
    Deal,
    Open,
    Faulted,
    Complete,
}

/// One registered player, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerInfo {
    pub addr: PlayerAddr,
    pub pk: Point,
}

/// Per-card dealing state: which players have contributed a share, who the
/// card is for, and the running partially-decrypted ciphertext.
#[derive(Debug, Clone, Copy)]
pub struct CardDealState {
    pub recipient: usize,
    pub record: BitVector,
    /// Explicit card points once the first share decompressed the slot;
    /// `c1` has every recorded share already subtracted.
    pub points: Option<ElGamalCiphertext>,
    /// Resolved card index once every player's share is in.
    pub revealed: Option<u64>,
}

impl CardDealState {
    pub fn new(recipient: usize) -> Self {
        Self {
            recipient,
            record: BitVector::default(),
            points: None,
            revealed: None,
        }
    }
}

/// One card reveal in an `open` submission.
#[derive(Debug, Clone, Copy)]
pub struct OpenedCard {
    pub card_index: usize,
    pub share: Point,
    pub proof: PackedProof,
}
