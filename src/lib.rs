//! Mental-poker protocol core: N mutually distrustful players jointly
//! shuffle and selectively reveal an ElGamal-encrypted deck over Baby
//! Jubjub, with Groth16 proofs attesting to every shuffle and every
//! decryption share. The Groth16 prover/verifier pair and the settlement
//! layer are external collaborators; this crate owns the curve and codec
//! arithmetic, the witness builders, the game state machine, the store
//! abstraction and the per-player orchestrator.

pub mod client;
pub mod config;
pub mod curve;
pub mod elgamal;
pub mod engine;
pub mod keys;
pub mod proof;
pub mod store;
pub mod witness;

pub use client::PlayerClient;
pub use config::ClientConfig;
pub use curve::{Fq, Fr, Point};
pub use elgamal::{CompressedDeck, ElGamalCiphertext, INVALID_CARD_INDEX};
pub use engine::{Game, GameError, GameEvent, GameId, GameState};
pub use keys::{aggregate_public_keys, KeyPair};
pub use proof::{DeckVerifier, PackedProof, ProofSystem};
pub use store::{GameOp, GameStore, InMemoryGameStore};
