//! The shared-store boundary: authenticated writes, read-only snapshots
//! and an event stream. Clients only ever talk to a game through this
//! trait; the store serializes writes per game.

pub mod in_memory;

pub use in_memory::InMemoryGameStore;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::curve::{Fq, Point};
use crate::elgamal::{BitVector, CompressedDeck};
use crate::engine::{Game, GameError, GameEvent, GameId, OpenedCard, PlayerAddr};
use crate::proof::PackedProof;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown game {0}")]
    UnknownGame(GameId),
    #[error("game {0} already exists")]
    GameExists(GameId),
    #[error(transparent)]
    Game(#[from] GameError),
}

/// One authenticated write against a game.
#[derive(Debug, Clone)]
pub enum GameOp {
    Create {
        num_players: usize,
        num_cards: usize,
    },
    StartRegistration,
    Register {
        pk: Point,
    },
    Shuffle {
        proof: PackedProof,
        deck: CompressedDeck,
    },
    DealRequest {
        /// `(card_mask, recipient)` pairs; the whole round's plan at once.
        requests: Vec<(BitVector, usize)>,
    },
    Deal {
        card_index: usize,
        player_index: usize,
        proof: PackedProof,
        share: Point,
        init_delta: Option<(Fq, Fq)>,
    },
    Open {
        player_index: usize,
        cards: Vec<OpenedCard>,
    },
    Close,
    Fault,
}

#[async_trait]
pub trait GameStore: Send + Sync {
    /// Applies one operation, returning the events it emitted. Writes to
    /// the same game are serialized; a rejected operation changes nothing.
    async fn submit(
        &self,
        caller: PlayerAddr,
        game_id: GameId,
        op: GameOp,
    ) -> Result<Vec<GameEvent>, StoreError>;

    /// Read-only snapshot of the game record.
    async fn snapshot(&self, game_id: GameId) -> Result<Game, StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<GameEvent>;

    /// Registers the caller and returns its player index.
    async fn register(
        &self,
        caller: PlayerAddr,
        game_id: GameId,
        pk: Point,
    ) -> Result<usize, StoreError> {
        let events = self
            .submit(caller, game_id, GameOp::Register { pk })
            .await?;
        Ok(events
            .iter()
            .find_map(|event| match event {
                GameEvent::Register { player_index, .. } => Some(*player_index),
                _ => None,
            })
            .expect("successful registration emits its event"))
    }

    async fn query_aggregated_pk(&self, game_id: GameId) -> Result<Point, StoreError> {
        Ok(self.snapshot(game_id).await?.aggregated_pk()?)
    }

    async fn query_deck(&self, game_id: GameId) -> Result<CompressedDeck, StoreError> {
        Ok(self.snapshot(game_id).await?.deck()?.clone())
    }

    async fn search(&self, game_id: GameId, card_index: usize) -> Result<u64, StoreError> {
        Ok(self.snapshot(game_id).await?.search(card_index)?)
    }
}
