use serde::{Deserialize, Serialize};

use super::types::{GameId, GameState, PlayerAddr};

/// Events the state machine emits on successful operations; the store
/// broadcasts them to every subscribed client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    Register {
        game_id: GameId,
        addr: PlayerAddr,
        player_index: usize,
    },
    PlayerTurn {
        game_id: GameId,
        player_index: usize,
        state: GameState,
    },
    DeckUpdated {
        game_id: GameId,
        turn: usize,
    },
    CardDealt {
        game_id: GameId,
        card_index: usize,
        player_index: usize,
    },
}
