//! The shuffle-and-deal state machine and its surrounding types.

pub mod errors;
pub mod events;
pub mod game;
pub mod types;


pub use errors::{GameError, InvariantCheck};
pub use events::GameEvent;
pub use game::Game;
pub use types::{CardDealState, GameId, GameState, OpenedCard, PlayerAddr, PlayerInfo};
