//! In-memory store: a keyed game map plus a broadcast event bus. The
//! map's entry guard serializes writes per game, so proof verification,
//! deck mutation and turn advance are atomic with respect to readers.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use super::{GameOp, GameStore, StoreError};
use crate::engine::{Game, GameEvent, GameId, PlayerAddr};
use crate::proof::DeckVerifier;

const LOG_TARGET: &str = "zk_shuffle::store";
const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub struct InMemoryGameStore {
    games: DashMap<GameId, Game>,
    events: broadcast::Sender<GameEvent>,
    verifier: Arc<dyn DeckVerifier>,
}

impl InMemoryGameStore {
    pub fn new(verifier: Arc<dyn DeckVerifier>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            games: DashMap::new(),
            events,
            verifier,
        }
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn submit(
        &self,
        caller: PlayerAddr,
        game_id: GameId,
        op: GameOp,
    ) -> Result<Vec<GameEvent>, StoreError> {
        if let GameOp::Create {
            num_players,
            num_cards,
        } = op
        {
            return match self.games.entry(game_id) {
                Entry::Occupied(_) => Err(StoreError::GameExists(game_id)),
                Entry::Vacant(vacant) => {
                    vacant.insert(Game::create(game_id, num_players, num_cards)?);
                    Ok(Vec::new())
                }
            };
        }

        let mut game = self
            .games
            .get_mut(&game_id)
            .ok_or(StoreError::UnknownGame(game_id))?;

        let events = match op {
            GameOp::Create { .. } => unreachable!("handled above"),
            GameOp::StartRegistration => game.start_registration()?,
            GameOp::Register { pk } => game.register(caller, pk)?.1,
            GameOp::Shuffle { proof, deck } => {
                game.shuffle(self.verifier.as_ref(), caller, &proof, deck)?
            }
            GameOp::DealRequest { requests } => game.deal_request(&requests)?,
            GameOp::Deal {
                card_index,
                player_index,
                proof,
                share,
                init_delta,
            } => game.deal(
                self.verifier.as_ref(),
                caller,
                card_index,
                player_index,
                &proof,
                share,
                init_delta,
            )?,
            GameOp::Open {
                player_index,
                cards,
            } => game.open(self.verifier.as_ref(), caller, player_index, &cards)?,
            GameOp::Close => game.close()?,
            GameOp::Fault => game.fault()?,
        };
        drop(game);

        for event in &events {
            debug!(target: LOG_TARGET, ?event, "broadcasting");
            // Nobody listening is fine.
            let _ = self.events.send(*event);
        }
        Ok(events)
    }

    async fn snapshot(&self, game_id: GameId) -> Result<Game, StoreError> {
        self.games
            .get(&game_id)
            .map(|game| game.clone())
            .ok_or(StoreError::UnknownGame(game_id))
    }

    fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use crate::proof::MockVerifier;
    use rand::{rngs::StdRng, SeedableRng};

    fn store() -> InMemoryGameStore {
        InMemoryGameStore::new(Arc::new(MockVerifier))
    }

    #[tokio::test]
    async fn create_is_unique_per_game_id() {
        let store = store();
        let op = GameOp::Create {
            num_players: 2,
            num_cards: 30,
        };
        store.submit(0, 5, op.clone()).await.unwrap();
        assert_eq!(
            store.submit(0, 5, op).await.unwrap_err(),
            StoreError::GameExists(5)
        );
    }

    #[tokio::test]
    async fn unknown_game_is_reported() {
        let store = store();
        assert_eq!(
            store.snapshot(42).await.unwrap_err(),
            StoreError::UnknownGame(42)
        );
        assert_eq!(
            store
                .submit(0, 42, GameOp::StartRegistration)
                .await
                .unwrap_err(),
            StoreError::UnknownGame(42)
        );
    }

    #[tokio::test]
    async fn registration_events_reach_subscribers() {
        let store = store();
        store
            .submit(
                0,
                8,
                GameOp::Create {
                    num_players: 2,
                    num_cards: 30,
                },
            )
            .await
            .unwrap();
        store.submit(0, 8, GameOp::StartRegistration).await.unwrap();

        let mut events = store.subscribe();
        let mut rng = StdRng::seed_from_u64(1);
        let keys = KeyPair::generate(&mut rng);
        let index = store.register(7, 8, keys.pk).await.unwrap();
        assert_eq!(index, 0);

        assert_eq!(
            events.recv().await.unwrap(),
            GameEvent::Register {
                game_id: 8,
                addr: 7,
                player_index: 0
            }
        );
    }
}
