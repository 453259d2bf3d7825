//! Per-player orchestrator: a thin loop that registers, watches the game,
//! and submits proved shuffles, decryption shares and reveals when it is
//! this player's move. The secret key never leaves this process; only
//! proofs and public shares go to the store.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::curve::Fq;
use crate::engine::{Game, GameError, GameEvent, GameId, GameState, OpenedCard, PlayerAddr};
use crate::keys::KeyPair;
use crate::proof::{PackedProof, ProofError, ProofSystem};
use crate::store::{GameOp, GameStore, StoreError};
use crate::witness::{
    build_deal_witness, build_deal_witness_compressed, build_shuffle_witness, recover_card,
    sample_randomness, DealPublicInput, DealWitness, Permutation, ShufflePublicInput,
    ShuffleWitness,
};

const LOG_TARGET: &str = "zk_shuffle::client";

enum Step {
    Acted,
    Idle,
    Finished,
}

pub struct PlayerClient<S, SP, DP>
where
    S: GameStore + 'static,
    SP: ProofSystem<
            PublicInput = ShufflePublicInput,
            Witness = ShuffleWitness,
            Proof = PackedProof,
            Error = ProofError,
        > + Send
        + Sync
        + 'static,
    DP: ProofSystem<
            PublicInput = DealPublicInput,
            Witness = DealWitness,
            Proof = PackedProof,
            Error = ProofError,
        > + Send
        + Sync
        + 'static,
{
    store: Arc<S>,
    shuffle_prover: Arc<SP>,
    deal_prover: Arc<DP>,
    game_id: GameId,
    addr: PlayerAddr,
    keys: KeyPair,
    cfg: ClientConfig,
    rng: StdRng,
    player_index: Option<usize>,
}

impl<S, SP, DP> PlayerClient<S, SP, DP>
where
    S: GameStore + 'static,
    SP: ProofSystem<
            PublicInput = ShufflePublicInput,
            Witness = ShuffleWitness,
            Proof = PackedProof,
            Error = ProofError,
        > + Send
        + Sync
        + 'static,
    DP: ProofSystem<
            PublicInput = DealPublicInput,
            Witness = DealWitness,
            Proof = PackedProof,
            Error = ProofError,
        > + Send
        + Sync
        + 'static,
{
    pub fn new(
        store: Arc<S>,
        shuffle_prover: Arc<SP>,
        deal_prover: Arc<DP>,
        game_id: GameId,
        addr: PlayerAddr,
        keys: KeyPair,
        cfg: ClientConfig,
    ) -> Self {
        Self {
            store,
            shuffle_prover,
            deal_prover,
            game_id,
            addr,
            keys,
            cfg,
            rng: StdRng::from_entropy(),
            player_index: None,
        }
    }

    /// Registers, then runs until the game completes, faults, or `cancel`
    /// fires. Event-driven with an exponentially backed-off polling
    /// fallback.
    #[instrument(target = LOG_TARGET, skip_all, fields(game_id = self.game_id, addr = self.addr))]
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut events = self.store.subscribe();

        let index = self
            .store
            .register(self.addr, self.game_id, self.keys.pk)
            .await
            .context("registration failed")?;
        self.player_index = Some(index);
        info!(target: LOG_TARGET, player_index = index, "registered");

        let mut backoff = self.cfg.poll_interval;
        loop {
            match self.step().await? {
                Step::Finished => {
                    info!(target: LOG_TARGET, "game over, client exiting");
                    return Ok(());
                }
                Step::Acted => backoff = self.cfg.poll_interval,
                Step::Idle => {
                    backoff = (backoff * self.cfg.backoff_factor).min(self.cfg.max_poll_interval)
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(target: LOG_TARGET, "client cancelled");
                    return Ok(());
                }
                received = events.recv() => match received {
                    Ok(event) => {
                        if event_game_id(&event) == self.game_id {
                            backoff = self.cfg.poll_interval;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(target: LOG_TARGET, skipped, "event stream lagged, repolling");
                        backoff = self.cfg.poll_interval;
                    }
                    Err(RecvError::Closed) => {
                        warn!(target: LOG_TARGET, "event stream closed");
                        return Ok(());
                    }
                },
                _ = sleep(backoff) => {}
            }
        }
    }

    async fn step(&mut self) -> Result<Step> {
        let game = self.store.snapshot(self.game_id).await?;
        match game.state {
            GameState::Complete | GameState::Faulted => Ok(Step::Finished),
            GameState::Shuffle => self.try_shuffle(&game).await,
            GameState::Deal => self.try_deal(&game).await,
            GameState::Open => self.try_open(&game).await,
            _ => Ok(Step::Idle),
        }
    }

    async fn try_shuffle(&mut self, game: &Game) -> Result<Step> {
        if game.players[game.turn].addr != self.addr {
            return Ok(Step::Idle);
        }
        let deck = game.deck()?.clone();
        let n = deck.num_cards();
        let permutation = Permutation::sample(n, &mut self.rng);
        let randomness = sample_randomness(n, &mut self.rng);
        let witness = build_shuffle_witness(
            &deck,
            permutation,
            randomness,
            game.aggregated_pk()?,
            Fq::from(self.game_id),
        )?;

        let prover = Arc::clone(&self.shuffle_prover);
        let (proof, output) = tokio::task::spawn_blocking(move || {
            let mut rng = StdRng::from_entropy();
            let proof = prover.prove(&witness.public, &witness, &mut rng)?;
            Ok::<_, ProofError>((proof, witness.public.output))
        })
        .await
        .context("shuffle proving task panicked")??;

        info!(target: LOG_TARGET, turn = game.turn, "submitting shuffle");
        self.store
            .submit(self.addr, self.game_id, GameOp::Shuffle { proof, deck: output })
            .await?;
        Ok(Step::Acted)
    }

    async fn try_deal(&mut self, game: &Game) -> Result<Step> {
        let me = self.index()?;
        let mut acted = false;
        for (&card_index, deal) in &game.deals {
            if deal.recipient == me || deal.record.bit(me) {
                continue;
            }
            let witness = match deal.points {
                Some(card) => build_deal_witness(&card, &self.keys),
                None => build_deal_witness_compressed(game.deck()?, card_index, &self.keys)?,
            };
            let share = witness.public.share;
            let init_delta = witness.deltas;

            let prover = Arc::clone(&self.deal_prover);
            let proof = tokio::task::spawn_blocking(move || {
                let mut rng = StdRng::from_entropy();
                prover.prove(&witness.public, &witness, &mut rng)
            })
            .await
            .context("deal proving task panicked")??;

            let submission = self
                .store
                .submit(
                    self.addr,
                    self.game_id,
                    GameOp::Deal {
                        card_index,
                        player_index: me,
                        proof,
                        share,
                        init_delta,
                    },
                )
                .await;
            match submission {
                Ok(_) => {
                    info!(target: LOG_TARGET, card_index, "share submitted");
                    acted = true;
                }
                // Another player's share landed between our snapshot and
                // submission, so the card we proved against is stale. The
                // next poll rebuilds from fresh state.
                Err(StoreError::Game(GameError::ProofFailed)) => {
                    debug!(target: LOG_TARGET, card_index, "share stale, will rebuild");
                }
                Err(StoreError::Game(GameError::DoubleDeal)) => {
                    debug!(target: LOG_TARGET, card_index, "share already recorded");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(if acted { Step::Acted } else { Step::Idle })
    }

    async fn try_open(&mut self, game: &Game) -> Result<Step> {
        let me = self.index()?;
        let table = crate::elgamal::initial_deck(game.num_cards);
        let mut cards = Vec::new();
        for (&card_index, deal) in &game.deals {
            if deal.recipient != me || deal.record.bit(me) {
                continue;
            }
            let card = deal
                .points
                .ok_or_else(|| anyhow!("card {card_index} has no shares in open phase"))?;

            let plaintext = recover_card(&card, &self.keys);
            debug!(
                target: LOG_TARGET,
                card_index,
                recovered = table.search_index(&plaintext),
                "recovered card locally"
            );

            let witness = build_deal_witness(&card, &self.keys);
            let share = witness.public.share;
            let prover = Arc::clone(&self.deal_prover);
            let proof = tokio::task::spawn_blocking(move || {
                let mut rng = StdRng::from_entropy();
                prover.prove(&witness.public, &witness, &mut rng)
            })
            .await
            .context("open proving task panicked")??;
            cards.push(OpenedCard {
                card_index,
                share,
                proof,
            });
        }
        if cards.is_empty() {
            return Ok(Step::Idle);
        }

        info!(target: LOG_TARGET, count = cards.len(), "opening cards");
        self.store
            .submit(
                self.addr,
                self.game_id,
                GameOp::Open {
                    player_index: me,
                    cards,
                },
            )
            .await?;
        Ok(Step::Acted)
    }

    fn index(&self) -> Result<usize> {
        self.player_index
            .ok_or_else(|| anyhow!("client acted before registration"))
    }
}

fn event_game_id(event: &GameEvent) -> GameId {
    match event {
        GameEvent::Register { game_id, .. }
        | GameEvent::PlayerTurn { game_id, .. }
        | GameEvent::DeckUpdated { game_id, .. }
        | GameEvent::CardDealt { game_id, .. } => *game_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::BitVector;
    use crate::proof::{MockDealProofSystem, MockShuffleProofSystem, MockVerifier};
    use crate::store::InMemoryGameStore;
    use std::time::Duration;
    use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

    fn setup_test_tracing() -> tracing::subscriber::DefaultGuard {
        let filter = filter::Targets::new().with_target("zk_shuffle", tracing::Level::DEBUG);
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .with(filter)
            .set_default()
    }

    async fn wait_for<F>(store: &InMemoryGameStore, game_id: GameId, what: &str, pred: F) -> Game
    where
        F: Fn(&Game) -> bool,
    {
        for _ in 0..500 {
            if let Ok(game) = store.snapshot(game_id).await {
                if pred(&game) {
                    return game;
                }
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {what}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clients_drive_a_full_game() {
        let _guard = setup_test_tracing();
        let store = Arc::new(InMemoryGameStore::new(Arc::new(MockVerifier)));
        let game_id: GameId = 31;
        store
            .submit(
                0,
                game_id,
                GameOp::Create {
                    num_players: 3,
                    num_cards: 30,
                },
            )
            .await
            .unwrap();
        store
            .submit(0, game_id, GameOp::StartRegistration)
            .await
            .unwrap();

        let cfg = ClientConfig {
            poll_interval: Duration::from_millis(20),
            max_poll_interval: Duration::from_millis(200),
            backoff_factor: 2,
        };
        let cancel = CancellationToken::new();
        let mut rng = StdRng::seed_from_u64(99);
        let mut handles = Vec::new();
        for i in 0..3u64 {
            let client = PlayerClient::new(
                Arc::clone(&store),
                Arc::new(MockShuffleProofSystem),
                Arc::new(MockDealProofSystem),
                game_id,
                200 + i,
                KeyPair::generate(&mut rng),
                cfg.clone(),
            );
            handles.push(tokio::spawn(client.run(cancel.clone())));
        }

        wait_for(&store, game_id, "deal phase", |g| g.state == GameState::Deal).await;

        // Card 0 to player 0, card 1 to player 1; the whole plan at once.
        store
            .submit(
                0,
                game_id,
                GameOp::DealRequest {
                    requests: vec![
                        (BitVector::new(0b01), 0),
                        (BitVector::new(0b10), 1),
                    ],
                },
            )
            .await
            .unwrap();

        let game = wait_for(&store, game_id, "revealed cards", |g| {
            g.search(0).is_ok() && g.search(1).is_ok()
        })
        .await;
        let first = game.search(0).unwrap();
        let second = game.search(1).unwrap();
        assert!(first < 30 && second < 30);
        assert_ne!(first, second);

        store.submit(0, game_id, GameOp::Close).await.unwrap();
        wait_for(&store, game_id, "completion", |g| {
            g.state == GameState::Complete
        })
        .await;

        cancel.cancel();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }
}
