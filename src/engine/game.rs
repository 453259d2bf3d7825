//! The per-game state machine. Every mutation is one authenticated
//! operation; the store serializes them, so each method here is a finite,
//! atomic computation over the game record. Failed submissions are
//! rejected without touching state; the terminal `Faulted` state is
//! reserved for external escalation.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::errors::{GameError, InvariantCheck};
use super::events::GameEvent;
use super::types::{CardDealState, GameId, GameState, OpenedCard, PlayerAddr, PlayerInfo};
use crate::curve::{Fq, Point};
use crate::elgamal::{
    codec::MAX_DECK_SIZE, initial_deck, BitVector, CodecError, CompressedDeck, ElGamalCiphertext,
};
use crate::keys::aggregate_public_keys;
use crate::proof::{DeckVerifier, PackedProof};
use crate::witness::{DealPublicInput, ShufflePublicInput};

const LOG_TARGET: &str = "zk_shuffle::engine";

#[derive(Debug, Clone)]
pub struct Game {
    pub id: GameId,
    pub state: GameState,
    pub num_players: usize,
    pub num_cards: usize,
    /// Index of the player expected to shuffle next.
    pub turn: usize,
    pub players: Vec<PlayerInfo>,
    pub aggregated_pk: Option<Point>,
    pub deck: Option<CompressedDeck>,
    /// Union of every requested card mask.
    pub requested: BitVector,
    pub deals: BTreeMap<usize, CardDealState>,
}

impl Game {
    pub fn create(game_id: GameId, num_players: usize, num_cards: usize) -> Result<Self, GameError> {
        if game_id == 0 {
            return Err(GameError::InvalidConfiguration("game id must be non-zero"));
        }
        if num_players < 2 || num_players > MAX_DECK_SIZE {
            return Err(GameError::InvalidConfiguration("unsupported player count"));
        }
        if num_cards < 1 || num_cards > MAX_DECK_SIZE {
            return Err(GameError::InvalidConfiguration("unsupported deck size"));
        }
        info!(target: LOG_TARGET, game_id, num_players, num_cards, "game created");
        Ok(Self {
            id: game_id,
            state: GameState::Created,
            num_players,
            num_cards,
            turn: 0,
            players: Vec::with_capacity(num_players),
            aggregated_pk: None,
            deck: None,
            requested: BitVector::default(),
            deals: BTreeMap::new(),
        })
    }

    /// Locks the settings in and opens registration.
    pub fn start_registration(&mut self) -> Result<Vec<GameEvent>, GameError> {
        self.require_state(GameState::Created)?;
        self.state = GameState::Registration;
        Ok(Vec::new())
    }

    /// Registers a player. The N-th registration aggregates the joint key,
    /// materializes the initial deck and opens the shuffle phase.
    pub fn register(
        &mut self,
        addr: PlayerAddr,
        pk: Point,
    ) -> Result<(usize, Vec<GameEvent>), GameError> {
        self.require_state(GameState::Registration)?;
        if !pk.is_on_curve() {
            warn!(target: LOG_TARGET, game_id = self.id, addr, "rejected off-curve public key");
            return Err(GameError::InvalidPublicKey);
        }

        let player_index = self.players.len();
        self.players.push(PlayerInfo { addr, pk });
        let mut events = vec![GameEvent::Register {
            game_id: self.id,
            addr,
            player_index,
        }];

        if self.players.len() == self.num_players {
            let pks: Vec<Point> = self.players.iter().map(|p| p.pk).collect();
            let aggregated =
                aggregate_public_keys(&pks).map_err(|_| GameError::InvalidPublicKey)?;
            self.aggregated_pk = Some(aggregated);
            self.deck = Some(initial_deck(self.num_cards).compressed().clone());
            self.turn = 0;
            self.state = GameState::Shuffle;
            info!(
                target: LOG_TARGET,
                game_id = self.id,
                num_players = self.num_players,
                "registration closed, shuffle phase open"
            );
            events.push(GameEvent::PlayerTurn {
                game_id: self.id,
                player_index: 0,
                state: GameState::Shuffle,
            });
        }
        Ok((player_index, events))
    }

    pub fn aggregated_pk(&self) -> Result<Point, GameError> {
        self.aggregated_pk
            .ok_or(GameError::InvalidState(self.state))
    }

    pub fn deck(&self) -> Result<&CompressedDeck, GameError> {
        self.deck
            .as_ref()
            .ok_or(GameError::InvalidState(self.state))
    }

    /// One shuffle turn: verifies the proof against the current and the
    /// submitted deck, then replaces the deck and advances the turn.
    pub fn shuffle(
        &mut self,
        verifier: &dyn DeckVerifier,
        caller: PlayerAddr,
        proof: &PackedProof,
        output: CompressedDeck,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_state(GameState::Shuffle)?;
        if self.players[self.turn].addr != caller {
            warn!(
                target: LOG_TARGET,
                game_id = self.id,
                caller,
                turn = self.turn,
                "shuffle out of turn"
            );
            return Err(GameError::NotYourTurn);
        }
        if output.num_cards() != self.num_cards || output.x1.len() != self.num_cards {
            return Err(GameError::Codec(CodecError::DeckSize {
                expected: self.num_cards,
                got: output.num_cards(),
            }));
        }

        let public = ShufflePublicInput {
            nonce: Fq::from(self.id),
            aggregated_pk: self.aggregated_pk()?,
            input: self.deck()?.clone(),
            output: output.clone(),
        };
        if !verifier.verify_shuffle(&public, proof) {
            warn!(target: LOG_TARGET, game_id = self.id, turn = self.turn, "shuffle proof rejected");
            return Err(GameError::ProofFailed);
        }

        let completed_turn = self.turn;
        self.deck = Some(output);
        self.turn += 1;
        let mut events = vec![GameEvent::DeckUpdated {
            game_id: self.id,
            turn: completed_turn,
        }];
        if self.turn == self.num_players {
            self.turn = 0;
            self.state = GameState::Deal;
            info!(target: LOG_TARGET, game_id = self.id, "all players shuffled, deal phase open");
        } else {
            events.push(GameEvent::PlayerTurn {
                game_id: self.id,
                player_index: self.turn,
                state: GameState::Shuffle,
            });
        }
        Ok(events)
    }

    /// Marks cards for dealing, one `(card_mask, recipient)` pair per
    /// recipient. The whole plan for a round lands atomically so the
    /// phase cannot complete between partial requests. A fully decrypted
    /// card can never be requested again.
    pub fn deal_request(
        &mut self,
        requests: &[(BitVector, usize)],
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_state(GameState::Deal)?;
        if requests.is_empty() {
            return Err(GameError::InvalidConfiguration("empty deal plan"));
        }
        let mut claimed = self.requested;
        for &(card_mask, recipient) in requests {
            if recipient >= self.num_players {
                return Err(GameError::InvalidConfiguration("recipient out of range"));
            }
            if card_mask.value() == 0 {
                return Err(GameError::InvalidConfiguration("empty card mask"));
            }
            if !BitVector::full(self.num_cards).covers(&card_mask) {
                return Err(GameError::Codec(CodecError::IllFormedSelector));
            }
            if card_mask.iter_ones().any(|i| claimed.bit(i)) {
                return Err(GameError::DoubleDeal);
            }
            for card_index in card_mask.iter_ones() {
                claimed.set(card_index);
            }
        }

        let mut notified = BTreeSet::new();
        for &(card_mask, recipient) in requests {
            for card_index in card_mask.iter_ones() {
                self.requested.set(card_index);
                self.deals.insert(card_index, CardDealState::new(recipient));
            }
            notified.extend((0..self.num_players).filter(|&j| j != recipient));
            debug!(
                target: LOG_TARGET,
                game_id = self.id,
                recipient,
                card_mask = card_mask.value(),
                "deal requested"
            );
        }

        Ok(notified
            .into_iter()
            .map(|player_index| GameEvent::PlayerTurn {
                game_id: self.id,
                player_index,
                state: GameState::Deal,
            })
            .collect())
    }

    /// One non-recipient decryption share for one requested card. The
    /// first share for a card also decompresses the slot from the deltas
    /// the submitter supplies.
    pub fn deal(
        &mut self,
        verifier: &dyn DeckVerifier,
        caller: PlayerAddr,
        card_index: usize,
        player_index: usize,
        proof: &PackedProof,
        share: Point,
        init_delta: Option<(Fq, Fq)>,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_state(GameState::Deal)?;
        let player = *self
            .players
            .get(player_index)
            .ok_or(GameError::NotYourTurn)?;
        if player.addr != caller {
            return Err(GameError::NotYourTurn);
        }
        let deal = *self
            .deals
            .get(&card_index)
            .ok_or(GameError::CardNotRequested)?;
        if deal.recipient == player_index {
            return Err(GameError::NotYourTurn);
        }
        if deal.record.bit(player_index) {
            return Err(GameError::DoubleDeal);
        }

        let card = match deal.points {
            Some(card) => card,
            None => {
                let (delta0, delta1) =
                    init_delta.ok_or(GameError::Codec(CodecError::IllFormedDelta))?;
                self.deck()?.decompress_card(card_index, delta0, delta1)?
            }
        };

        let public = DealPublicInput {
            share,
            card,
            player_pk: player.pk,
        };
        if !verifier.verify_deal(&public, proof) {
            warn!(
                target: LOG_TARGET,
                game_id = self.id,
                card_index,
                player_index,
                "deal proof rejected"
            );
            return Err(GameError::ProofFailed);
        }

        let deal = self
            .deals
            .get_mut(&card_index)
            .expect("deal record checked above");
        deal.points = Some(card.sub_share(&share));
        deal.record.set(player_index);

        let mut events = vec![GameEvent::CardDealt {
            game_id: self.id,
            card_index,
            player_index,
        }];
        if self.deal_phase_complete() {
            self.state = GameState::Open;
            info!(target: LOG_TARGET, game_id = self.id, "all shares in, open phase");
            let recipients: BTreeSet<usize> =
                self.deals.values().map(|d| d.recipient).collect();
            events.extend(recipients.into_iter().map(|player_index| {
                GameEvent::PlayerTurn {
                    game_id: self.id,
                    player_index,
                    state: GameState::Open,
                }
            }));
        }
        Ok(events)
    }

    /// A recipient reveals its own cards: with its share verified and
    /// subtracted, the record covers every player and the plaintext
    /// resolves against the initial deck table.
    pub fn open(
        &mut self,
        verifier: &dyn DeckVerifier,
        caller: PlayerAddr,
        player_index: usize,
        cards: &[OpenedCard],
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_state(GameState::Open)?;
        let player = *self
            .players
            .get(player_index)
            .ok_or(GameError::NotYourTurn)?;
        if player.addr != caller {
            return Err(GameError::NotYourTurn);
        }

        // Validate the whole submission before mutating anything.
        let mut seen = BTreeSet::new();
        let mut updates = Vec::with_capacity(cards.len());
        for opened in cards {
            if !seen.insert(opened.card_index) {
                return Err(GameError::DoubleDeal);
            }
            let deal = self
                .deals
                .get(&opened.card_index)
                .ok_or(GameError::CardNotRequested)?;
            if deal.recipient != player_index {
                return Err(GameError::NotYourTurn);
            }
            if deal.record.bit(player_index) {
                return Err(GameError::DoubleDeal);
            }
            let card = deal.points.ok_or(GameError::CardNotFullyDecrypted)?;
            let public = DealPublicInput {
                share: opened.share,
                card,
                player_pk: player.pk,
            };
            if !verifier.verify_deal(&public, &opened.proof) {
                return Err(GameError::ProofFailed);
            }
            updates.push((opened.card_index, card.sub_share(&opened.share)));
        }

        let table = initial_deck(self.num_cards);
        let full = BitVector::full(self.num_players);
        let mut events = Vec::with_capacity(updates.len());
        for (card_index, stripped) in updates {
            let deal = self
                .deals
                .get_mut(&card_index)
                .expect("validated above");
            deal.points = Some(stripped);
            deal.record.set(player_index);
            if deal.record.covers(&full) {
                deal.revealed = Some(table.search_index(&stripped.c1));
            }
            events.push(GameEvent::CardDealt {
                game_id: self.id,
                card_index,
                player_index,
            });
        }
        Ok(events)
    }

    /// Resolved card index, once every player's share is accounted for.
    pub fn search(&self, card_index: usize) -> Result<u64, GameError> {
        self.deals
            .get(&card_index)
            .and_then(|deal| deal.revealed)
            .ok_or(GameError::CardNotFullyDecrypted)
    }

    /// External close once the open phase has run its course.
    pub fn close(&mut self) -> Result<Vec<GameEvent>, GameError> {
        self.require_state(GameState::Open)?;
        self.state = GameState::Complete;
        info!(target: LOG_TARGET, game_id = self.id, "game complete");
        Ok(Vec::new())
    }

    /// External escalation (timeout policies and the like) into the
    /// terminal fault state.
    pub fn fault(&mut self) -> Result<Vec<GameEvent>, GameError> {
        match self.state {
            GameState::Complete | GameState::Faulted => {
                Err(GameError::InvalidState(self.state))
            }
            _ => {
                warn!(target: LOG_TARGET, game_id = self.id, state = ?self.state, "game faulted");
                self.state = GameState::Faulted;
                Ok(Vec::new())
            }
        }
    }

    fn require_state(&self, expected: GameState) -> Result<(), GameError> {
        if self.state != expected {
            return Err(GameError::InvalidState(self.state));
        }
        Ok(())
    }

    fn non_recipient_mask(&self, recipient: usize) -> BitVector {
        BitVector::new(BitVector::full(self.num_players).value() & !(1 << recipient))
    }

    fn deal_phase_complete(&self) -> bool {
        !self.deals.is_empty()
            && self.deals.values().all(|deal| {
                deal.record.covers(&self.non_recipient_mask(deal.recipient))
            })
    }
}

impl InvariantCheck for Game {
    fn validate_invariants(&self) -> Result<(), GameError> {
        for player in &self.players {
            if !player.pk.is_on_curve() {
                return Err(GameError::InvalidConfiguration("registered key off curve"));
            }
        }
        if let Some(aggregated) = self.aggregated_pk {
            let pks: Vec<Point> = self.players.iter().map(|p| p.pk).collect();
            if aggregate_public_keys(&pks) != Ok(aggregated) {
                return Err(GameError::InvalidConfiguration("aggregated key mismatch"));
            }
        }
        if let Some(deck) = &self.deck {
            let cards = deck
                .decompress()
                .map_err(|_| GameError::InvalidConfiguration("deck decompression failed"))?;
            for ElGamalCiphertext { c0, c1 } in cards {
                if !c0.is_on_curve() || !c1.is_on_curve() {
                    return Err(GameError::InvalidConfiguration("deck point off curve"));
                }
            }
        }
        for deal in self.deals.values() {
            if deal.record.count_ones() as usize > self.num_players {
                return Err(GameError::InvalidConfiguration("deal record overflow"));
            }
        }
        Ok(())
    }
}
