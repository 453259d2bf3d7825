//! Deal witness: one player's decryption share for one card, proving
//! `share = sk·c0` against the player's registered public key.

use super::WitnessError;
use crate::curve::{Fq, Point};
use crate::elgamal::{CodecError, CompressedDeck, ElGamalCiphertext};
use crate::keys::KeyPair;

/// Public signals of the decrypt circuit, flattened as
/// `[share.x, share.y, c0.x, c0.y, c1.x, c1.y, pk.x, pk.y]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DealPublicInput {
    pub share: Point,
    pub card: ElGamalCiphertext,
    pub player_pk: Point,
}

impl DealPublicInput {
    pub const SIGNAL_LEN: usize = 8;

    pub fn flatten(&self) -> Vec<Fq> {
        vec![
            self.share.x,
            self.share.y,
            self.card.c0.x,
            self.card.c0.y,
            self.card.c1.x,
            self.card.c1.y,
            self.player_pk.x,
            self.player_pk.y,
        ]
    }

    pub fn from_signals(signals: &[Fq]) -> Result<Self, WitnessError> {
        if signals.len() != Self::SIGNAL_LEN {
            return Err(WitnessError::MalformedSignals {
                expected: Self::SIGNAL_LEN,
                got: signals.len(),
            });
        }
        Ok(Self {
            share: Point::new(signals[0], signals[1]),
            card: ElGamalCiphertext::new(
                Point::new(signals[2], signals[3]),
                Point::new(signals[4], signals[5]),
            ),
            player_pk: Point::new(signals[6], signals[7]),
        })
    }
}

/// The decrypt prover's input: public signals, the secret key, and — on
/// the compressed path — the deltas the state machine re-verifies when it
/// decompresses the card for the first time.
#[derive(Clone, Debug)]
pub struct DealWitness {
    pub public: DealPublicInput,
    pub(crate) sk: crate::curve::Fr,
    pub deltas: Option<(Fq, Fq)>,
}

impl DealWitness {
    /// Native check of the circuit relation:
    /// `share = sk·c0` and `pk = sk·G`.
    pub fn satisfies_relation(&self) -> bool {
        self.public.card.c0.mul(&self.sk) == self.public.share
            && Point::GENERATOR.mul(&self.sk) == self.public.player_pk
    }
}

/// Decompresses a card slot for its first deal, returning the card and the
/// canonical `(delta0, delta1)` pair that accompanies the share on the
/// wire.
pub fn prepare_decrypt_data(
    deck: &CompressedDeck,
    card_index: usize,
) -> Result<(ElGamalCiphertext, (Fq, Fq)), CodecError> {
    let deltas = deck.card_deltas(card_index)?;
    let card = deck.decompress_card(card_index, deltas.0, deltas.1)?;
    Ok((card, deltas))
}

/// Uncompressed path: the card's points are already explicit in the deal
/// record.
pub fn build_deal_witness(card: &ElGamalCiphertext, keypair: &KeyPair) -> DealWitness {
    let share = card.c0.mul(keypair.secret());
    DealWitness {
        public: DealPublicInput {
            share,
            card: *card,
            player_pk: keypair.pk,
        },
        sk: *keypair.secret(),
        deltas: None,
    }
}

/// Compressed path: first decryptor of a card, which also supplies the
/// decompression deltas.
pub fn build_deal_witness_compressed(
    deck: &CompressedDeck,
    card_index: usize,
    keypair: &KeyPair,
) -> Result<DealWitness, WitnessError> {
    let (card, deltas) = prepare_decrypt_data(deck, card_index)?;
    let mut witness = build_deal_witness(&card, keypair);
    witness.deltas = Some(deltas);
    Ok(witness)
}

/// Recipient-side finish: with every other share already subtracted from
/// `c1`, removing the recipient's own share yields the plaintext point.
pub fn recover_card(card: &ElGamalCiphertext, keypair: &KeyPair) -> Point {
    card.sub_share(&card.c0.mul(keypair.secret())).c1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::initial_deck;
    use crate::keys::aggregate_public_keys;
    use crate::witness::shuffle::{build_shuffle_witness, sample_randomness, Permutation};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn shares_from_every_player_recover_the_card() {
        let mut rng = StdRng::seed_from_u64(71);
        let players: Vec<_> = (0..3).map(|_| KeyPair::generate(&mut rng)).collect();
        let pks: Vec<_> = players.iter().map(|kp| kp.pk).collect();
        let aggregated = aggregate_public_keys(&pks).unwrap();
        let table = initial_deck(30);

        // One shuffle so the card actually carries an encryption layer.
        let witness = build_shuffle_witness(
            table.compressed(),
            Permutation::sample(30, &mut rng),
            sample_randomness(30, &mut rng),
            aggregated,
            Fq::from(5u64),
        )
        .unwrap();

        let (mut card, deltas) = prepare_decrypt_data(&witness.public.output, 0).unwrap();
        let first = build_deal_witness_compressed(&witness.public.output, 0, &players[1]).unwrap();
        assert_eq!(first.deltas, Some(deltas));
        assert!(first.satisfies_relation());
        card = card.sub_share(&first.public.share);

        let second = build_deal_witness(&card, &players[2]);
        assert!(second.satisfies_relation());
        card = card.sub_share(&second.public.share);

        let plaintext = recover_card(&card, &players[0]);
        assert!(table.search(&plaintext).is_some());
    }

    #[test]
    fn tampered_share_fails_the_relation() {
        let mut rng = StdRng::seed_from_u64(73);
        let keys = KeyPair::generate(&mut rng);
        let table = initial_deck(30);
        let mut witness =
            build_deal_witness_compressed(table.compressed(), 3, &keys).unwrap();
        witness.public.share = witness.public.share.add(&Point::GENERATOR);
        assert!(!witness.satisfies_relation());
    }

    #[test]
    fn signal_layout_roundtrip() {
        let mut rng = StdRng::seed_from_u64(79);
        let keys = KeyPair::generate(&mut rng);
        let table = initial_deck(52);
        let witness = build_deal_witness_compressed(table.compressed(), 7, &keys).unwrap();

        let signals = witness.public.flatten();
        assert_eq!(signals.len(), DealPublicInput::SIGNAL_LEN);
        assert_eq!(DealPublicInput::from_signals(&signals).unwrap(), witness.public);
        assert_eq!(
            DealPublicInput::from_signals(&signals[..7]).unwrap_err(),
            WitnessError::MalformedSignals {
                expected: 8,
                got: 7
            }
        );
    }
}
