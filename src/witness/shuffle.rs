//! Shuffle witness: permute the deck, add one encryption layer per card
//! under the aggregated key, recompress. The prover and the verifying
//! state machine must agree on every byte of the result.

use rand::seq::SliceRandom;
use rand::Rng;

use ark_std::UniformRand;

use super::WitnessError;
use crate::curve::{Fq, Fr, Point};
use crate::elgamal::{BitVector, CompressedDeck};

/// A validated permutation of `[0, N)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation(Vec<usize>);

impl Permutation {
    pub fn new(map: Vec<usize>) -> Result<Self, WitnessError> {
        let mut seen = vec![false; map.len()];
        for &target in &map {
            if target >= map.len() || seen[target] {
                return Err(WitnessError::InvalidPermutation);
            }
            seen[target] = true;
        }
        Ok(Self(map))
    }

    /// Uniform sample via Fisher–Yates.
    pub fn sample<R: Rng>(len: usize, rng: &mut R) -> Self {
        let mut map: Vec<usize> = (0..len).collect();
        map.shuffle(rng);
        Self(map)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

/// Uniform re-randomization scalars, one per card.
pub fn sample_randomness<R: Rng>(len: usize, rng: &mut R) -> Vec<Fr> {
    (0..len).map(|_| Fr::rand(rng)).collect()
}

/// Public signals of the shuffle circuit. Flattened layout, for a deck of
/// `N` cards (`4N + 7` field elements):
///
/// ```text
/// [0..3)          nonce, pk.x, pk.y
/// [3..3+N)        UX0
/// [3+N..3+2N)     UX1
/// [3+2N..3+3N)    VX0
/// [3+3N..3+4N)    VX1
/// [3+4N..5+4N)    input selectors 0, 1
/// [5+4N..7+4N)    output selectors 0, 1
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShufflePublicInput {
    pub nonce: Fq,
    pub aggregated_pk: Point,
    pub input: CompressedDeck,
    pub output: CompressedDeck,
}

impl ShufflePublicInput {
    pub fn signal_len(num_cards: usize) -> usize {
        4 * num_cards + 7
    }

    pub fn flatten(&self) -> Vec<Fq> {
        let n = self.input.num_cards();
        let mut signals = Vec::with_capacity(Self::signal_len(n));
        signals.push(self.nonce);
        signals.push(self.aggregated_pk.x);
        signals.push(self.aggregated_pk.y);
        signals.extend_from_slice(&self.input.x0);
        signals.extend_from_slice(&self.input.x1);
        signals.extend_from_slice(&self.output.x0);
        signals.extend_from_slice(&self.output.x1);
        signals.push(self.input.selector0.to_field());
        signals.push(self.input.selector1.to_field());
        signals.push(self.output.selector0.to_field());
        signals.push(self.output.selector1.to_field());
        signals
    }

    /// Parses a raw signal vector, rejecting malformed lengths and
    /// selectors wider than the deck.
    pub fn from_signals(signals: &[Fq], num_cards: usize) -> Result<Self, WitnessError> {
        let expected = Self::signal_len(num_cards);
        if signals.len() != expected {
            return Err(WitnessError::MalformedSignals {
                expected,
                got: signals.len(),
            });
        }
        let n = num_cards;
        let column = |offset: usize| signals[3 + offset * n..3 + (offset + 1) * n].to_vec();
        let selector = |offset: usize| BitVector::from_field(&signals[3 + 4 * n + offset], n);
        Ok(Self {
            nonce: signals[0],
            aggregated_pk: Point::new(signals[1], signals[2]),
            input: CompressedDeck {
                x0: column(0),
                x1: column(1),
                selector0: selector(0)?,
                selector1: selector(1)?,
            },
            output: CompressedDeck {
                x0: column(2),
                x1: column(3),
                selector0: selector(2)?,
                selector1: selector(3)?,
            },
        })
    }
}

/// Everything the shuffle prover consumes: the public signals plus the
/// secret permutation, randomness and both decks' y-coordinates.
#[derive(Clone, Debug)]
pub struct ShuffleWitness {
    pub public: ShufflePublicInput,
    pub permutation: Permutation,
    pub randomness: Vec<Fr>,
    /// y-coordinates of the input deck, per card `(y0, y1)`.
    pub input_deltas: Vec<(Fq, Fq)>,
    /// y-coordinates of the output deck, per card `(y0, y1)`.
    pub output_deltas: Vec<(Fq, Fq)>,
}

impl ShuffleWitness {
    /// Native check of the circuit relation: the output deck is the
    /// permuted input with one encryption layer added per card.
    pub fn satisfies_relation(&self) -> bool {
        let input = match self.public.input.decompress() {
            Ok(cards) => cards,
            Err(_) => return false,
        };
        let n = input.len();
        if self.permutation.len() != n || self.randomness.len() != n {
            return false;
        }
        let output: Vec<_> = self
            .permutation
            .as_slice()
            .iter()
            .zip(&self.randomness)
            .map(|(&i, r)| input[i].rerandomize(r, &self.public.aggregated_pk))
            .collect();
        CompressedDeck::compress(&output) == self.public.output
    }
}

/// Builds the witness for one shuffle turn over `deck`.
pub fn build_shuffle_witness(
    deck: &CompressedDeck,
    permutation: Permutation,
    randomness: Vec<Fr>,
    aggregated_pk: Point,
    nonce: Fq,
) -> Result<ShuffleWitness, WitnessError> {
    let n = deck.num_cards();
    if permutation.len() != n {
        return Err(WitnessError::LengthMismatch {
            expected: n,
            got: permutation.len(),
        });
    }
    if randomness.len() != n {
        return Err(WitnessError::LengthMismatch {
            expected: n,
            got: randomness.len(),
        });
    }
    if !aggregated_pk.is_on_curve() {
        return Err(WitnessError::Curve(crate::curve::CurveError::NotOnCurve));
    }

    let input_cards = deck.decompress()?;
    let output_cards: Vec<_> = permutation
        .as_slice()
        .iter()
        .zip(&randomness)
        .map(|(&i, r)| input_cards[i].rerandomize(r, &aggregated_pk))
        .collect();

    let input_deltas = input_cards.iter().map(|c| (c.c0.y, c.c1.y)).collect();
    let output_deltas = output_cards.iter().map(|c| (c.c0.y, c.c1.y)).collect();
    let output = CompressedDeck::compress(&output_cards);

    Ok(ShuffleWitness {
        public: ShufflePublicInput {
            nonce,
            aggregated_pk,
            input: deck.clone(),
            output,
        },
        permutation,
        randomness,
        input_deltas,
        output_deltas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::initial_deck;
    use crate::keys::KeyPair;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn rejects_malformed_permutations() {
        assert!(Permutation::new(vec![0, 1, 2]).is_ok());
        assert_eq!(
            Permutation::new(vec![0, 0, 2]).unwrap_err(),
            WitnessError::InvalidPermutation
        );
        assert_eq!(
            Permutation::new(vec![0, 3, 1]).unwrap_err(),
            WitnessError::InvalidPermutation
        );
    }

    #[test]
    fn shuffle_permutes_the_plaintexts() {
        let mut rng = StdRng::seed_from_u64(57);
        let keys = KeyPair::generate(&mut rng);
        let table = initial_deck(30);

        let permutation = Permutation::sample(30, &mut rng);
        let randomness = sample_randomness(30, &mut rng);
        let witness = build_shuffle_witness(
            table.compressed(),
            permutation.clone(),
            randomness,
            keys.pk,
            Fq::from(1u64),
        )
        .unwrap();

        assert!(witness.satisfies_relation());

        // Stripping the single encryption layer must reveal the permuted
        // initial card points.
        let output = witness.public.output.decompress().unwrap();
        for (j, card) in output.iter().enumerate() {
            let plaintext = card.sub_share(&card.c0.mul(keys.secret())).c1;
            assert_eq!(plaintext, table.points()[permutation.as_slice()[j]]);
        }
    }

    #[test]
    fn signals_roundtrip() {
        let mut rng = StdRng::seed_from_u64(61);
        let keys = KeyPair::generate(&mut rng);
        let table = initial_deck(30);
        let witness = build_shuffle_witness(
            table.compressed(),
            Permutation::sample(30, &mut rng),
            sample_randomness(30, &mut rng),
            keys.pk,
            Fq::from(9u64),
        )
        .unwrap();

        let signals = witness.public.flatten();
        assert_eq!(signals.len(), ShufflePublicInput::signal_len(30));
        let parsed = ShufflePublicInput::from_signals(&signals, 30).unwrap();
        assert_eq!(parsed, witness.public);

        assert_eq!(
            ShufflePublicInput::from_signals(&signals[1..], 30).unwrap_err(),
            WitnessError::MalformedSignals {
                expected: 127,
                got: 126
            }
        );
    }

    #[test]
    fn randomness_length_is_checked() {
        let mut rng = StdRng::seed_from_u64(67);
        let keys = KeyPair::generate(&mut rng);
        let table = initial_deck(30);
        let err = build_shuffle_witness(
            table.compressed(),
            Permutation::sample(30, &mut rng),
            sample_randomness(29, &mut rng),
            keys.pk,
            Fq::from(1u64),
        )
        .unwrap_err();
        assert_eq!(
            err,
            WitnessError::LengthMismatch {
                expected: 30,
                got: 29
            }
        );
    }
}
