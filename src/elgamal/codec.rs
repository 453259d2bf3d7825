//! Compressed deck codec.
//!
//! Each card slot stores only the two x-coordinates; the y-coordinates are
//! recovered from the curve equation plus one sign bit per point, packed
//! into two deck-wide selector bitvectors. This halves what the shared
//! store has to hold per card.

use ark_ff::{Field, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ElGamalCiphertext;
use crate::curve::{Fq, Point, COEFF_A, COEFF_D, HALF_Q};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("delta is not a canonical y-coordinate for this x")]
    IllFormedDelta,
    #[error("selector value does not fit the deck width")]
    IllFormedSelector,
    #[error("no curve point exists with this x-coordinate")]
    NoPointForX,
    #[error("card index {index} out of range for a {len}-card deck")]
    CardIndexOutOfRange { index: usize, len: usize },
    #[error("deck has {got} cards, expected {expected}")]
    DeckSize { expected: usize, got: usize },
}

/// A deck-wide bitvector, one bit per card slot. Decks are capped at 64
/// cards so a single limb suffices on the wire.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    CanonicalSerialize,
    CanonicalDeserialize,
)]
pub struct BitVector(u64);

pub const MAX_DECK_SIZE: usize = 64;

impl BitVector {
    pub const fn new(bits: u64) -> Self {
        BitVector(bits)
    }

    /// All bits below `len` set.
    pub fn full(len: usize) -> Self {
        debug_assert!(len >= 1 && len <= MAX_DECK_SIZE);
        BitVector(u64::MAX >> (MAX_DECK_SIZE - len))
    }

    pub fn bit(&self, index: usize) -> bool {
        self.0 >> index & 1 == 1
    }

    pub fn set(&mut self, index: usize) {
        self.0 |= 1 << index;
    }

    pub fn count_ones(&self) -> u32 {
        self.0.count_ones()
    }

    /// True when every bit of `other` is also set in `self`.
    pub fn covers(&self, other: &BitVector) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_DECK_SIZE).filter(|i| self.bit(*i))
    }

    pub fn to_field(self) -> Fq {
        Fq::from(self.0)
    }

    /// Reads a selector back out of a public-signal field element,
    /// rejecting anything that does not fit `len` bits.
    pub fn from_field(value: &Fq, len: usize) -> Result<Self, CodecError> {
        let limbs = value.into_bigint().0;
        let overflow =
            limbs[1..].iter().any(|l| *l != 0) || (len < MAX_DECK_SIZE && limbs[0] >> len != 0);
        if overflow {
            return Err(CodecError::IllFormedSelector);
        }
        Ok(BitVector(limbs[0]))
    }
}

/// Splits a point into `(x, sign)`. The sign bit is set when `y` itself is
/// the canonical representative, i.e. `y ≤ (Q−1)/2`.
pub fn compress_point(point: &Point) -> (Fq, bool) {
    (point.x, point.y.into_bigint() <= HALF_Q.into_bigint())
}

/// Recovers a y-coordinate from `(x, delta, sel)`. `delta` must be the
/// canonical root and `(x, delta)` must lie on the curve.
pub fn decompress_ec(x: Fq, delta: Fq, sel: bool) -> Result<Fq, CodecError> {
    if delta.into_bigint() > HALF_Q.into_bigint() {
        return Err(CodecError::IllFormedDelta);
    }
    if !Point::new(x, delta).is_on_curve() {
        return Err(CodecError::IllFormedDelta);
    }
    Ok(if sel { delta } else { -delta })
}

/// Canonical square root `sqrt((1 − A·x²)/(1 − D·x²))`, the value
/// `≤ (Q−1)/2`. This is what clients supply as `delta` the first time a
/// compressed card is dealt.
pub fn ec_x_to_delta(x: Fq) -> Result<Fq, CodecError> {
    let xx = x.square();
    let numerator = Fq::ONE - COEFF_A * xx;
    let denominator = Fq::ONE - COEFF_D * xx;
    let y_squared = numerator
        * denominator
            .inverse()
            .ok_or(CodecError::NoPointForX)?;
    let y = y_squared.sqrt().ok_or(CodecError::NoPointForX)?;
    Ok(if y.into_bigint() <= HALF_Q.into_bigint() {
        y
    } else {
        -y
    })
}

/// The deck as it lives on the shared store: per card the x-coordinates of
/// both ciphertext halves, plus the two selector bitvectors.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct CompressedDeck {
    pub x0: Vec<Fq>,
    pub x1: Vec<Fq>,
    pub selector0: BitVector,
    pub selector1: BitVector,
}

impl CompressedDeck {
    pub fn num_cards(&self) -> usize {
        self.x0.len()
    }

    pub fn compress(cards: &[ElGamalCiphertext]) -> Self {
        debug_assert!(cards.len() <= MAX_DECK_SIZE);
        let mut deck = CompressedDeck {
            x0: Vec::with_capacity(cards.len()),
            x1: Vec::with_capacity(cards.len()),
            selector0: BitVector::default(),
            selector1: BitVector::default(),
        };
        for (i, card) in cards.iter().enumerate() {
            let (x0, s0) = compress_point(&card.c0);
            let (x1, s1) = compress_point(&card.c1);
            deck.x0.push(x0);
            deck.x1.push(x1);
            if s0 {
                deck.selector0.set(i);
            }
            if s1 {
                deck.selector1.set(i);
            }
        }
        deck
    }

    /// The canonical `(delta0, delta1)` pair for a slot, recomputed from
    /// the curve equation.
    pub fn card_deltas(&self, index: usize) -> Result<(Fq, Fq), CodecError> {
        self.check_index(index)?;
        Ok((ec_x_to_delta(self.x0[index])?, ec_x_to_delta(self.x1[index])?))
    }

    /// Decompresses one slot from supplied deltas, re-verifying them
    /// against the curve equation and the stored selector bits.
    pub fn decompress_card(
        &self,
        index: usize,
        delta0: Fq,
        delta1: Fq,
    ) -> Result<ElGamalCiphertext, CodecError> {
        self.check_index(index)?;
        let y0 = decompress_ec(self.x0[index], delta0, self.selector0.bit(index))?;
        let y1 = decompress_ec(self.x1[index], delta1, self.selector1.bit(index))?;
        Ok(ElGamalCiphertext::new(
            Point::new(self.x0[index], y0),
            Point::new(self.x1[index], y1),
        ))
    }

    /// Decompresses the whole deck via the curve equation.
    pub fn decompress(&self) -> Result<Vec<ElGamalCiphertext>, CodecError> {
        (0..self.num_cards())
            .map(|i| {
                let (delta0, delta1) = self.card_deltas(i)?;
                self.decompress_card(i, delta0, delta1)
            })
            .collect()
    }

    fn check_index(&self, index: usize) -> Result<(), CodecError> {
        if index >= self.num_cards() {
            return Err(CodecError::CardIndexOutOfRange {
                index,
                len: self.num_cards(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Fr;
    use ark_std::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    fn random_point(rng: &mut StdRng) -> Point {
        Point::GENERATOR.mul(&Fr::rand(rng))
    }

    #[test]
    fn compress_roundtrip() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..32 {
            let p = random_point(&mut rng);
            let (x, sel) = compress_point(&p);
            let delta = ec_x_to_delta(x).unwrap();
            assert_eq!(decompress_ec(x, delta, sel).unwrap(), p.y);
        }
    }

    #[test]
    fn non_canonical_delta_rejected() {
        let mut rng = StdRng::seed_from_u64(19);
        let p = random_point(&mut rng);
        let (x, _) = compress_point(&p);
        let delta = ec_x_to_delta(x).unwrap();
        // Q - delta is the other root and lies above the cutoff.
        assert_eq!(
            decompress_ec(x, -delta, true),
            Err(CodecError::IllFormedDelta)
        );
    }

    #[test]
    fn off_curve_delta_rejected() {
        let mut rng = StdRng::seed_from_u64(23);
        let p = random_point(&mut rng);
        let q = random_point(&mut rng);
        let (x, _) = compress_point(&p);
        let wrong = ec_x_to_delta(q.x).unwrap();
        assert_eq!(
            decompress_ec(x, wrong, true),
            Err(CodecError::IllFormedDelta)
        );
    }

    #[test]
    fn selector_width_is_enforced() {
        let wide = Fq::from(1u128 << 70);
        assert_eq!(
            BitVector::from_field(&wide, 52),
            Err(CodecError::IllFormedSelector)
        );
        let narrow = Fq::from(0b1011u64);
        assert_eq!(
            BitVector::from_field(&narrow, 52).unwrap(),
            BitVector::new(0b1011)
        );
        assert_eq!(
            BitVector::from_field(&narrow, 3),
            Err(CodecError::IllFormedSelector)
        );
    }

    #[test]
    fn deck_roundtrip() {
        let mut rng = StdRng::seed_from_u64(29);
        let cards: Vec<_> = (0..8)
            .map(|_| ElGamalCiphertext::new(random_point(&mut rng), random_point(&mut rng)))
            .collect();
        let deck = CompressedDeck::compress(&cards);
        assert_eq!(deck.decompress().unwrap(), cards);
    }
}
