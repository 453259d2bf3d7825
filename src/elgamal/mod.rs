//! ElGamal over Baby Jubjub: ciphertext algebra, the compressed deck codec
//! and the fixed initial deck tables.

pub mod codec;
pub mod initial_deck;

pub use codec::{
    compress_point, decompress_ec, ec_x_to_delta, BitVector, CodecError, CompressedDeck,
};
pub use initial_deck::{initial_deck, InitialDeck, INVALID_CARD_INDEX};

use ark_ff::{AdditiveGroup, Field};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use crate::curve::{Fq, Fr, Point};

/// An ElGamal ciphertext `(c0, c1) = (r·G, M + r·pk)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct ElGamalCiphertext {
    pub c0: Point,
    pub c1: Point,
}

impl ElGamalCiphertext {
    pub fn new(c0: Point, c1: Point) -> Self {
        Self { c0, c1 }
    }

    /// Trivial encryption of a plaintext point: zero randomness, so `c0` is
    /// the curve's neutral element `(0, 1)` and `c1` carries the message.
    pub fn from_plaintext(message: Point) -> Self {
        Self {
            c0: Point::new(Fq::ZERO, Fq::ONE),
            c1: message,
        }
    }

    /// Adds an encryption layer under `pk`: `(c0 + r·G, c1 + r·pk)`.
    pub fn rerandomize(&self, randomness: &Fr, public_key: &Point) -> Self {
        Self {
            c0: self.c0.add(&Point::GENERATOR.mul(randomness)),
            c1: self.c1.add(&public_key.mul(randomness)),
        }
    }

    /// Removes one player's decryption share from `c1`.
    pub fn sub_share(&self, share: &Point) -> Self {
        Self {
            c0: self.c0,
            c1: self.c1.sub(share),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use ark_std::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn rerandomize_then_decrypt_recovers_plaintext() {
        let mut rng = StdRng::seed_from_u64(3);
        let keys = KeyPair::generate(&mut rng);
        let message = Point::GENERATOR.mul(&Fr::rand(&mut rng));

        let ct = ElGamalCiphertext::from_plaintext(message)
            .rerandomize(&Fr::rand(&mut rng), &keys.pk)
            .rerandomize(&Fr::rand(&mut rng), &keys.pk);

        let share = ct.c0.mul(keys.secret());
        assert_eq!(ct.sub_share(&share).c1, message);
    }
}
