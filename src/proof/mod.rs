//! Proof plumbing. The Groth16 prover/verifier pair is an external
//! collaborator; this module fixes the proof wire format, the trait
//! boundaries the engine and clients talk through, and the backends.

pub mod groth16;
pub mod mock;

pub use groth16::Groth16DeckVerifier;
pub use mock::{MockDealProofSystem, MockShuffleProofSystem, MockVerifier};

use ark_bn254::{Bn254, Fq2, G1Affine, G2Affine};
use ark_groth16::Proof;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{CryptoRng, RngCore};
use thiserror::Error;

use crate::witness::{DealPublicInput, ShufflePublicInput, WitnessError};

/// Coordinate field of the BN254 pairing groups the proofs live in.
pub type ProofScalar = ark_bn254::Fq;

#[derive(Error, Debug)]
pub enum ProofError {
    #[error("witness does not satisfy the circuit relation")]
    UnsatisfiedRelation,
    #[error(transparent)]
    Witness(#[from] WitnessError),
    #[error("proving backend failure: {0}")]
    Backend(String),
}

/// Generic proof system: prove against a witness, verify against public
/// input.
pub trait ProofSystem {
    type PublicInput;
    type Witness;
    type Proof;
    type Error;

    fn prove<R: RngCore + CryptoRng>(
        &self,
        public_input: &Self::PublicInput,
        witness: &Self::Witness,
        rng: &mut R,
    ) -> Result<Self::Proof, Self::Error>;

    fn verify(
        &self,
        public_input: &Self::PublicInput,
        proof: &Self::Proof,
    ) -> Result<(), Self::Error>;
}

/// The verify-only boundary the state machine depends on: one opaque
/// predicate per circuit.
pub trait DeckVerifier: Send + Sync {
    fn verify_shuffle(&self, public: &ShufflePublicInput, proof: &PackedProof) -> bool;
    fn verify_deal(&self, public: &DealPublicInput, proof: &PackedProof) -> bool;
}

/// A Groth16 proof `(a ∈ G1, b ∈ G2, c ∈ G1)` packed as 8 base-field
/// scalars `[a.x, a.y, b.x0, b.x1, b.y0, b.y1, c.x, c.y]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct PackedProof(pub [ProofScalar; 8]);

impl PackedProof {
    pub fn from_groth16(proof: &Proof<Bn254>) -> Self {
        PackedProof([
            proof.a.x,
            proof.a.y,
            proof.b.x.c0,
            proof.b.x.c1,
            proof.b.y.c0,
            proof.b.y.c1,
            proof.c.x,
            proof.c.y,
        ])
    }

    pub fn to_groth16(&self) -> Proof<Bn254> {
        Proof {
            a: G1Affine::new_unchecked(self.0[0], self.0[1]),
            b: G2Affine::new_unchecked(
                Fq2::new(self.0[2], self.0[3]),
                Fq2::new(self.0[4], self.0[5]),
            ),
            c: G1Affine::new_unchecked(self.0[6], self.0[7]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::AffineRepr;

    #[test]
    fn packed_proof_roundtrip() {
        let proof = Proof::<Bn254> {
            a: G1Affine::generator(),
            b: G2Affine::generator(),
            c: G1Affine::generator(),
        };
        let packed = PackedProof::from_groth16(&proof);
        let restored = packed.to_groth16();
        assert_eq!(restored.a, proof.a);
        assert_eq!(restored.b, proof.b);
        assert_eq!(restored.c, proof.c);
    }
}
