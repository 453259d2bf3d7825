//! Mock proof system for tests and demo wiring.
//!
//! A "proof" is a Sha256 commitment over the flattened public signals, so
//! any tampering with the submitted signals fails verification exactly the
//! way a real backend rejection would. `prove` additionally checks the
//! native circuit relation, so a broken witness builder fails at proving
//! time rather than silently committing to garbage.

use ark_ff::PrimeField;
use ark_serialize::CanonicalSerialize;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use super::{DeckVerifier, PackedProof, ProofError, ProofScalar, ProofSystem};
use crate::curve::Fq;
use crate::witness::{DealPublicInput, DealWitness, ShufflePublicInput, ShuffleWitness};

const SHUFFLE_DOMAIN: &[u8] = b"zk-shuffle/mock/shuffle-v1";
const DEAL_DOMAIN: &[u8] = b"zk-shuffle/mock/deal-v1";

fn signal_commitment(domain: &[u8], signals: &[Fq]) -> PackedProof {
    let mut bytes = Vec::new();
    for signal in signals {
        signal
            .serialize_compressed(&mut bytes)
            .expect("infallible serialization");
    }
    let digest = Sha256::new()
        .chain_update(domain)
        .chain_update(&bytes)
        .finalize();
    PackedProof(core::array::from_fn(|i| {
        let limb = Sha256::new()
            .chain_update(digest)
            .chain_update([i as u8])
            .finalize();
        ProofScalar::from_le_bytes_mod_order(&limb)
    }))
}

/// Shuffle-circuit stand-in.
#[derive(Default)]
pub struct MockShuffleProofSystem;

impl ProofSystem for MockShuffleProofSystem {
    type PublicInput = ShufflePublicInput;
    type Witness = ShuffleWitness;
    type Proof = PackedProof;
    type Error = ProofError;

    fn prove<R: RngCore + CryptoRng>(
        &self,
        public_input: &Self::PublicInput,
        witness: &Self::Witness,
        _rng: &mut R,
    ) -> Result<Self::Proof, Self::Error> {
        if !witness.satisfies_relation() {
            return Err(ProofError::UnsatisfiedRelation);
        }
        Ok(signal_commitment(SHUFFLE_DOMAIN, &public_input.flatten()))
    }

    fn verify(
        &self,
        public_input: &Self::PublicInput,
        proof: &Self::Proof,
    ) -> Result<(), Self::Error> {
        if signal_commitment(SHUFFLE_DOMAIN, &public_input.flatten()) == *proof {
            Ok(())
        } else {
            Err(ProofError::Backend("commitment mismatch".into()))
        }
    }
}

/// Decrypt-circuit stand-in.
#[derive(Default)]
pub struct MockDealProofSystem;

impl ProofSystem for MockDealProofSystem {
    type PublicInput = DealPublicInput;
    type Witness = DealWitness;
    type Proof = PackedProof;
    type Error = ProofError;

    fn prove<R: RngCore + CryptoRng>(
        &self,
        public_input: &Self::PublicInput,
        witness: &Self::Witness,
        _rng: &mut R,
    ) -> Result<Self::Proof, Self::Error> {
        if !witness.satisfies_relation() {
            return Err(ProofError::UnsatisfiedRelation);
        }
        Ok(signal_commitment(DEAL_DOMAIN, &public_input.flatten()))
    }

    fn verify(
        &self,
        public_input: &Self::PublicInput,
        proof: &Self::Proof,
    ) -> Result<(), Self::Error> {
        if signal_commitment(DEAL_DOMAIN, &public_input.flatten()) == *proof {
            Ok(())
        } else {
            Err(ProofError::Backend("commitment mismatch".into()))
        }
    }
}

/// The matching verifier the engine plugs in wherever a real
/// `Groth16DeckVerifier` would go.
#[derive(Default)]
pub struct MockVerifier;

impl DeckVerifier for MockVerifier {
    fn verify_shuffle(&self, public: &ShufflePublicInput, proof: &PackedProof) -> bool {
        signal_commitment(SHUFFLE_DOMAIN, &public.flatten()) == *proof
    }

    fn verify_deal(&self, public: &DealPublicInput, proof: &PackedProof) -> bool {
        signal_commitment(DEAL_DOMAIN, &public.flatten()) == *proof
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Point;
    use crate::elgamal::initial_deck;
    use crate::keys::KeyPair;
    use crate::witness::{build_deal_witness_compressed, build_shuffle_witness, sample_randomness, Permutation};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn shuffle_proof_binds_the_signals() {
        let mut rng = StdRng::seed_from_u64(83);
        let keys = KeyPair::generate(&mut rng);
        let table = initial_deck(30);
        let witness = build_shuffle_witness(
            table.compressed(),
            Permutation::sample(30, &mut rng),
            sample_randomness(30, &mut rng),
            keys.pk,
            crate::curve::Fq::from(1u64),
        )
        .unwrap();

        let system = MockShuffleProofSystem;
        let proof = system.prove(&witness.public, &witness, &mut rng).unwrap();
        assert!(system.verify(&witness.public, &proof).is_ok());
        assert!(MockVerifier.verify_shuffle(&witness.public, &proof));

        let mut tampered = witness.public.clone();
        tampered.output.x0[3] = tampered.output.x0[4];
        assert!(!MockVerifier.verify_shuffle(&tampered, &proof));
    }

    #[test]
    fn deal_proof_rejects_bad_witness() {
        let mut rng = StdRng::seed_from_u64(89);
        let keys = KeyPair::generate(&mut rng);
        let table = initial_deck(30);
        let mut witness =
            build_deal_witness_compressed(table.compressed(), 2, &keys).unwrap();
        witness.public.share = witness.public.share.add(&Point::GENERATOR);

        let system = MockDealProofSystem;
        assert!(matches!(
            system.prove(&witness.public, &witness, &mut rng),
            Err(ProofError::UnsatisfiedRelation)
        ));
    }
}
