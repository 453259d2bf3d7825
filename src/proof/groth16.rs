//! Verify-only Groth16 backend. Proving keys and the circuits themselves
//! are external artifacts; the state machine only ever needs the prepared
//! verifying keys.

use ark_bn254::Bn254;
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::{prepare_verifying_key, Groth16, PreparedVerifyingKey, VerifyingKey};
use ark_snark::SNARK;

use super::{DeckVerifier, PackedProof};
use crate::curve::Fq;
use crate::witness::{DealPublicInput, ShufflePublicInput};

const LOG_TARGET: &str = "zk_shuffle::proof::groth16";

pub struct Groth16DeckVerifier {
    shuffle_vk: PreparedVerifyingKey<Bn254>,
    deal_vk: PreparedVerifyingKey<Bn254>,
}

impl Groth16DeckVerifier {
    pub fn new(shuffle_vk: VerifyingKey<Bn254>, deal_vk: VerifyingKey<Bn254>) -> Self {
        Self {
            shuffle_vk: prepare_verifying_key(&shuffle_vk),
            deal_vk: prepare_verifying_key(&deal_vk),
        }
    }

    fn check(&self, pvk: &PreparedVerifyingKey<Bn254>, signals: &[Fq], proof: &PackedProof) -> bool {
        let inputs: Vec<ark_bn254::Fr> = signals.iter().map(to_pairing_scalar).collect();
        match Groth16::<Bn254>::verify_with_processed_vk(pvk, &inputs, &proof.to_groth16()) {
            Ok(valid) => valid,
            Err(err) => {
                tracing::warn!(target: LOG_TARGET, %err, "groth16 verification errored");
                false
            }
        }
    }
}

impl DeckVerifier for Groth16DeckVerifier {
    fn verify_shuffle(&self, public: &ShufflePublicInput, proof: &PackedProof) -> bool {
        self.check(&self.shuffle_vk, &public.flatten(), proof)
    }

    fn verify_deal(&self, public: &DealPublicInput, proof: &PackedProof) -> bool {
        self.check(&self.deal_vk, &public.flatten(), proof)
    }
}

// Same modulus on both sides; the detour through bytes keeps this
// independent of how the embedded curve names its base field.
fn to_pairing_scalar(x: &Fq) -> ark_bn254::Fr {
    ark_bn254::Fr::from_le_bytes_mod_order(&x.into_bigint().to_bytes_le())
}
