//! Player keypairs and the joint encryption key.

use ark_std::UniformRand;
use rand::Rng;

use crate::curve::{CurveError, Fr, Point};

/// A player's ElGamal keypair. The secret scalar never leaves this type;
/// only proofs and public decryption shares derived from it do.
#[derive(Clone, Debug)]
pub struct KeyPair {
    sk: Fr,
    pub pk: Point,
}

impl KeyPair {
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        Self::from_secret(Fr::rand(rng))
    }

    pub fn from_secret(sk: Fr) -> Self {
        let pk = Point::GENERATOR.mul(&sk);
        Self { sk, pk }
    }

    pub(crate) fn secret(&self) -> &Fr {
        &self.sk
    }
}

/// Sums the players' public keys into the joint encryption key. Every
/// input is checked for curve membership first.
pub fn aggregate_public_keys(keys: &[Point]) -> Result<Point, CurveError> {
    let mut aggregated = Point::IDENTITY;
    for pk in keys {
        if !pk.is_on_curve() {
            return Err(CurveError::NotOnCurve);
        }
        aggregated = aggregated.add(pk);
    }
    Ok(aggregated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Fq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn aggregation_is_exact_point_sum() {
        let mut rng = StdRng::seed_from_u64(41);
        let pairs: Vec<_> = (0..4).map(|_| KeyPair::generate(&mut rng)).collect();
        let pks: Vec<_> = pairs.iter().map(|kp| kp.pk).collect();

        let aggregated = aggregate_public_keys(&pks).unwrap();

        let sk_sum = pairs.iter().fold(Fr::from(0u64), |acc, kp| acc + kp.secret());
        assert_eq!(aggregated, Point::GENERATOR.mul(&sk_sum));
    }

    #[test]
    fn off_curve_key_rejected() {
        let mut rng = StdRng::seed_from_u64(43);
        let good = KeyPair::generate(&mut rng).pk;
        let bad = Point::new(Fq::from(1u64), Fq::from(2u64));
        assert_eq!(
            aggregate_public_keys(&[good, bad]),
            Err(CurveError::NotOnCurve)
        );
    }
}
