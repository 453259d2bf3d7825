//! Baby Jubjub arithmetic in the affine coordinates the wire format uses.
//!
//! The curve is `A·x² + y² = 1 + D·x²·y²` over the BN254 scalar field, with
//! the `(0, 0)` sentinel standing in for the group identity so that points
//! round-trip through the compressed deck encoding unchanged.

use ark_ff::{BigInteger, Field, MontFp, PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use thiserror::Error;

/// Base field of Baby Jubjub, i.e. the BN254 scalar field of order
/// 21888242871839275222246405745257275088548364400416034343698204186575808495617.
pub use ark_ed_on_bn254::Fq;
/// Scalar field: the 251-bit prime order of the Base8 subgroup.
pub use ark_ed_on_bn254::Fr;

pub const COEFF_A: Fq = MontFp!("168700");
pub const COEFF_D: Fq = MontFp!("168696");

/// `(Q - 1) / 2`, the cutoff below which a y-coordinate is its own
/// canonical representative in the compressed encoding.
pub const HALF_Q: Fq =
    MontFp!("10944121435919637611123202872628637544274182200208017171849102093287904247808");

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveError {
    #[error("point is not on the curve")]
    NotOnCurve,
    #[error("scalar is not reduced modulo the subgroup order")]
    InvalidScalar,
}

/// Affine Baby Jubjub point. `(0, 0)` is the identity sentinel; every other
/// value of this type is expected to satisfy the curve equation.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, CanonicalSerialize, CanonicalDeserialize, Default,
)]
pub struct Point {
    pub x: Fq,
    pub y: Fq,
}

impl Point {
    pub const IDENTITY: Point = Point {
        x: MontFp!("0"),
        y: MontFp!("0"),
    };

    /// Base8, the canonical generator of the prime-order subgroup.
    pub const GENERATOR: Point = Point {
        x: MontFp!("5299619240641551281634865583518297030282874472190772894086521144482721001553"),
        y: MontFp!(
            "16950150798460657717958625567821834550301663161624707787222815936182638968203"
        ),
    };

    pub const fn new(x: Fq, y: Fq) -> Self {
        Point { x, y }
    }

    pub fn is_identity(&self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }

    /// Checks `A·x² + y² = 1 + D·x²·y²`. The identity sentinel is not a
    /// curve point and is rejected here.
    pub fn is_on_curve(&self) -> bool {
        let xx = self.x.square();
        let yy = self.y.square();
        COEFF_A * xx + yy == Fq::ONE + COEFF_D * xx * yy
    }

    pub fn neg(&self) -> Point {
        Point {
            x: -self.x,
            y: self.y,
        }
    }

    /// Twisted-Edwards addition. Identity sentinels short-circuit, exact
    /// inverses collapse back to the sentinel, everything else goes through
    /// the complete addition formulas.
    pub fn add(&self, other: &Point) -> Point {
        if self.is_identity() {
            return *other;
        }
        if other.is_identity() {
            return *self;
        }
        if self.x == -other.x && self.y == other.y {
            return Point::IDENTITY;
        }

        let x1x2 = self.x * other.x;
        let y1y2 = self.y * other.y;
        let dxy = COEFF_D * x1x2 * y1y2;

        // Baby Jubjub satisfies the completeness conditions, so the
        // denominators cannot vanish for on-curve inputs.
        let x3 = (self.x * other.y + self.y * other.x)
            * (Fq::ONE + dxy)
                .inverse()
                .expect("complete twisted-Edwards addition");
        let y3 = (y1y2 - COEFF_A * x1x2)
            * (Fq::ONE - dxy)
                .inverse()
                .expect("complete twisted-Edwards addition");
        Point { x: x3, y: y3 }
    }

    pub fn sub(&self, other: &Point) -> Point {
        self.add(&other.neg())
    }

    pub fn double(&self) -> Point {
        self.add(self)
    }

    /// Double-and-add from the least significant bit.
    pub fn mul(&self, scalar: &Fr) -> Point {
        let mut acc = Point::IDENTITY;
        let mut base = *self;
        for bit in scalar.into_bigint().to_bits_le() {
            if bit {
                acc = acc.add(&base);
            }
            base = base.double();
        }
        acc
    }
}

/// Parses a scalar from canonical little-endian bytes, rejecting anything
/// not reduced modulo the subgroup order.
pub fn scalar_from_le_bytes(bytes: &[u8]) -> Result<Fr, CurveError> {
    Fr::deserialize_compressed(bytes).map_err(|_| CurveError::InvalidScalar)
}
