use std::fmt;

use crate::bigint::BigInt;

/// Smallest tile the Karatsuba staging will cut an operand into.
pub const MIN_CUTOFF_BITS: u32 = 128;

pub trait Multiplier: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn mul(&self, a: &BigInt, b: &BigInt) -> BigInt;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GmpMultiplier;

impl Multiplier for GmpMultiplier {
    fn name(&self) -> &'static str {
        "gmp"
    }

    fn mul(&self, a: &BigInt, b: &BigInt) -> BigInt {
        a.mul(b)
    }
}

/// Stages large products as Karatsuba tiles of at most `cutoff_bits`, sized
/// for an accelerator's memory, and fans the sub-products out over rayon.
/// Tiles go to GMP. Exact, so it never changes a digit.
#[derive(Debug, Clone, Copy)]
pub struct KaratsubaMultiplier {
    cutoff_bits: u32,
}

impl KaratsubaMultiplier {
    pub fn new(cutoff_bits: u32) -> Self {
        Self {
            cutoff_bits: cutoff_bits.max(MIN_CUTOFF_BITS),
        }
    }

    pub fn cutoff_bits(&self) -> u32 {
        self.cutoff_bits
    }

    fn karatsuba(&self, x: &BigInt, y: &BigInt) -> BigInt {
        let shorter = x.bits().min(y.bits());
        if shorter < self.cutoff_bits {
            return x.mul(y);
        }

        // limb-aligned split point in the shorter operand
        let k = (shorter / 2) & !63;

        // floor shift and two's complement low bits: x == x1 * 2^k + x0 for any sign
        let (x1, x0) = (x.shr(k), x.low_bits(k));
        let (y1, y0) = (y.shr(k), y.low_bits(k));
        let xs = x1.add(&x0);
        let ys = y1.add(&y0);

        let (z2, (z0, z1)) = rayon::join(
            || self.karatsuba(&x1, &y1),
            || rayon::join(|| self.karatsuba(&x0, &y0), || self.karatsuba(&xs, &ys)),
        );

        let mid = z1.sub(&z2).sub(&z0);
        z2.shl(2 * k).add(&mid.shl(k)).add(&z0)
    }
}

impl Multiplier for KaratsubaMultiplier {
    fn name(&self) -> &'static str {
        "karatsuba-tiled"
    }

    fn mul(&self, a: &BigInt, b: &BigInt) -> BigInt {
        self.karatsuba(a, b)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn random_bigint(rng: &mut StdRng, limbs: usize) -> BigInt {
        let mut value = BigInt::zero();
        for _ in 0..limbs {
            value = value.shl(64).add(&BigInt::from(rng.gen::<u64>()));
        }
        if rng.gen_bool(0.5) {
            value.neg()
        } else {
            value
        }
    }

    #[test]
    fn cutoff_has_a_floor() {
        assert_eq!(KaratsubaMultiplier::new(1).cutoff_bits(), MIN_CUTOFF_BITS);
        assert_eq!(KaratsubaMultiplier::new(4096).cutoff_bits(), 4096);
    }

    #[test]
    fn karatsuba_matches_gmp_on_random_operands() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let tiled = KaratsubaMultiplier::new(MIN_CUTOFF_BITS);

        for _ in 0..50 {
            let a_limbs = rng.gen_range(1..80);
            let b_limbs = rng.gen_range(1..80);
            let a = random_bigint(&mut rng, a_limbs);
            let b = random_bigint(&mut rng, b_limbs);

            assert_eq!(tiled.mul(&a, &b), GmpMultiplier.mul(&a, &b));
        }
    }

    #[test]
    fn karatsuba_handles_zero_and_signs() {
        let tiled = KaratsubaMultiplier::new(MIN_CUTOFF_BITS);
        let big = BigInt::pow10(200).unwrap().add(&BigInt::from(7u64));

        assert_eq!(tiled.mul(&big, &BigInt::zero()), BigInt::zero());
        assert_eq!(tiled.mul(&big.neg(), &big.neg()), big.mul(&big));
        assert_eq!(tiled.mul(&big.neg(), &big), big.mul(&big).neg());
    }

    #[test]
    fn negative_operands_split_exactly() {
        let tiled = KaratsubaMultiplier::new(MIN_CUTOFF_BITS);
        // low halves of zero and all ones around the split point
        let a = BigInt::one().shl(640).neg();
        let b = BigInt::one().shl(512).sub(&BigInt::one()).neg();

        assert_eq!(tiled.mul(&a, &b), a.mul(&b));
        assert_eq!(tiled.mul(&a, &a), a.mul(&a));
        assert_eq!(tiled.mul(&b, &a.neg()), b.mul(&a.neg()));
    }
}
