use rug::{Complete, Integer};

use crate::bigint::BigInt;
use crate::error::{PiError, Result};

/// Inputs this short are solved directly from a power-of-two upper bound.
const BASE_BITS: u32 = 128;
/// Newton steps from the `2^ceil(bits/2)` starting guess; enough for `BASE_BITS`.
const BASE_STEPS: u32 = 8;
const LIFT_STEPS: u32 = 2;
const MAX_SETTLE: u32 = 2;

/// `floor(sqrt(x))`.
pub fn isqrt(x: &BigInt) -> Result<BigInt> {
    if x.is_negative() {
        return Err(PiError::InvalidInput(
            "square root of a negative number".to_string(),
        ));
    }
    Ok(BigInt::from(isqrt_nonneg(x.as_integer())))
}

/// `floor(sqrt(x) * 10^digits)`.
pub fn sqrt_scaled(x: &BigInt, digits: u64) -> Result<BigInt> {
    if x.is_negative() {
        return Err(PiError::InvalidInput(
            "square root of a negative number".to_string(),
        ));
    }
    let scale = BigInt::pow10(digits.checked_mul(2).ok_or_else(|| {
        PiError::Fatal(format!("square root scale of {digits} digits overflows"))
    })?)?;
    isqrt(&x.mul(&scale))
}

// If r = isqrt(y >> 2k) then (r + 1) << k bounds sqrt(y) from above with relative
// error below 2^-(bits/4); two floor Newton steps from above bring it within one.
fn isqrt_nonneg(y: &Integer) -> Integer {
    let bits = y.significant_bits();
    if bits == 0 {
        return Integer::new();
    }

    if bits <= BASE_BITS {
        let s = Integer::from(1) << ((bits + 1) / 2);
        return settle(newton(s, y, BASE_STEPS), y);
    }

    let k = bits / 4;
    let r = isqrt_nonneg(&(y >> (2 * k)).complete());
    let s = (r + 1u32) << k;
    settle(newton(s, y, LIFT_STEPS), y)
}

/// Floor Newton steps starting from an upper bound; never drops below the floor.
fn newton(mut s: Integer, y: &Integer, steps: u32) -> Integer {
    for _ in 0..steps {
        let next = (y / &s).complete() + &s;
        let next = next >> 1u32;
        if next >= s {
            break;
        }
        s = next;
    }
    s
}

fn settle(mut s: Integer, y: &Integer) -> Integer {
    for _ in 0..MAX_SETTLE {
        if s.square_ref().complete() <= *y {
            break;
        }
        s -= 1u32;
    }
    debug_assert!(s.square_ref().complete() <= *y);
    debug_assert!((&s + 1u32).complete().square() > *y);
    s
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn assert_floor_root(y: &BigInt, r: &BigInt) {
        let next = r.add(&BigInt::one());
        assert!(r.mul(r) <= *y, "{r}^2 > {y}");
        assert!(next.mul(&next) > *y, "({r}+1)^2 <= {y}");
    }

    #[test]
    fn small_values() {
        for n in 0u64..2_000 {
            let r = isqrt(&BigInt::from(n)).unwrap();
            assert_eq!(r.to_u64(), Some((n as f64).sqrt().floor() as u64), "{n}");
        }
    }

    #[test]
    fn perfect_squares_scale_exactly() {
        let root = BigInt::from(123_456_789u64);
        let square = root.mul(&root);
        let scaled = sqrt_scaled(&square, 50).unwrap();
        assert_eq!(scaled, root.mul(&BigInt::pow10(50).unwrap()));
    }

    #[test]
    fn sqrt_10005_digits() {
        // sqrt(10005) = 100.02499687578100594...
        let r = sqrt_scaled(&BigInt::from(10005u64), 17).unwrap();
        assert_eq!(r.to_decimal_string(), "10002499687578100594");
    }

    #[test]
    fn non_squares_land_on_the_floor() {
        let mut rng = StdRng::seed_from_u64(10005);
        for _ in 0..40 {
            let mut y = BigInt::from(rng.gen_range(1..u64::MAX));
            for _ in 0..rng.gen_range(0..40) {
                y = y.shl(64).add(&BigInt::from(rng.gen::<u64>()));
            }
            let r = isqrt(&y).unwrap();
            assert_floor_root(&y, &r);
            assert_eq!(r.as_integer(), &y.as_integer().clone().sqrt());
        }
    }

    #[test]
    fn scaled_root_is_within_one_unit() {
        let x = BigInt::from(2u64);
        let p = 300;
        let r = sqrt_scaled(&x, p).unwrap();
        let target = x.mul(&BigInt::pow10(2 * p).unwrap());
        assert_floor_root(&target, &r);
    }

    #[test]
    fn negative_input_is_rejected() {
        assert!(matches!(
            isqrt(&BigInt::from(-4i64)),
            Err(PiError::InvalidInput(_))
        ));
        assert!(matches!(
            sqrt_scaled(&BigInt::from(-1i64), 3),
            Err(PiError::InvalidInput(_))
        ));
    }
}
