use std::cmp::Ordering;
use std::fmt;

use rug::{Complete, Integer};

use crate::error::{PiError, Result};

/// Signed GMP integer. Operations borrow their operands and return new values.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigInt(Integer);

impl BigInt {
    pub fn zero() -> Self {
        Self(Integer::new())
    }

    pub fn one() -> Self {
        Self(Integer::from(1))
    }

    /// `10^k`.
    pub fn pow10(k: u64) -> Result<Self> {
        let k = u32::try_from(k)
            .map_err(|_| PiError::Fatal(format!("10^{k} exceeds the addressable exponent")))?;
        Ok(Self(Integer::u_pow_u(10, k).complete()))
    }

    pub fn add(&self, other: &Self) -> Self {
        Self((&self.0 + &other.0).complete())
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self((&self.0 - &other.0).complete())
    }

    /// Subtraction of magnitudes: fails instead of going negative.
    pub fn checked_sub(&self, other: &Self) -> Result<Self> {
        if self.0 < other.0 {
            return Err(PiError::Underflow);
        }
        Ok(self.sub(other))
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self((&self.0 * &other.0).complete())
    }

    pub fn mul_u64(&self, n: u64) -> Self {
        Self((&self.0 * n).complete())
    }

    /// Floor division: `self = q * other + r` with `r` taking the sign of `other`.
    pub fn divmod(&self, other: &Self) -> Result<(Self, Self)> {
        if other.is_zero() {
            return Err(PiError::DivisionByZero);
        }
        let (q, r) = <(Integer, Integer)>::from(self.0.div_rem_floor_ref(&other.0));
        Ok((Self(q), Self(r)))
    }

    pub fn shl(&self, bits: u32) -> Self {
        Self((&self.0 << bits).complete())
    }

    /// Arithmetic shift right (rounds toward negative infinity).
    pub fn shr(&self, bits: u32) -> Self {
        Self((&self.0 >> bits).complete())
    }

    /// The lowest `bits` bits of the two's complement, so that
    /// `x == x.shr(k).shl(k) + x.low_bits(k)` for negative `x` too.
    pub fn low_bits(&self, bits: u32) -> Self {
        Self(self.0.keep_bits_ref(bits).complete())
    }

    pub fn neg(&self) -> Self {
        Self(-self.0.clone())
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn is_zero(&self) -> bool {
        self.0.cmp0() == Ordering::Equal
    }

    pub fn is_odd(&self) -> bool {
        self.0.is_odd()
    }

    /// Bit length of the magnitude; zero has none.
    pub fn bits(&self) -> u32 {
        self.0.significant_bits()
    }

    /// Bytes needed to hold the magnitude.
    pub fn byte_len(&self) -> u64 {
        (u64::from(self.bits()) + 7) / 8
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.0.to_u64()
    }

    pub fn to_decimal_string(&self) -> String {
        self.0.to_string_radix(10)
    }

    pub fn as_integer(&self) -> &Integer {
        &self.0
    }
}

impl From<Integer> for BigInt {
    fn from(value: Integer) -> Self {
        Self(value)
    }
}

impl From<u64> for BigInt {
    fn from(value: u64) -> Self {
        Self(Integer::from(value))
    }
}

impl From<i64> for BigInt {
    fn from(value: i64) -> Self {
        Self(Integer::from(value))
    }
}

impl From<u32> for BigInt {
    fn from(value: u32) -> Self {
        Self(Integer::from(value))
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(s: &str) -> BigInt {
        BigInt::from(s.parse::<Integer>().unwrap())
    }

    #[test]
    fn add_and_sub_leave_operands_untouched() {
        let a = big("123456789012345678901234567890");
        let b = big("987654321098765432109876543210");
        let sum = a.add(&b);
        assert_eq!(sum, big("1111111110111111111011111111100"));
        assert_eq!(sum.sub(&b), a);
        assert_eq!(a, big("123456789012345678901234567890"));
        assert_eq!(a.sub(&b), big("-864197532086419753208641975320"));
    }

    #[test]
    fn checked_sub_underflows() {
        let small = BigInt::from(5u64);
        let large = BigInt::from(7u64);
        assert_eq!(small.checked_sub(&large), Err(PiError::Underflow));
        assert_eq!(large.checked_sub(&small), Ok(BigInt::from(2u64)));
        assert_eq!(small.checked_sub(&small), Ok(BigInt::zero()));
    }

    #[test]
    fn mul_matches_known_product() {
        let a = big("340282366920938463463374607431768211457");
        let b = big("18446744073709551629");
        assert_eq!(
            a.mul(&b).to_decimal_string(),
            "6277101735386680768259460193179866441144672085150730813453"
        );
        assert_eq!(a.mul(&b.neg()), a.mul(&b).neg());
    }

    #[test]
    fn divmod_floors() {
        let (q, r) = BigInt::from(-7i64).divmod(&BigInt::from(2i64)).unwrap();
        assert_eq!((q, r), (BigInt::from(-4i64), BigInt::from(1i64)));

        let n = BigInt::pow10(40).unwrap().add(&BigInt::from(3u64));
        let (q, r) = n.divmod(&BigInt::pow10(20).unwrap()).unwrap();
        assert_eq!(q, BigInt::pow10(20).unwrap());
        assert_eq!(r, BigInt::from(3u64));
    }

    #[test]
    fn divmod_by_zero_fails() {
        assert_eq!(
            BigInt::one().divmod(&BigInt::zero()),
            Err(PiError::DivisionByZero)
        );
    }

    #[test]
    fn shifts_and_low_bits_recombine() {
        let x = big("98765432109876543210987654321");
        let hi = x.shr(64);
        let lo = x.low_bits(64);
        assert_eq!(hi.shl(64).add(&lo), x);
        assert!(lo.bits() <= 64);

        let negative = x.neg();
        let lo = negative.low_bits(64);
        assert!(!lo.is_negative());
        assert_eq!(negative.shr(64).shl(64).add(&lo), negative);
    }

    #[test]
    fn byte_len_rounds_up() {
        assert_eq!(BigInt::zero().byte_len(), 0);
        assert_eq!(BigInt::from(255u64).byte_len(), 1);
        assert_eq!(BigInt::from(256u64).byte_len(), 2);
    }
}
