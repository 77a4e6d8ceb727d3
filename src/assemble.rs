use tracing::{debug, instrument};

use crate::bigint::BigInt;
use crate::context::RunContext;
use crate::error::Result;
use crate::split::Triple;
use crate::sqrt::sqrt_scaled;

pub const FACTOR: u64 = 426880;
pub const SQRT_RADICAND: u64 = 10005;

/// `floor(π * 10^(digits + 1))`: the requested digits plus one rounding digit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScaledPi {
    pub value: BigInt,
    pub digits: u64,
    /// Some nonzero remainder was dropped below the rounding digit.
    pub inexact: bool,
}

pub struct SeriesAssembler<'a> {
    ctx: &'a RunContext,
}

impl<'a> SeriesAssembler<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    #[instrument(level = "debug", skip(self, triple))]
    pub fn assemble(&self, triple: &Triple, digits: u64, guard_digits: u64) -> Result<ScaledPi> {
        self.ctx.checkpoint()?;
        let working = digits + 1 + guard_digits;
        let mul = self.ctx.multiplier();

        /*
          T/Q sums the series, which is 426880 * sqrt(10005) / π, so

                 426880 * sqrt(10005) * Q
          π  =  --------------------------
                            T
        */
        // the radicand scaled by 10^(2W) is about as large as its root squared
        let sqrt_c = sqrt_scaled(&BigInt::from(SQRT_RADICAND), working)?;
        let mut held = 3 * sqrt_c.byte_len();
        self.ctx.charge(held)?;
        debug!(bits = sqrt_c.bits(), "done sqrt");

        let numerator = mul.mul(&triple.q.mul_u64(FACTOR), &sqrt_c);
        held += numerator.byte_len();
        self.ctx.charge(numerator.byte_len())?;

        let (pi_working, rem) = numerator.divmod(&triple.t)?;
        debug!("done division");

        let (value, guard) = pi_working.divmod(&BigInt::pow10(guard_digits)?)?;
        self.ctx.release(held);

        Ok(ScaledPi {
            value,
            digits,
            inexact: !guard.is_zero() || !rem.is_zero(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::PiError;
    use crate::multiply::GmpMultiplier;
    use crate::split::{terms_for_digits, BinarySplitter};

    fn ctx() -> RunContext {
        RunContext::new(20, 20, u64::MAX, Arc::new(GmpMultiplier))
    }

    #[test]
    fn assembles_pi_with_rounding_digit() {
        let ctx = ctx();
        let terms = terms_for_digits(20 + 1 + 10);
        let triple = BinarySplitter::new(&ctx, u64::MAX).split(0, terms).unwrap();
        let scaled = SeriesAssembler::new(&ctx).assemble(&triple, 20, 10).unwrap();

        assert_eq!(scaled.value.to_decimal_string(), "3141592653589793238462");
        assert_eq!(scaled.digits, 20);
        assert!(scaled.inexact);
    }

    #[test]
    fn assembly_values_are_charged_and_released() {
        let ctx = ctx();
        let triple = BinarySplitter::new(&ctx, u64::MAX)
            .split(0, terms_for_digits(31))
            .unwrap();
        let held = ctx.gauge().live();
        SeriesAssembler::new(&ctx).assemble(&triple, 20, 10).unwrap();

        let root = sqrt_scaled(&BigInt::from(SQRT_RADICAND), 31).unwrap();
        assert!(ctx.gauge().peak() >= held + 3 * root.byte_len() + triple.q.byte_len());
        assert_eq!(ctx.gauge().live(), held);
    }

    #[test]
    fn zero_t_is_an_invariant_violation() {
        let ctx = ctx();
        let broken = Triple {
            p: BigInt::one(),
            q: BigInt::one(),
            t: BigInt::zero(),
        };
        assert_eq!(
            SeriesAssembler::new(&ctx).assemble(&broken, 5, 4),
            Err(PiError::DivisionByZero)
        );
    }
}
