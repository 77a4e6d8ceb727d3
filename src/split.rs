use tracing::{debug, instrument};

use crate::bigint::BigInt;
use crate::context::RunContext;
use crate::error::{PiError, Result};
use crate::multiply::Multiplier;

pub const A: u64 = 13591409;
pub const B: u64 = 545140134;
pub const C: u64 = 640320;
/// `C^3 / 24`
pub const C3_OVER_24: u64 = 10939058860032000;

pub const DIGITS_PER_TERM: f64 = 14.1816474627254776555;

/// Number of series terms needed for `digits` correct decimal digits.
pub fn terms_for_digits(digits: u64) -> u64 {
    (digits as f64 / DIGITS_PER_TERM).ceil() as u64 + 1
}

/// `(P, Q, T)` of a term range. Depends only on the range, not on how it was cut.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Triple {
    pub p: BigInt,
    pub q: BigInt,
    pub t: BigInt,
}

impl Triple {
    /// The single-term triple for index `k`.
    pub fn leaf(k: u64) -> Self {
        if k == 0 {
            return Self {
                p: BigInt::one(),
                q: BigInt::one(),
                t: BigInt::from(A),
            };
        }

        /*
          p(k) = -(6k-5)(2k-1)(6k-1)
          q(k) = k^3 * C^3 / 24
          t(k) = p(k) * (A + Bk)
        */
        let p = BigInt::from(6 * k - 5)
            .mul_u64(2 * k - 1)
            .mul_u64(6 * k - 1)
            .neg();

        let q = BigInt::from(k).mul_u64(k).mul_u64(k).mul_u64(C3_OVER_24);

        let t = p.mul(&BigInt::from(B).mul_u64(k).add(&BigInt::from(A)));

        Self { p, q, t }
    }

    /// Joins the triples of `[a, m)` and `[m, b)` into the triple of `[a, b)`.
    pub fn combine(left: &Self, right: &Self, mul: &dyn Multiplier) -> Self {
        /*
          p(a,b) = p(a,m) * p(m,b)
          q(a,b) = q(a,m) * q(m,b)
          t(a,b) = q(m,b) * t(a,m) + p(a,m) * t(m,b)
        */
        let p = mul.mul(&left.p, &right.p);
        let q = mul.mul(&left.q, &right.q);
        let t = mul.mul(&right.q, &left.t).add(&mul.mul(&left.p, &right.t));

        Self { p, q, t }
    }

    pub fn byte_len(&self) -> u64 {
        self.p.byte_len() + self.q.byte_len() + self.t.byte_len()
    }
}

pub struct BinarySplitter<'a> {
    ctx: &'a RunContext,
    parallel_cutoff: u64,
}

impl<'a> BinarySplitter<'a> {
    /// Ranges with at least `parallel_cutoff` terms fork their halves onto the
    /// current rayon pool; smaller ones recurse on the calling thread.
    pub fn new(ctx: &'a RunContext, parallel_cutoff: u64) -> Self {
        Self {
            ctx,
            parallel_cutoff: parallel_cutoff.max(2),
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub fn split(&self, from: u64, to: u64) -> Result<Triple> {
        if to <= from {
            return Err(PiError::InvalidInput(format!(
                "empty term range [{from}, {to})"
            )));
        }

        let triple = self.bs(from, to)?;
        debug!(
            bytes = triple.byte_len(),
            peak = self.ctx.gauge().peak(),
            "done splitting"
        );
        Ok(triple)
    }

    fn bs(&self, a: u64, b: u64) -> Result<Triple> {
        self.ctx.checkpoint()?;

        let triple = if b - a == 1 {
            self.ctx.advance(1);
            Triple::leaf(a)
        } else {
            let m = a + (b - a) / 2;

            let (left, right) = if b - a >= self.parallel_cutoff {
                let (left, right) = rayon::join(|| self.bs(a, m), || self.bs(m, b));
                (left?, right?)
            } else {
                (self.bs(a, m)?, self.bs(m, b)?)
            };

            // the products being formed are about as large as both halves
            let halves = left.byte_len() + right.byte_len();
            self.ctx.charge(halves)?;
            let combined = Triple::combine(&left, &right, self.ctx.multiplier());
            self.ctx.release(2 * halves);
            combined
        };

        self.ctx.charge(triple.byte_len())?;
        Ok(triple)
    }
}
