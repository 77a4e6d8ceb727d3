//! Decimal digits of π from the Chudnovsky series.
//!
//! ```text
//!                      426880 * sqrt(10005)
//!  pi = ---------------------------------------------
//!         _inf_
//!         \     (6k)! * (13591409 + 545140134 k)
//!          \    -----------------------------------
//!          /     (3k)! * (k!)^3 * (-640320)^(3k)
//!         /____
//!          k=0
//! ```
//!
//! A run is planned against the caller's resource limits, the series is
//! evaluated exactly by binary splitting on a rayon pool, and a single division
//! at the end turns it into digits.

pub mod assemble;
pub mod bigint;
pub mod context;
pub mod digits;
pub mod error;
pub mod multiply;
pub mod plan;
pub mod split;
pub mod sqrt;

use std::time::Instant;

use indicatif::ProgressBar;
use tracing::{info, instrument};

pub use crate::bigint::BigInt;
pub use crate::context::RunContext;
pub use crate::digits::{DigitChunk, DigitSink, PiDigits, Rounding, WriteSink};
pub use crate::error::{Limit, PiError, Result};
pub use crate::plan::{plan, Plan, ResourceLimits};

use crate::assemble::SeriesAssembler;
use crate::digits::DigitExtractor;
use crate::split::BinarySplitter;

pub struct Engine {
    plan: Plan,
    rounding: Rounding,
    progress: Option<ProgressBar>,
}

impl Engine {
    pub fn new(plan: Plan) -> Self {
        Self {
            plan,
            rounding: Rounding::default(),
            progress: None,
        }
    }

    pub fn rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }

    /// Ticked once per series term.
    pub fn progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// A fresh context for one run. Hold on to it to cancel from another thread.
    pub fn context(&self) -> RunContext {
        let ctx = RunContext::new(
            self.plan.digits,
            self.plan.max_digits,
            self.plan.memory_ceiling,
            self.plan.multiplier(),
        );
        match &self.progress {
            Some(progress) => ctx.with_progress(progress.clone()),
            None => ctx,
        }
    }

    pub fn run(&self) -> Result<PiDigits> {
        self.run_with(&self.context())
    }

    #[instrument(skip_all, fields(digits = self.plan.digits, terms = self.plan.terms))]
    pub fn run_with(&self, ctx: &RunContext) -> Result<PiDigits> {
        let plan = &self.plan;
        info!(
            threads = plan.threads,
            multiplier = ctx.multiplier().name(),
            guard_digits = plan.guard_digits,
            chunk_digits = plan.chunk_digits,
            "planned"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(plan.threads)
            .build()
            .map_err(|e| PiError::Fatal(format!("could not start thread pool: {e}")))?;

        let start = Instant::now();
        let triple = pool.install(|| {
            BinarySplitter::new(ctx, plan.parallel_cutoff_terms).split(0, plan.terms)
        })?;
        info!(elapsed = ?start.elapsed(), peak_bytes = ctx.gauge().peak(), "done splitting");

        let start = Instant::now();
        let scaled = pool.install(|| {
            SeriesAssembler::new(ctx).assemble(&triple, plan.digits, plan.guard_digits)
        })?;
        drop(triple);
        info!(elapsed = ?start.elapsed(), "done assembling");

        let start = Instant::now();
        let digits = DigitExtractor::new(self.rounding).extract(scaled, plan.chunk_digits)?;
        info!(elapsed = ?start.elapsed(), chunks = digits.chunk_count(), "done extracting");

        Ok(digits)
    }

    /// Computes everything first, so a failed run writes nothing.
    pub fn run_to_sink<S: DigitSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        self.run()?.write_to(sink)
    }
}

/// Plans and runs with default rounding.
pub fn compute(digits: u64, limits: &ResourceLimits) -> Result<PiDigits> {
    Engine::new(plan(limits, digits)?).run()
}
