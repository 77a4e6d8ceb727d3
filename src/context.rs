use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use indicatif::ProgressBar;
use tracing::warn;

use crate::error::{Limit, PiError, Result};
use crate::multiply::Multiplier;

/// Monotonic stop flag that can only transition from false to true.
/// The first reason recorded wins.
#[derive(Debug, Default)]
pub struct StopFlag {
    stopped: AtomicBool,
    reason: OnceLock<PiError>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self, reason: PiError) {
        let _ = self.reason.set(reason);
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<PiError> {
        self.reason.get().cloned()
    }
}

/// Live and peak byte counters for the values held by the recursion.
#[derive(Debug)]
pub struct MemoryGauge {
    live: AtomicU64,
    peak: AtomicU64,
    ceiling: u64,
}

impl MemoryGauge {
    pub fn new(ceiling: u64) -> Self {
        Self {
            live: AtomicU64::new(0),
            peak: AtomicU64::new(0),
            ceiling,
        }
    }

    /// Records `bytes` as held. Returns the new live total.
    pub fn charge(&self, bytes: u64) -> u64 {
        let live = self.live.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak.fetch_max(live, Ordering::Relaxed);
        live
    }

    pub fn release(&self, bytes: u64) {
        self.live.fetch_sub(bytes, Ordering::Relaxed);
    }

    pub fn live(&self) -> u64 {
        self.live.load(Ordering::Relaxed)
    }

    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Relaxed)
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }
}

/// State for one run, handed down explicitly to every recursion step.
pub struct RunContext {
    digits: u64,
    max_digits: u64,
    multiplier: Arc<dyn Multiplier>,
    stop: StopFlag,
    gauge: MemoryGauge,
    progress: Option<ProgressBar>,
}

impl RunContext {
    pub fn new(
        digits: u64,
        max_digits: u64,
        memory_ceiling: u64,
        multiplier: Arc<dyn Multiplier>,
    ) -> Self {
        Self {
            digits,
            max_digits,
            multiplier,
            stop: StopFlag::new(),
            gauge: MemoryGauge::new(memory_ceiling),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn multiplier(&self) -> &dyn Multiplier {
        self.multiplier.as_ref()
    }

    pub fn gauge(&self) -> &MemoryGauge {
        &self.gauge
    }

    /// Fails with the stop reason once the run has been stopped.
    pub fn checkpoint(&self) -> Result<()> {
        if self.stop.is_stopped() {
            return Err(self.stop.reason().unwrap_or(PiError::Cancelled));
        }
        Ok(())
    }

    /// Aborts the run from outside; in-flight subtrees unwind at their next
    /// checkpoint.
    pub fn cancel(&self) {
        self.stop.stop(PiError::Cancelled);
    }

    pub fn charge(&self, bytes: u64) -> Result<()> {
        let live = self.gauge.charge(bytes);
        if live > self.gauge.ceiling() {
            let max_digits = self.feasible_digits(live);
            warn!(
                live,
                ceiling = self.gauge.ceiling(),
                max_digits,
                "memory ceiling crossed, cancelling"
            );
            self.stop.stop(PiError::ResourceExceeded {
                limit: Limit::RuntimeMemory,
                requested: self.digits,
                max_digits,
            });
        }
        self.checkpoint()
    }

    /// The request scaled down by how far `live` overshot the ceiling. Always
    /// below the request, since the request itself did not fit.
    fn feasible_digits(&self, live: u64) -> u64 {
        let scaled =
            u128::from(self.digits) * u128::from(self.gauge.ceiling()) / u128::from(live.max(1));
        u64::try_from(scaled)
            .unwrap_or(u64::MAX)
            .min(self.digits.saturating_sub(1))
            .min(self.max_digits)
    }

    pub fn release(&self, bytes: u64) {
        self.gauge.release(bytes);
    }

    pub fn advance(&self, terms: u64) {
        if let Some(progress) = &self.progress {
            progress.inc(terms);
        }
    }
}
