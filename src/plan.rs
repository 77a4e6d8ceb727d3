use std::f64::consts::{LOG2_E, PI};
use std::sync::Arc;

use crate::error::{Limit, PiError, Result};
use crate::multiply::{GmpMultiplier, KaratsubaMultiplier, Multiplier};
use crate::split::{terms_for_digits, B, C3_OVER_24};

/// Share of free RAM a run may use.
pub const RAM_FRACTION: f64 = 0.70;
/// Share of free disk (after the swap reserve) the output may use.
pub const DISK_FRACTION: f64 = 0.90;
/// Disk kept free for swap.
pub const SWAP_RESERVE: u64 = 1 << 30;
pub const MIN_DIGITS: u64 = 2;
/// Bit lengths of the top-level triple stay below `u32::MAX` up to here.
pub const ENGINE_DIGIT_CAP: u64 = 250_000_000;

const GUARD_BASE: u64 = 8;
const BITS_PER_DIGIT: f64 = 3.32192809488736234787;
/// Peak over the size of the final triple: both halves plus the products
/// being formed at the top combine step.
const MEMORY_OVERHEAD: f64 = 3.0;
const PARALLEL_CUTOFF_TERMS: u64 = 64;
/// Upper bound on pool threads, whatever the caller asks for.
pub const MAX_THREADS: usize = 256;
const MIN_CHUNK_DIGITS: u64 = 1 << 10;
const MAX_CHUNK_DIGITS: u64 = 1 << 20;
const MIN_TILE_BITS: u64 = 1 << 12;
const MAX_TILE_BITS: u64 = 1 << 30;

/// What the caller reports about the machine. Probing is not done here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceLimits {
    pub free_ram: u64,
    pub free_disk: u64,
    pub free_vram: Option<u64>,
    pub threads: usize,
    pub gpu_available: bool,
}

impl ResourceLimits {
    /// No memory or disk bound, one thread, no accelerator.
    pub fn unbounded() -> Self {
        Self {
            free_ram: u64::MAX,
            free_disk: u64::MAX,
            free_vram: None,
            threads: 1,
            gpu_available: false,
        }
    }

    pub fn ram_ceiling(&self) -> u64 {
        (self.free_ram as f64 * RAM_FRACTION) as u64
    }

    pub fn disk_ceiling(&self) -> u64 {
        (self.free_disk.saturating_sub(SWAP_RESERVE) as f64 * DISK_FRACTION) as u64
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MultiplierKind {
    Gmp,
    Karatsuba { cutoff_bits: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    pub digits: u64,
    pub guard_digits: u64,
    /// Digits carried through the series: requested, rounding digit and guard.
    pub working_digits: u64,
    pub terms: u64,
    pub memory_ceiling: u64,
    pub chunk_digits: u64,
    pub threads: usize,
    pub parallel_cutoff_terms: u64,
    pub multiplier: MultiplierKind,
    pub max_digits: u64,
}

impl Plan {
    pub fn multiplier(&self) -> Arc<dyn Multiplier> {
        match self.multiplier {
            MultiplierKind::Gmp => Arc::new(GmpMultiplier),
            MultiplierKind::Karatsuba { cutoff_bits } => {
                Arc::new(KaratsubaMultiplier::new(cutoff_bits))
            }
        }
    }

    pub fn with_chunk_digits(mut self, chunk_digits: u64) -> Self {
        self.chunk_digits = chunk_digits.clamp(1, self.digits);
        self
    }
}

pub fn guard_digits(digits: u64) -> u64 {
    GUARD_BASE + digits.checked_ilog10().map_or(1, |w| u64::from(w) + 1)
}

pub fn working_digits(digits: u64) -> u64 {
    digits + 1 + guard_digits(digits)
}

/// Stirling's approximation of `log2(n!)`.
fn log2_factorial(n: f64) -> f64 {
    if n < 2.0 {
        return 0.0;
    }
    n * n.log2() - n * LOG2_E + 0.5 * (2.0 * PI * n).log2()
}

/// Peak bytes a run for `digits` is expected to hold.
pub fn estimate_memory(digits: u64) -> u64 {
    let working = working_digits(digits);
    let n = terms_for_digits(working) as f64;
    let cubes = 3.0 * log2_factorial(n);

    // |p(k)| <= 72 k^3 and q(k) = k^3 C^3/24; t(a,b) is q(a,b) times the partial sum
    let p_bits = n * 72f64.log2() + cubes;
    let q_bits = n * (C3_OVER_24 as f64).log2() + cubes;
    let t_bits = q_bits + (B as f64 * n).log2();
    let triple_bytes = (p_bits + q_bits + t_bits) / 8.0;

    // sqrt, numerator and quotient at working precision
    let working_bytes = working as f64 * BITS_PER_DIGIT / 8.0;
    let chunk_bytes = digits.min(MAX_CHUNK_DIGITS) as f64;

    (triple_bytes * MEMORY_OVERHEAD + working_bytes * 4.0 + chunk_bytes).ceil() as u64
}

/// Bytes of output: `"3."`, the digits and a newline.
pub fn estimate_disk(digits: u64) -> u64 {
    digits + 3
}

fn binding_limit(limits: &ResourceLimits, digits: u64) -> Option<Limit> {
    if estimate_memory(digits) > limits.ram_ceiling() {
        Some(Limit::Memory)
    } else if estimate_disk(digits) > limits.disk_ceiling() {
        Some(Limit::Disk)
    } else {
        None
    }
}

/// Largest digit count both ceilings admit, or 0 if not even `MIN_DIGITS` fits.
pub fn max_digits(limits: &ResourceLimits) -> u64 {
    if binding_limit(limits, MIN_DIGITS).is_some() {
        return 0;
    }
    let (mut lo, mut hi) = (MIN_DIGITS, ENGINE_DIGIT_CAP);
    if binding_limit(limits, hi).is_none() {
        return hi;
    }
    // lo fits, hi does not
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if binding_limit(limits, mid).is_none() {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

pub fn plan(limits: &ResourceLimits, digits: u64) -> Result<Plan> {
    if digits < MIN_DIGITS {
        return Err(PiError::InvalidInput(format!(
            "digit count must be at least {MIN_DIGITS}, got {digits}"
        )));
    }
    if digits > ENGINE_DIGIT_CAP {
        return Err(PiError::InvalidInput(format!(
            "digit count must be at most {ENGINE_DIGIT_CAP}, got {digits}"
        )));
    }

    let max_digits = max_digits(limits);
    if let Some(limit) = binding_limit(limits, digits) {
        return Err(PiError::ResourceExceeded {
            limit,
            requested: digits,
            max_digits,
        });
    }

    let guard_digits = guard_digits(digits);
    let working_digits = working_digits(digits);
    let terms = terms_for_digits(working_digits);
    let memory_ceiling = limits.ram_ceiling();

    let threads = limits
        .threads
        .clamp(1, usize::try_from(terms).unwrap_or(usize::MAX).min(MAX_THREADS));
    let parallel_cutoff_terms = if threads > 1 {
        PARALLEL_CUTOFF_TERMS
    } else {
        u64::MAX
    };

    let chunk_digits = (memory_ceiling / 64)
        .clamp(MIN_CHUNK_DIGITS, MAX_CHUNK_DIGITS)
        .min(digits);

    let multiplier = match (limits.gpu_available, limits.free_vram) {
        (true, Some(vram)) => MultiplierKind::Karatsuba {
            // three tile products resident at once, each two tiles wide
            cutoff_bits: (vram.saturating_mul(8) / 6).clamp(MIN_TILE_BITS, MAX_TILE_BITS) as u32,
        },
        _ => MultiplierKind::Gmp,
    };

    Ok(Plan {
        digits,
        guard_digits,
        working_digits,
        terms,
        memory_ceiling,
        chunk_digits,
        threads,
        parallel_cutoff_terms,
        multiplier,
        max_digits,
    })
}
