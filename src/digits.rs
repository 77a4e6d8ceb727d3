use std::fmt;
use std::io;

use tracing::{debug, instrument};

use crate::assemble::ScaledPi;
use crate::bigint::BigInt;
use crate::error::{PiError, Result};

/// How the digit after the last requested one is folded in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Rounding {
    /// Drop it, as published digit tables do.
    #[default]
    Truncate,
    HalfUp,
    HalfEven,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DigitExtractor {
    rounding: Rounding,
}

impl DigitExtractor {
    pub fn new(rounding: Rounding) -> Self {
        Self { rounding }
    }

    fn rounds_up(&self, kept: &BigInt, next_digit: u64, inexact: bool) -> bool {
        match self.rounding {
            Rounding::Truncate => false,
            Rounding::HalfUp => next_digit >= 5,
            Rounding::HalfEven => {
                next_digit > 5 || (next_digit == 5 && (inexact || kept.is_odd()))
            }
        }
    }

    #[instrument(level = "debug", skip(self, scaled), fields(digits = scaled.digits))]
    pub fn extract(&self, scaled: ScaledPi, chunk_digits: u64) -> Result<PiDigits> {
        let digits = scaled.digits;
        if chunk_digits == 0 {
            return Err(PiError::InvalidInput("chunk size must be positive".to_string()));
        }

        let (mut kept, next) = scaled.value.divmod(&BigInt::from(10u64))?;
        let next_digit = next.to_u64().unwrap_or_default();
        if self.rounds_up(&kept, next_digit, scaled.inexact) {
            kept = kept.add(&BigInt::one());
        }

        let (integer_part, fraction) = kept.divmod(&BigInt::pow10(digits)?)?;

        let mut pieces = Vec::new();
        split_decimal(fraction, digits, chunk_digits, &mut pieces)?;
        debug!(chunks = pieces.len(), "done extracting");

        Ok(PiDigits {
            integer_part,
            digits,
            pieces,
        })
    }
}

#[derive(Debug)]
struct Piece {
    value: BigInt,
    width: u64,
}

/// Cuts a `len`-digit decimal into left-aligned pieces of `chunk` digits; only
/// the rightmost piece may be shorter.
fn split_decimal(value: BigInt, len: u64, chunk: u64, out: &mut Vec<Piece>) -> Result<()> {
    if len <= chunk {
        out.push(Piece { value, width: len });
        return Ok(());
    }

    let chunks = len.div_ceil(chunk);
    let left_len = (chunks / 2) * chunk;
    let right_len = len - left_len;

    let (hi, lo) = value.divmod(&BigInt::pow10(right_len)?)?;
    split_decimal(hi, left_len, chunk, out)?;
    split_decimal(lo, right_len, chunk, out)
}

/// π to a fixed number of decimals, held as chunk-sized pieces.
#[derive(Debug)]
pub struct PiDigits {
    integer_part: BigInt,
    digits: u64,
    pieces: Vec<Piece>,
}

impl PiDigits {
    pub fn digits(&self) -> u64 {
        self.digits
    }

    pub fn chunk_count(&self) -> usize {
        self.pieces.len()
    }

    /// A fresh pass over the output; each call starts from the first chunk.
    pub fn chunks(&self) -> DigitChunks<'_> {
        DigitChunks {
            digits: self,
            next: 0,
        }
    }

    pub fn write_to<S: DigitSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        for chunk in self.chunks() {
            sink.accept(&chunk)?;
        }
        Ok(())
    }
}

impl fmt::Display for PiDigits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.chunks() {
            f.write_str(&chunk.text)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigitChunk {
    pub index: usize,
    pub text: String,
    pub last: bool,
}

pub struct DigitChunks<'a> {
    digits: &'a PiDigits,
    next: usize,
}

impl Iterator for DigitChunks<'_> {
    type Item = DigitChunk;

    fn next(&mut self) -> Option<DigitChunk> {
        let piece = self.digits.pieces.get(self.next)?;
        let index = self.next;
        self.next += 1;

        let width = piece.width as usize;
        let body = format!("{:0>width$}", piece.value.to_decimal_string());
        let text = if index == 0 {
            format!("{}.{body}", self.digits.integer_part)
        } else {
            body
        };

        Some(DigitChunk {
            index,
            text,
            last: self.next == self.digits.pieces.len(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.digits.pieces.len() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for DigitChunks<'_> {}

/// Receives the output chunks in order.
pub trait DigitSink {
    fn accept(&mut self, chunk: &DigitChunk) -> Result<()>;
}

impl DigitSink for String {
    fn accept(&mut self, chunk: &DigitChunk) -> Result<()> {
        self.push_str(&chunk.text);
        Ok(())
    }
}

impl DigitSink for Vec<DigitChunk> {
    fn accept(&mut self, chunk: &DigitChunk) -> Result<()> {
        self.push(chunk.clone());
        Ok(())
    }
}

/// Streams chunks into a writer, ending the output with a newline.
pub struct WriteSink<W: io::Write> {
    inner: W,
}

impl<W: io::Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> DigitSink for WriteSink<W> {
    fn accept(&mut self, chunk: &DigitChunk) -> Result<()> {
        let sink_err = |e: io::Error| PiError::Sink(e.to_string());
        self.inner.write_all(chunk.text.as_bytes()).map_err(sink_err)?;
        if chunk.last {
            self.inner.write_all(b"\n").map_err(sink_err)?;
            self.inner.flush().map_err(sink_err)?;
        }
        Ok(())
    }
}
