use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pi::{plan, Engine, ResourceLimits, Rounding, WriteSink};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Compute decimal digits of pi with the Chudnovsky series.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Digits after the decimal point, e.g. 60, 1_000_000, 10M or 1e6
    #[arg(default_value = "60", value_parser = parse_digits)]
    digits: u64,

    /// Worker threads for the binary splitting
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Free RAM to plan against, e.g. 8G (unbounded if omitted)
    #[arg(long, value_parser = parse_size)]
    free_ram: Option<u64>,

    /// Free disk to plan against, e.g. 100G (unbounded if omitted)
    #[arg(long, value_parser = parse_size)]
    free_disk: Option<u64>,

    /// Free accelerator memory, used to size multiplication tiles
    #[arg(long, value_parser = parse_size)]
    free_vram: Option<u64>,

    /// Stage large multiplications for an accelerator
    #[arg(long)]
    gpu: bool,

    #[arg(long, value_enum, default_value_t = Rounding::Truncate)]
    rounding: Rounding,

    /// Write a Chrome trace of the run to this file
    #[arg(long)]
    trace: Option<PathBuf>,

    /// No progress bar
    #[arg(short, long)]
    quiet: bool,
}

/// Accepts `_` separators, K/M/G/T decimal suffixes and `<int>e<int>`.
fn parse_digits(arg: &str) -> Result<u64, String> {
    let s = arg.trim().replace('_', "");
    if s.is_empty() {
        return Err("empty digit count".to_string());
    }

    if let Some((mantissa, exponent)) = s.split_once(['e', 'E']) {
        let mantissa: u64 = mantissa
            .parse()
            .map_err(|e| format!("invalid mantissa in {arg:?}: {e}"))?;
        let exponent: u32 = exponent
            .parse()
            .map_err(|e| format!("invalid exponent in {arg:?}: {e}"))?;
        return 10u64
            .checked_pow(exponent)
            .and_then(|scale| mantissa.checked_mul(scale))
            .ok_or_else(|| format!("{arg:?} is too large"));
    }

    let (number, scale) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 1_000),
        Some((i, 'm' | 'M')) => (&s[..i], 1_000_000),
        Some((i, 'g' | 'G')) => (&s[..i], 1_000_000_000),
        Some((i, 't' | 'T')) => (&s[..i], 1_000_000_000_000),
        _ => (s.as_str(), 1),
    };
    let number: u64 = number
        .parse()
        .map_err(|e| format!("invalid digit count {arg:?}: {e}"))?;
    number
        .checked_mul(scale)
        .ok_or_else(|| format!("{arg:?} is too large"))
}

/// Byte sizes with optional binary K/M/G/T suffixes.
fn parse_size(arg: &str) -> Result<u64, String> {
    let s = arg.trim().trim_end_matches(['b', 'B']).trim_end_matches(['i']);
    let (number, shift) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 10),
        Some((i, 'm' | 'M')) => (&s[..i], 20),
        Some((i, 'g' | 'G')) => (&s[..i], 30),
        Some((i, 't' | 'T')) => (&s[..i], 40),
        _ => (s, 0),
    };
    let number: u64 = number
        .trim()
        .parse()
        .map_err(|e| format!("invalid size {arg:?}: {e}"))?;
    number
        .checked_mul(1 << shift)
        .ok_or_else(|| format!("{arg:?} is too large"))
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (chrome_layer, _guard) = match &args.trace {
        Some(path) => {
            let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file(path)
                .include_args(true)
                .build();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(chrome_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(EnvFilter::from_default_env()),
        )
        .init();

    let limits = ResourceLimits {
        free_ram: args.free_ram.unwrap_or(u64::MAX),
        free_disk: args.free_disk.unwrap_or(u64::MAX),
        free_vram: args.free_vram,
        threads: args.threads,
        gpu_available: args.gpu,
    };

    let plan = match plan(&limits, args.digits) {
        Ok(plan) => plan,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(plan.terms);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} terms ({eta})",
            )
            .expect("progress template should be valid"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    };

    let engine = Engine::new(plan)
        .rounding(args.rounding)
        .progress(progress.clone());

    let digits = match engine.run() {
        Ok(digits) => digits,
        Err(e) => {
            progress.abandon();
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    progress.finish_and_clear();

    let mut sink = WriteSink::new(io::BufWriter::new(io::stdout().lock()));
    if let Err(e) = digits.write_to(&mut sink) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    info!(digits = digits.digits(), "done");

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_counts() {
        assert_eq!(parse_digits("60"), Ok(60));
        assert_eq!(parse_digits("1_000_000"), Ok(1_000_000));
        assert_eq!(parse_digits("10M"), Ok(10_000_000));
        assert_eq!(parse_digits("2k"), Ok(2_000));
        assert_eq!(parse_digits("1e6"), Ok(1_000_000));
        assert_eq!(parse_digits("3E7"), Ok(30_000_000));
        assert!(parse_digits("").is_err());
        assert!(parse_digits("abc").is_err());
        assert!(parse_digits("1e30").is_err());
        assert!(parse_digits("-5").is_err());
    }

    #[test]
    fn sizes() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("8G"), Ok(8 << 30));
        assert_eq!(parse_size("512MiB"), Ok(512 << 20));
        assert_eq!(parse_size("16k"), Ok(16 << 10));
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn cli_parses() {
        let args = Args::try_parse_from([
            "pi", "1K", "-t", "4", "--free-ram", "2G", "--gpu", "--rounding", "half-even",
        ])
        .unwrap();
        assert_eq!(args.digits, 1_000);
        assert_eq!(args.threads, 4);
        assert_eq!(args.free_ram, Some(2 << 30));
        assert!(args.gpu);
        assert_eq!(args.rounding, Rounding::HalfEven);
        assert_eq!(args.free_disk, None);
    }
}
