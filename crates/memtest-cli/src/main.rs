//! CLI entry point for the memtest simulator binary.

use std::env;
use std::ffi::OsString;

use memtest_cli as _;
use memtest_cli::sequence::{generator_words, hex_word};
use memtest_cli::session::{Session, SessionConfig, DEFAULT_STEP_BUDGET, DEFAULT_WORDS};
use memtest_core::{
    BitFlip, EngineConfig, LfsrConfig, Throttle, TraceEvent, TraceSink, DEFAULT_ADDRESS_WIDTH,
    DEFAULT_OUTPUT_BITS,
};

const DEFAULT_LISTING_COUNT: usize = 16;

const USAGE_TEXT: &str = "\
Usage: memtest-sim <command> [options]

Commands:
  run   Write a burst to simulated memory, read it back, report errors
  lfsr  Print successive generator words

Run options:
  --words <N>                 Burst length in words (default: 1024)
  --data-width <W>            Word width in bits, 1-128 (default: 64)
  --address-width <A>         Burst length and error count width (default: 24)
  --base <ADDR>               First memory address (default: 0)
  --write-stall <P:S>         Stall the first S of every P write cycles
  --read-gap <P:G>            Withhold read data for G of every P cycles
  --flip <ADDR:BIT>           Flip BIT of the word at ADDR on read-back (repeatable)
  --budget <STEPS>            Step budget across both phases (default: 1000000)
  --trace                     Print engine events to stderr

Lfsr options:
  --width <W>                 Word width in bits, 1-128 (default: 64)
  --count <N>                 Words to print (default: 16)

Options:
  -h, --help                  Show this help message

Examples:
  memtest-sim run --words 4096 --write-stall 4:1
  memtest-sim run --words 64 --flip 10:3
  memtest-sim lfsr --width 16 --count 8
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run(RunArgs),
    Lfsr(LfsrArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    words: u64,
    data_width: u8,
    address_width: u8,
    base: usize,
    write_stall: Throttle,
    read_gap: Throttle,
    flips: Vec<BitFlip>,
    budget: u64,
    trace: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            words: DEFAULT_WORDS,
            data_width: DEFAULT_OUTPUT_BITS,
            address_width: DEFAULT_ADDRESS_WIDTH,
            base: 0,
            write_stall: Throttle::NONE,
            read_gap: Throttle::NONE,
            flips: Vec::new(),
            budget: DEFAULT_STEP_BUDGET,
            trace: false,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct LfsrArgs {
    width: u8,
    count: usize,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "run" => parse_run_args(args)
            .map(Command::Run)
            .map(ParseResult::Command),
        "lfsr" => parse_lfsr_args(args)
            .map(Command::Lfsr)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn parse_number<T: TryFrom<u64>>(flag: &str, text: &str) -> Result<T, String> {
    let parsed = text
        .strip_prefix("0x")
        .map_or_else(|| text.parse::<u64>(), |hex| u64::from_str_radix(hex, 16))
        .map_err(|_| format!("invalid value for {flag}: {text}"))?;
    T::try_from(parsed).map_err(|_| format!("value out of range for {flag}: {text}"))
}

fn parse_pair(flag: &str, text: &str) -> Result<(u64, u64), String> {
    let (left, right) = text
        .split_once(':')
        .ok_or_else(|| format!("expected A:B for {flag}: {text}"))?;
    Ok((parse_number(flag, left)?, parse_number(flag, right)?))
}

fn parse_throttle(flag: &str, text: &str) -> Result<Throttle, String> {
    let (period, stalled) = parse_pair(flag, text)?;
    let period = u32::try_from(period).map_err(|_| format!("period too large for {flag}"))?;
    let stalled = u32::try_from(stalled).map_err(|_| format!("count too large for {flag}"))?;
    if period == 0 || stalled >= period {
        return Err(format!("{flag} needs 0 <= stalled < period: {text}"));
    }
    Ok(Throttle { period, stalled })
}

fn parse_flip(text: &str) -> Result<BitFlip, String> {
    let (address, bit) = parse_pair("--flip", text)?;
    Ok(BitFlip {
        address: usize::try_from(address).map_err(|_| "flip address too large".to_string())?,
        bit: u8::try_from(bit).map_err(|_| "flip bit too large".to_string())?,
    })
}

fn next_value(args: &mut impl Iterator<Item = OsString>, flag: &str) -> Result<String, String> {
    args.next()
        .map(|value| value.to_string_lossy().to_string())
        .ok_or_else(|| format!("missing value for {flag}"))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(mut args: impl Iterator<Item = OsString>) -> Result<RunArgs, String> {
    let mut run = RunArgs::default();

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "--help" | "-h" => return Err(USAGE_TEXT.to_string()),
            "--trace" => run.trace = true,
            "--words" => run.words = parse_number(&flag, &next_value(&mut args, &flag)?)?,
            "--data-width" => {
                run.data_width = parse_number(&flag, &next_value(&mut args, &flag)?)?;
            }
            "--address-width" => {
                run.address_width = parse_number(&flag, &next_value(&mut args, &flag)?)?;
            }
            "--base" => run.base = parse_number(&flag, &next_value(&mut args, &flag)?)?,
            "--write-stall" => {
                run.write_stall = parse_throttle(&flag, &next_value(&mut args, &flag)?)?;
            }
            "--read-gap" => {
                run.read_gap = parse_throttle(&flag, &next_value(&mut args, &flag)?)?;
            }
            "--flip" => run.flips.push(parse_flip(&next_value(&mut args, &flag)?)?),
            "--budget" => run.budget = parse_number(&flag, &next_value(&mut args, &flag)?)?,
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    if let Some(flip) = run.flips.iter().find(|flip| flip.bit >= run.data_width) {
        return Err(format!(
            "--flip bit {} is outside the {}-bit data path",
            flip.bit, run.data_width
        ));
    }

    Ok(run)
}

#[allow(clippy::while_let_on_iterator)]
fn parse_lfsr_args(mut args: impl Iterator<Item = OsString>) -> Result<LfsrArgs, String> {
    let mut lfsr = LfsrArgs {
        width: DEFAULT_OUTPUT_BITS,
        count: DEFAULT_LISTING_COUNT,
    };

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "--help" | "-h" => return Err(USAGE_TEXT.to_string()),
            "--width" => lfsr.width = parse_number(&flag, &next_value(&mut args, &flag)?)?,
            "--count" => lfsr.count = parse_number(&flag, &next_value(&mut args, &flag)?)?,
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    Ok(lfsr)
}

/// Renders engine events as one stderr line each.
struct StderrTrace {
    bits: u8,
}

impl TraceSink for StderrTrace {
    fn on_event(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::BurstLoaded { cycle, length } => {
                eprintln!("[{cycle:>8}] burst   length={length}");
            }
            TraceEvent::WordWritten { cycle, data } => {
                eprintln!("[{cycle:>8}] write   {}", hex_word(data, self.bits));
            }
            TraceEvent::WordCompared {
                cycle,
                expected,
                observed,
            } => {
                let mark = if expected == observed { "ok" } else { "MISMATCH" };
                eprintln!(
                    "[{cycle:>8}] compare {} {} {mark}",
                    hex_word(expected, self.bits),
                    hex_word(observed, self.bits)
                );
            }
            TraceEvent::WriterReset { cycle } => eprintln!("[{cycle:>8}] writer reset"),
            TraceEvent::ReaderReset { cycle } => eprintln!("[{cycle:>8}] reader reset"),
        }
    }
}

fn run_memtest(args: RunArgs) -> Result<(), i32> {
    let config = SessionConfig {
        engine: EngineConfig {
            lfsr: LfsrConfig::with_output_bits(args.data_width),
            address_width: args.address_width,
        },
        words: args.words,
        base: args.base,
        write_throttle: args.write_stall,
        read_throttle: args.read_gap,
        flips: args.flips,
        step_budget: args.budget,
    };

    let mut session = match Session::new(config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(2);
        }
    };

    let result = if args.trace {
        session.run_traced(&mut StderrTrace {
            bits: args.data_width,
        })
    } else {
        session.run()
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(2);
        }
    };

    println!("{report}");
    if report.passed() {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_lfsr(args: &LfsrArgs) -> Result<(), i32> {
    let words = match generator_words(&LfsrConfig::with_output_bits(args.width), args.count) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(2);
        }
    };

    for word in words {
        println!("{}", hex_word(word, args.width));
    }
    Ok(())
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Run(args))) => match run_memtest(args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Ok(ParseResult::Command(Command::Lfsr(args))) => match run_lfsr(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            2
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn args(items: &[&str]) -> impl Iterator<Item = OsString> {
        items
            .iter()
            .map(|item| OsString::from(*item))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_run_command() {
        let result = parse_run_args(args(&[
            "--words",
            "0x100",
            "--data-width",
            "32",
            "--write-stall",
            "4:1",
            "--read-gap",
            "3:2",
            "--flip",
            "10:3",
            "--flip",
            "12:0",
            "--trace",
        ]))
        .expect("valid run args should parse");

        assert_eq!(
            result,
            RunArgs {
                words: 256,
                data_width: 32,
                write_stall: Throttle {
                    period: 4,
                    stalled: 1
                },
                read_gap: Throttle {
                    period: 3,
                    stalled: 2
                },
                flips: vec![
                    BitFlip {
                        address: 10,
                        bit: 3
                    },
                    BitFlip {
                        address: 12,
                        bit: 0
                    },
                ],
                trace: true,
                ..RunArgs::default()
            }
        );
    }

    #[test]
    fn run_defaults_without_options() {
        let result = parse_run_args(std::iter::empty()).expect("defaults parse");
        assert_eq!(result, RunArgs::default());
    }

    #[test]
    fn parses_lfsr_command() {
        let result = parse_args(args(&["lfsr", "--width", "16", "--count", "5"]))
            .expect("valid lfsr args should parse");
        assert!(matches!(
            result,
            ParseResult::Command(Command::Lfsr(LfsrArgs {
                width: 16,
                count: 5
            }))
        ));
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(args(&["--help"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(args(&["erase"])).expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn rejects_stall_without_free_slot() {
        let error = parse_run_args(args(&["--write-stall", "3:3"]))
            .expect_err("fully stalled pattern should fail");
        assert!(error.contains("stalled < period"));
    }

    #[test]
    fn rejects_malformed_pair() {
        let error = parse_run_args(args(&["--flip", "10"])).expect_err("missing bit");
        assert!(error.contains("expected A:B"));
    }

    #[test]
    fn rejects_flip_beyond_data_width() {
        let error = parse_run_args(args(&["--flip", "3:100"])).expect_err("64-bit path");
        assert!(error.contains("outside the 64-bit data path"));

        let error = parse_run_args(args(&["--flip", "3:20", "--data-width", "16"]))
            .expect_err("width given after the flip still applies");
        assert!(error.contains("outside the 16-bit data path"));

        let run = parse_run_args(args(&["--data-width", "128", "--flip", "3:100"]))
            .expect("bit exists on a 128-bit path");
        assert_eq!(run.flips, vec![BitFlip { address: 3, bit: 100 }]);
    }

    #[test]
    fn rejects_missing_value() {
        let error = parse_run_args(args(&["--words"])).expect_err("missing value");
        assert!(error.contains("missing value for --words"));
    }

    #[test]
    fn rejects_out_of_range_width() {
        let error = parse_lfsr_args(args(&["--width", "300"])).expect_err("too wide for u8");
        assert!(error.contains("out of range"));
    }

    #[test]
    fn lfsr_listing_rejects_invalid_width() {
        assert_eq!(
            run_lfsr(&LfsrArgs {
                width: 0,
                count: 1
            }),
            Err(2)
        );
    }
}
