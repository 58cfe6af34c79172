mod policy;
mod reports;
mod session;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use policy::ScriptedPolicy;
use session::{SessionConfig, SessionSummary, run_session};
use spellbinder_game::TalentPreset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PresetArg {
    Fire,
    Water,
    Earth,
    Wind,
    /// Start with zero talent everywhere
    None,
}

impl PresetArg {
    const fn to_preset(self) -> Option<TalentPreset> {
        match self {
            Self::Fire => Some(TalentPreset::Fire),
            Self::Water => Some(TalentPreset::Water),
            Self::Earth => Some(TalentPreset::Earth),
            Self::Wind => Some(TalentPreset::Wind),
            Self::None => None,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "spellbinder-sim", version)]
#[command(about = "Headless scripted sessions against the Spellbinder simulation core")]
struct Args {
    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Talent preset for every session
    #[arg(long, value_enum, default_value_t = PresetArg::Fire)]
    preset: PresetArg,

    /// Simulated minutes per seed
    #[arg(long, default_value_t = 10)]
    minutes: u64,

    /// Milliseconds of game time per tick
    #[arg(long, default_value_t = 1_000)]
    tick_ms: u64,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["console", "json"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let seeds = parse_seeds(&args.seeds)?;
    let config = SessionConfig {
        preset: args.preset.to_preset(),
        minutes: args.minutes,
        tick_ms: args.tick_ms,
        verbose: args.verbose,
    };

    if args.report == "console" {
        announce_banner();
    }
    let start_time = Instant::now();
    let mut results = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let mut policy = ScriptedPolicy;
        let summary = run_session(seed, &config, &mut policy)
            .with_context(|| format!("session for seed {seed} failed"))?;
        log::info!(
            "seed {seed}: level {} after {} activities",
            summary.level,
            summary.activities_completed
        );
        results.push(summary);
    }

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed()) {
        std::process::exit(1);
    }
    Ok(())
}

fn announce_banner() {
    println!("{}", "🔮 Spellbinder Simulator".bright_cyan().bold());
    println!("{}", "========================".cyan());
}

fn split_csv(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_seeds(input: &str) -> Result<Vec<u64>> {
    let tokens = split_csv(input);
    if tokens.is_empty() {
        bail!("no seeds given");
    }
    tokens
        .iter()
        .map(|token| {
            token
                .parse::<u64>()
                .with_context(|| format!("invalid seed `{token}`"))
        })
        .collect()
}

fn write_reports(args: &Args, results: &[SessionSummary], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.report.as_str() {
        "json" => reports::generate_json_report(output_target.writer(), results)?,
        _ => {
            reports::generate_console_report(
                output_target.writer(),
                results,
                start_time.elapsed(),
            )?;
            writeln!(output_target.writer(), "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}
