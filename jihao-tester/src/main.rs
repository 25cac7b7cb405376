mod logic;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use jihao_game::{ContentCatalog, ValidationIssue, validate_catalog};
use logic::{GameplayStrategy, RunRecord, aggregate_runs, resolve_seed_inputs, run_batch};
use util::split_csv;

#[derive(Debug, Parser)]
#[command(name = "jihao-tester", version = "0.1.0")]
#[command(about = "Content validation and automated play-testing for the Zhang Jihao simulator")]
struct Args {
    /// Scene and ending catalog to load
    #[arg(long, default_value = "assets/data/catalog.json")]
    content: PathBuf,

    /// Seeds to run (comma-separated, ranges as start..end)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Runs per seed and strategy
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Strategies to play (comma-separated, or "all")
    #[arg(long, default_value = "all")]
    strategies: String,

    /// List all available strategies and exit
    #[arg(long)]
    list_strategies: bool,

    /// Turn cap per run
    #[arg(long, default_value_t = 100)]
    max_turns: u32,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Only validate the catalog, do not play
    #[arg(long)]
    validate_only: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if maybe_list_strategies(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let catalog = load_catalog(&args.content)?;
    let issues = validate_catalog(&catalog);
    for issue in &issues {
        log::warn!("content issue: {issue}");
    }

    if args.validate_only {
        write_validation(&args, &catalog, &issues)?;
        if !issues.is_empty() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let strategies = expand_strategies(&args.strategies)?;
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;
    log::info!(
        "playing {} strategies x {} seeds x {} iterations",
        strategies.len(),
        seeds.len(),
        args.iterations
    );
    let records = run_batch(
        &catalog,
        &strategies,
        &seeds,
        args.iterations,
        args.max_turns,
    );

    write_reports(&args, &issues, &records, start_time)?;

    if !issues.is_empty() || records.iter().any(|record| !record.violations.is_empty()) {
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn maybe_list_strategies(args: &Args) -> Result<bool> {
    if !args.list_strategies {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available strategies:")?;
    for strategy in GameplayStrategy::ALL {
        writeln!(
            output_target.writer(),
            "  {:10} - {}",
            strategy.label().to_ascii_lowercase(),
            describe_strategy(strategy)
        )?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

const fn describe_strategy(strategy: GameplayStrategy) -> &'static str {
    match strategy {
        GameplayStrategy::Cautious => "avoids the choice with the largest single loss",
        GameplayStrategy::Greedy => "takes the largest net stat gain",
        GameplayStrategy::Balanced => "props up the weakest life stat",
        GameplayStrategy::Random => "picks uniformly from a seeded generator",
    }
}

fn announce_banner() {
    println!("{}", "🎮 Zhang Jihao Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn load_catalog(path: &Path) -> Result<ContentCatalog> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    ContentCatalog::from_json(&json).with_context(|| format!("failed to parse {}", path.display()))
}

fn expand_strategies(raw: &str) -> Result<Vec<GameplayStrategy>> {
    let tokens = split_csv(raw);
    if tokens.is_empty() || tokens.iter().any(|token| token.eq_ignore_ascii_case("all")) {
        return Ok(GameplayStrategy::ALL.to_vec());
    }
    let mut strategies = Vec::with_capacity(tokens.len());
    for token in tokens {
        let strategy: GameplayStrategy = token.parse()?;
        if !strategies.contains(&strategy) {
            strategies.push(strategy);
        }
    }
    Ok(strategies)
}

fn write_validation(
    args: &Args,
    catalog: &ContentCatalog,
    issues: &[ValidationIssue],
) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(
        output_target,
        "Catalog {}: {} scenes, {} endings",
        args.content.display(),
        catalog.scenes.len(),
        catalog.endings.len()
    )?;
    if issues.is_empty() {
        writeln!(output_target, "Content valid")?;
    } else {
        writeln!(output_target, "{} issue(s):", issues.len())?;
        for issue in issues {
            writeln!(output_target, "  - {issue}")?;
        }
    }
    output_target.flush_inner()?;
    Ok(())
}

fn write_reports(
    args: &Args,
    issues: &[ValidationIssue],
    records: &[RunRecord],
    start_time: Instant,
) -> Result<()> {
    let aggregates = aggregate_runs(records);
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            logic::reports::generate_json_report(&mut output_target, issues, &aggregates, records)?;
        }
        "markdown" => {
            logic::reports::generate_markdown_report(&mut output_target, issues, &aggregates)?;
        }
        "csv" => {
            logic::reports::generate_csv_report(&mut output_target, records)?;
        }
        _ => {
            logic::reports::generate_console_report(
                &mut output_target,
                issues,
                &aggregates,
                start_time.elapsed(),
            )?;
            writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
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

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
