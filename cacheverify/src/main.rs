use std::path::PathBuf;
use std::time::Instant;

use cachecheck::candidate::{CandidateBuilder, ReplayOptions};
use cachecheck::config::{HarnessConfig, SweepCase};
use cachecheck::outcome::AccessOutcome;
use cachecheck::reference::ReferenceSimulator;
use cachecheck::sweep::{CaseReport, Sweep, SweepReport, Verdict};
use cachecheck::util::find_executable;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Checks a candidate cache simulator against a reference simulator"))]
struct Args {
    /// The reference simulator executable, looked up on PATH if it is a bare name
    reference: String,
    /// Directory the case trace files are resolved against
    traces: PathBuf,

    /// JSON harness configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run only this case, given as s,E,b,trace. May be repeated
    #[arg(long = "case")]
    cases: Vec<SweepCase>,

    #[arg(long)]
    source: Option<PathBuf>,

    #[arg(long)]
    compiler: Option<String>,

    #[arg(long)]
    build_dir: Option<PathBuf>,

    /// Reference simulator timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(short, long)]
    performance: bool,

    /// Log the address fields, outcome, and counters of every candidate access
    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,

    /// Print the report as JSON instead of one line per case
    #[arg(long)]
    json: bool,
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("cachecheck={level},cacheverify={level}").into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &Args) -> Result<HarnessConfig, String> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::from_file(path).map_err(|e| e.to_string())?,
        None => HarnessConfig::default(),
    };
    if !args.cases.is_empty() {
        config.cases = args.cases.clone();
    }
    if let Some(source) = &args.source {
        config.candidate.source = source.clone();
    }
    if let Some(compiler) = &args.compiler {
        config.candidate.compiler = compiler.clone();
    }
    if let Some(build_dir) = &args.build_dir {
        config.candidate.build_dir = build_dir.clone();
    }
    if let Some(timeout) = args.timeout {
        config.reference_timeout_secs = timeout;
    }
    Ok(config)
}

/// A missing outcome means that side's sequence had already ended
fn describe(outcome: Option<AccessOutcome>) -> String {
    outcome.map_or_else(|| "nothing".to_string(), |o| o.to_string())
}

fn print_case(number: usize, report: &CaseReport, performance: bool) {
    let case = &report.case;
    let status = if report.verdict.passed() { "Pass" } else { "Fail" };
    print!(
        "[{number}] s={} E={} b={} {}: {status}",
        case.index_bits, case.associativity, case.offset_bits, case.trace
    );
    if performance {
        print!(" ({}s)", report.elapsed_secs);
    }
    println!();
    match &report.verdict {
        Verdict::Pass => {}
        Verdict::Fail {
            comparison,
            reference,
            candidate,
        } => {
            if let Some(divergence) = comparison.first_divergence {
                println!(
                    "    first divergence at access {}: reference {}, candidate {}",
                    divergence.index,
                    describe(divergence.reference),
                    describe(divergence.candidate)
                );
            }
            if !comparison.stats_match {
                println!("    reference {reference}");
                println!("    candidate {candidate}");
            }
        }
        Verdict::Error { reason, .. } => println!("    {reason}"),
    }
}

fn print_report(report: &SweepReport, performance: bool) {
    report
        .cases
        .iter()
        .enumerate()
        .for_each(|(i, case)| print_case(i, case, performance));
    let passed = report.cases.iter().filter(|c| c.verdict.passed()).count();
    println!("{passed}/{} cases passed", report.cases.len());
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    init_logging(args.debug);
    if cfg!(debug_assertions) && args.debug {
        tracing::info!("Running the debug binary, per access diagnostics are enabled by default");
    }
    let config = load_config(&args)?;
    let reference = find_executable(&args.reference)
        .ok_or_else(|| format!("Couldn't find the reference simulator {}", args.reference))?;
    let options = ReplayOptions {
        store_byte: config.candidate.store_byte,
        diagnostics: args.debug,
    };
    let mut sweep = Sweep::new(
        ReferenceSimulator::new(reference, config.reference_timeout()),
        CandidateBuilder::new(config.candidate.clone()),
        args.traces.clone(),
        options,
    );
    let report = sweep.run(&config.cases);
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).map_err(|e| format!("Couldn't serialise the report {e}"))?
        );
    } else {
        print_report(&report, args.performance);
    }
    if args.performance {
        let total_time = Instant::now() - start;
        println!("Total execution time: {}s", total_time.as_nanos() as f64 / 1e9);
    }
    if !report.passed {
        return Err("Verification failed".to_string());
    }
    Ok(())
}
