//! Simulate credit-based arbitration of a shared egress port.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use egress_arbiter::Config;
use egress_simulator::{crate_version, histogram, load, simulate, Error, Stats, Summary};
use prometheus_client::{encoding::text::encode, registry::Registry};
use std::{fs::File, path::PathBuf, process::ExitCode};
use tracing::{error, info, Level};

/// Flag for verbose output
const VERBOSE_FLAG: &str = "verbose";

/// Default number of cycles to simulate
const DEFAULT_CYCLES: &str = "1000";

/// Default seed for the random number generator
const DEFAULT_SEED: &str = "0";

/// Default number of buckets in the arrival probability histogram
const DEFAULT_BINS: &str = "10";

fn main() -> ExitCode {
    let matches = command().get_matches();

    // Initialize logging
    let level = if matches.get_flag(VERBOSE_FLAG) {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(?err, "simulation failed");
            ExitCode::FAILURE
        }
    }
}

/// Define the command line interface
fn command() -> Command {
    let mut command = Command::new("egress-simulator")
        .about("Simulate credit-based round-robin arbitration of a shared egress port")
        .version(crate_version())
        .arg(
            Arg::new(VERBOSE_FLAG)
                .short('v')
                .long(VERBOSE_FLAG)
                .action(ArgAction::SetTrue)
                .help("Log every drain pass"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Path to YAML config file (flags override its fields)"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .default_value(DEFAULT_SEED)
                .value_parser(value_parser!(u64))
                .help("Seed for all randomness (identical seeds reproduce identical runs)"),
        )
        .arg(
            Arg::new("cycles")
                .long("cycles")
                .default_value(DEFAULT_CYCLES)
                .value_parser(value_parser!(u64))
                .help("Number of cycles to simulate"),
        )
        .arg(
            Arg::new("bins")
                .long("bins")
                .default_value(DEFAULT_BINS)
                .value_parser(clap::builder::RangedU64ValueParser::<usize>::new().range(1..))
                .help("Number of buckets in the arrival probability histogram"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .value_parser(value_parser!(PathBuf))
                .help("Write the full summary (including per-cycle records) as JSON"),
        )
        .arg(
            Arg::new("metrics")
                .long("metrics")
                .action(ArgAction::SetTrue)
                .help("Print metrics in the Prometheus text format"),
        );
    for (name, help) in [
        ("queues", "Number of queues sharing the port"),
        ("receive-time", "Arrival trials per queue per cycle"),
    ] {
        command = command.arg(
            Arg::new(name)
                .long(name)
                .value_parser(value_parser!(usize))
                .help(help),
        );
    }
    for (name, help) in [
        ("total-bandwidth", "Bandwidth of the port"),
        ("min-bandwidth", "Bandwidth guaranteed to every queue"),
        ("increase-bandwidth", "Granularity of the remaining bandwidth"),
        ("min-size", "Smallest arriving message"),
        ("max-size", "Largest arriving message"),
    ] {
        command = command.arg(
            Arg::new(name)
                .long(name)
                .value_parser(value_parser!(u64))
                .help(help),
        );
    }
    for (name, help) in [
        ("probability-mean", "Mean arrival probability"),
        ("probability-std", "Standard deviation of arrival probabilities"),
    ] {
        command = command.arg(
            Arg::new(name)
                .long(name)
                .value_parser(value_parser!(f64))
                .help(help),
        );
    }
    command
}

/// Build the configuration from the (optional) file and any overrides
fn config(matches: &ArgMatches) -> Result<Config, Error> {
    let mut cfg = match matches.get_one::<PathBuf>("config") {
        Some(path) => load(path)?,
        None => Config::default(),
    };
    if let Some(queues) = matches.get_one::<usize>("queues") {
        cfg.queues = *queues;
    }
    if let Some(receive_time) = matches.get_one::<usize>("receive-time") {
        cfg.receive_time = *receive_time;
    }
    let get = |name: &str| matches.get_one::<u64>(name).copied();
    if let Some(total_bandwidth) = get("total-bandwidth") {
        cfg.total_bandwidth = total_bandwidth;
    }
    if let Some(min_bandwidth) = get("min-bandwidth") {
        cfg.min_bandwidth = min_bandwidth;
    }
    if let Some(increase_bandwidth) = get("increase-bandwidth") {
        cfg.increase_bandwidth = increase_bandwidth;
    }
    if let Some(min_size) = get("min-size") {
        cfg.min_size = min_size;
    }
    if let Some(max_size) = get("max-size") {
        cfg.max_size = max_size;
    }
    if let Some(mean) = matches.get_one::<f64>("probability-mean") {
        cfg.probability_mean = *mean;
    }
    if let Some(std) = matches.get_one::<f64>("probability-std") {
        cfg.probability_std = *std;
    }
    Ok(cfg)
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let cfg = config(matches)?;
    let seed = *matches.get_one::<u64>("seed").expect("seed has a default");
    let cycles = *matches.get_one::<u64>("cycles").expect("cycles has a default");
    let bins = *matches.get_one::<usize>("bins").expect("bins has a default");
    info!(?cfg, seed, cycles, "starting simulation");

    let arbiter = simulate(cfg.clone(), seed, cycles)?;
    let summary = Summary::new(seed, cfg, &arbiter);
    print_summary(&summary, bins);

    if matches.get_flag("metrics") {
        let mut registry = Registry::default();
        arbiter.register(&mut registry);
        let mut buffer = String::new();
        encode(&mut buffer, &registry).expect("encoding to a string cannot fail");
        println!("\n{buffer}");
    }

    if let Some(path) = matches.get_one::<PathBuf>("json") {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &summary).map_err(std::io::Error::from)?;
        info!(path = %path.display(), "wrote summary");
    }
    Ok(())
}

/// Print a summary of the run
fn print_summary(summary: &Summary, bins: usize) {
    println!("{}", "-".repeat(80).yellow());
    println!(
        "{}",
        format!(
            "queues: {} | capacity: {}B/cycle | cycles: {} | seed: {}",
            summary.bandwidths.len(),
            summary.capacity,
            summary.cycles,
            summary.seed
        )
        .bold()
        .cyan()
    );
    println!("{}", format!("digest: {}", summary.digest).white());

    // Arrival probabilities
    println!("{}", "\narrival probabilities:".bold().blue());
    let counts = histogram(&summary.probabilities, bins);
    for (bin, count) in counts.iter().enumerate() {
        let low = bin as f64 / bins as f64;
        let high = (bin + 1) as f64 / bins as f64;
        println!("    [{low:.2}, {high:.2}): {count}");
    }

    // Port usage
    let Stats {
        mean,
        median,
        std_dev,
        min,
        max,
    } = &summary.port_usage;
    println!("{}", "\nport usage:".bold().blue());
    println!(
        "{}",
        format!(
            "    mean: {mean:.4} (stdv: {std_dev:.4}) | median: {median:.4} | min: {min:.4} | max: {max:.4}"
        )
        .green()
    );
    let remaining = summary.port.remaining.last().copied().unwrap_or_default();
    println!("{}", format!("    remaining: {remaining}B").green());

    // Queue usage
    println!("{}", "\nqueue usage:".bold().blue());
    for (index, (usage, bandwidth)) in summary
        .queue_usage
        .iter()
        .zip(&summary.bandwidths)
        .enumerate()
    {
        let record = &summary.queues[index];
        let line = format!(
            "    [{index}] bandwidth: {bandwidth} | sent: {}B | usage: {usage:.4}",
            record.total
        );
        if *usage < 0.9 {
            println!("{}", line.red());
        } else {
            println!("{}", line.green());
        }
    }
    let overall = Stats::new(&summary.queue_usage);
    println!(
        "{}",
        format!(
            "    [all] mean: {:.4} (stdv: {:.4}) | median: {:.4}",
            overall.mean, overall.std_dev, overall.median
        )
        .magenta()
    );
}
