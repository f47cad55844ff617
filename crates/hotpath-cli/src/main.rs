//! hotpath - streaming hot-path detection over bike trip data.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use hotpath_cli::analyze::analyze;
use hotpath_cli::artifacts::{
    read_projection_set, write_counters_csv, write_latency_csv, write_projection_csv,
};
use hotpath_cli::ingest::{read_trips, write_trips};
use hotpath_cli::profile::RunProfile;
use hotpath_core::{PatternConfig, ShedMode, SheddingConfig};
use hotpath_runtime::driver::{MemorySink, StreamDriver};
use hotpath_runtime::matcher::HotPathMatcher;
use hotpath_runtime::recall::{projection_set, recall};
use hotpath_runtime::shedding::SheddingController;
use hotpath_runtime::synth::{generate, SynthConfig};
use hotpath_runtime::RunSummary;

#[derive(Parser)]
#[command(name = "hotpath")]
#[command(author = "Hotpath Contributors")]
#[command(version)]
#[command(about = "Hot-path detection over bike trip streams with load shedding", long_about = None)]
struct Cli {
    /// Path to a TOML run profile; explicit flags take precedence.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pattern over a trip CSV and write run artifacts
    Run {
        /// Input trip CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Maximum events to consume.
        #[arg(long)]
        max_events: Option<u64>,

        /// Comma-separated target station ids for the terminator.
        #[arg(long)]
        target_stations: Option<String>,

        /// Time window in seconds.
        #[arg(long)]
        window_secs: Option<i64>,

        /// Maximum Kleene chain length.
        #[arg(long)]
        max_kleene: Option<usize>,

        /// Shedding mode: off, event, or hybrid.
        #[arg(long)]
        shed_mode: Option<ShedMode>,

        /// Overload target latency in milliseconds.
        #[arg(long)]
        target_latency_ms: Option<f64>,

        /// Base drop probability when overloaded.
        #[arg(long)]
        drop_prob: Option<f64>,

        /// PRNG seed for drop decisions.
        #[arg(long)]
        seed: Option<u64>,

        /// Sleep every N events (load injection; 0 disables).
        #[arg(long)]
        burst_every: Option<u64>,

        /// Sleep duration in milliseconds for burst injection.
        #[arg(long)]
        burst_sleep_ms: Option<u64>,

        /// Directory for run artifacts.
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,

        /// Artifact label; defaults to "baseline" when shedding is off and
        /// "shed" otherwise.
        #[arg(long)]
        label: Option<String>,

        /// Baseline projection CSV to compute recall against.
        #[arg(long)]
        baseline_projections: Option<PathBuf>,

        /// Print the run report as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Generate a synthetic trip CSV
    Synth {
        /// Output CSV path.
        #[arg(short, long)]
        out: PathBuf,

        #[arg(long, default_value = "10")]
        bikes: u64,

        #[arg(long, default_value = "20")]
        trips_per_bike: usize,

        /// Probability that a trip continues from the previous end station.
        #[arg(long, default_value = "0.7")]
        chain_prob: f64,

        /// Probability that a trip ends at a target station.
        #[arg(long, default_value = "0.15")]
        target_prob: f64,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Compute recall between two projection CSVs
    Recall {
        /// Baseline (unshed) projection CSV.
        #[arg(long)]
        baseline: PathBuf,

        /// Shedding-run projection CSV.
        #[arg(long)]
        run: PathBuf,
    },

    /// Report per-bike chain statistics for a trip CSV
    Analyze {
        #[arg(long)]
        csv: PathBuf,

        #[arg(long)]
        max_events: Option<u64>,

        #[arg(long)]
        target_stations: Option<String>,

        #[arg(long, default_value = "3600")]
        window_secs: i64,
    },
}

#[derive(Debug, Serialize)]
struct RunReport {
    label: String,
    summary: RunSummary,
    malformed: u64,
    recall: Option<f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting tracing subscriber")?;

    let profile = match &cli.config {
        Some(path) => RunProfile::load(path)?,
        None => RunProfile::default(),
    };

    match cli.command {
        Commands::Run {
            csv,
            max_events,
            target_stations,
            window_secs,
            max_kleene,
            shed_mode,
            target_latency_ms,
            drop_prob,
            seed,
            burst_every,
            burst_sleep_ms,
            out_dir,
            label,
            baseline_projections,
            json,
        } => {
            let pattern = resolve_pattern(
                &profile,
                target_stations.as_deref(),
                window_secs,
                max_kleene,
            )?;
            let shedding = resolve_shedding(
                &profile,
                shed_mode,
                target_latency_ms,
                drop_prob,
                seed,
                burst_every,
                burst_sleep_ms,
            );
            pattern.validate()?;
            shedding.validate()?;

            let csv = csv
                .or_else(|| profile.input.csv.clone())
                .context("no input csv given (use --csv or the profile's [input] section)")?;
            let max_events = max_events.or(profile.input.max_events);

            cmd_run(
                &csv,
                max_events,
                pattern,
                shedding,
                &out_dir,
                label,
                baseline_projections.as_deref(),
                json,
            )
        }
        Commands::Synth {
            out,
            bikes,
            trips_per_bike,
            chain_prob,
            target_prob,
            seed,
        } => {
            let config = SynthConfig {
                bikes,
                trips_per_bike,
                chain_prob,
                target_prob,
                seed,
                ..SynthConfig::default()
            };
            let trips = generate(&config);
            write_trips(&out, &trips)?;
            println!("wrote {} synthetic trips to {}", trips.len(), out.display());
            Ok(())
        }
        Commands::Recall { baseline, run } => {
            let baseline_set = read_projection_set(&baseline)?;
            let run_set = read_projection_set(&run)?;
            let value = recall(&baseline_set, &run_set);
            println!(
                "recall: {value:.3} ({} baseline, {} run projections)",
                baseline_set.len(),
                run_set.len()
            );
            Ok(())
        }
        Commands::Analyze {
            csv,
            max_events,
            target_stations,
            window_secs,
        } => {
            let mut pattern = PatternConfig::default();
            if let Some(list) = target_stations.as_deref() {
                pattern.target_stations = parse_station_list(list)?.into_iter().collect();
            }
            pattern.window_secs = window_secs;
            pattern.validate()?;

            let (trips, stats) = read_trips(&csv, max_events)?;
            let report = analyze(&trips, &pattern);
            println!("trips:               {}", report.trips);
            println!("bikes:               {}", report.bikes);
            println!("chained successions: {}", report.chained_successions);
            println!("longest chain:       {}", report.longest_chain);
            println!("target chains:       {}", report.target_chains);
            if stats.malformed > 0 {
                println!("malformed rows:      {}", stats.malformed);
            }
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    csv: &std::path::Path,
    max_events: Option<u64>,
    pattern: PatternConfig,
    shedding: SheddingConfig,
    out_dir: &std::path::Path,
    label: Option<String>,
    baseline_projections: Option<&std::path::Path>,
    json: bool,
) -> Result<()> {
    let (trips, ingest_stats) = read_trips(csv, max_events)?;
    info!(
        trips = trips.len(),
        malformed = ingest_stats.malformed,
        "loaded trip stream"
    );

    let label = label.unwrap_or_else(|| {
        if shedding.mode == ShedMode::Off {
            "baseline".to_string()
        } else {
            "shed".to_string()
        }
    });

    let controller = SheddingController::new(&shedding, pattern.max_kleene);
    let mut driver = StreamDriver::new(HotPathMatcher::new(pattern), controller)
        .with_burst(shedding.burst_every, shedding.burst_sleep_ms);
    let mut sink = MemorySink::default();
    let summary = driver.run(trips, &mut sink)?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let projections_csv = out_dir.join(format!("projections_{label}.csv"));
    let latency_csv = out_dir.join(format!("latency_samples_{label}.csv"));
    let counters_csv = out_dir.join(format!("counters_{label}.csv"));

    write_projection_csv(&projections_csv, &sink.projections)?;
    write_latency_csv(&latency_csv, &sink.detection_latencies_ms)?;
    let mut counters = summary.counters.as_pairs();
    counters.push(("malformed", ingest_stats.malformed));
    write_counters_csv(&counters_csv, &counters)?;

    let recall_value = match baseline_projections {
        Some(path) => {
            let baseline = read_projection_set(path)?;
            Some(recall(
                &baseline,
                &projection_set(sink.projections.iter().copied()),
            ))
        }
        None => None,
    };

    let report = RunReport {
        label,
        summary,
        malformed: ingest_stats.malformed,
        recall: recall_value,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("run `{}` complete", report.label);
    let c = report.summary.counters;
    println!(
        "  counters: ingested {}, forwarded {}, dropped {}, out_of_order {}, matches {}, evictions {}, pruned {}, malformed {}",
        c.ingested,
        c.forwarded,
        c.dropped,
        c.out_of_order,
        c.matches,
        c.evictions,
        c.pruned,
        report.malformed
    );
    match report.summary.latency {
        Some(l) => println!(
            "  latency ms: p50 {:.3}, p95 {:.3}, avg {:.3}, min {:.3}, max {:.3} over {} events",
            l.p50, l.p95, l.avg, l.min, l.max, l.count
        ),
        None => println!("  latency: no samples recorded"),
    }
    println!(
        "  final kleene cap: {} (overloaded at end: {})",
        report.summary.final_kleene_cap, report.summary.overloaded_at_end
    );
    if let Some(value) = report.recall {
        println!("  recall vs baseline: {value:.3}");
    }
    println!("  artifacts:");
    println!("    {}", projections_csv.display());
    println!("    {}", latency_csv.display());
    println!("    {}", counters_csv.display());
    Ok(())
}

fn resolve_pattern(
    profile: &RunProfile,
    target_stations: Option<&str>,
    window_secs: Option<i64>,
    max_kleene: Option<usize>,
) -> Result<PatternConfig> {
    let mut pattern = PatternConfig::default();

    if let Some(stations) = &profile.pattern.target_stations {
        pattern.target_stations = stations.iter().copied().collect();
    }
    if let Some(secs) = profile.pattern.window_secs {
        pattern.window_secs = secs;
    }
    if let Some(cap) = profile.pattern.max_kleene {
        pattern.max_kleene = cap;
    }

    if let Some(list) = target_stations {
        pattern.target_stations = parse_station_list(list)?.into_iter().collect();
    }
    if let Some(secs) = window_secs {
        pattern.window_secs = secs;
    }
    if let Some(cap) = max_kleene {
        pattern.max_kleene = cap;
    }
    Ok(pattern)
}

fn resolve_shedding(
    profile: &RunProfile,
    mode: Option<ShedMode>,
    target_latency_ms: Option<f64>,
    drop_prob: Option<f64>,
    seed: Option<u64>,
    burst_every: Option<u64>,
    burst_sleep_ms: Option<u64>,
) -> SheddingConfig {
    let defaults = SheddingConfig::default();
    let section = &profile.shedding;
    SheddingConfig {
        mode: mode.or(section.mode).unwrap_or(defaults.mode),
        target_latency_ms: target_latency_ms
            .or(section.target_latency_ms)
            .unwrap_or(defaults.target_latency_ms),
        base_drop_prob: drop_prob
            .or(section.base_drop_prob)
            .unwrap_or(defaults.base_drop_prob),
        seed: seed.or(section.seed).unwrap_or(defaults.seed),
        burst_every: burst_every
            .or(section.burst_every)
            .unwrap_or(defaults.burst_every),
        burst_sleep_ms: burst_sleep_ms
            .or(section.burst_sleep_ms)
            .unwrap_or(defaults.burst_sleep_ms),
    }
}

fn parse_station_list(list: &str) -> Result<Vec<u32>> {
    let mut stations = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.parse::<u32>() {
            Ok(station) => stations.push(station),
            Err(_) => bail!("invalid station id {part:?} in target station list"),
        }
    }
    Ok(stations)
}
