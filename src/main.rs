//! Host telemetry sampling CLI.
#![forbid(unsafe_code)]

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use machmetrics::{
    LogConfig, MetricSampler, PlatformProbes, SamplerConfig, TelemetrySnapshot, init_logging,
    open_smc,
};

#[derive(Parser)]
#[command(name = "machmetrics", about = "Continuous host telemetry sampling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect one snapshot and print it
    Collect {
        /// Output format (json, pretty or summary)
        #[arg(long, default_value = "json")]
        format: OutputFormat,

        /// Warm-up window in milliseconds before the published sample
        #[arg(long, default_value_t = 350)]
        sample_ms: u64,
    },

    /// Sample continuously, printing one snapshot per tick
    Watch {
        /// Output format (json, pretty or summary)
        #[arg(long, default_value = "summary")]
        format: OutputFormat,

        /// Milliseconds between updates
        #[arg(long, default_value_t = 333)]
        interval_ms: u64,

        /// Stop after this many snapshots; 0 runs until interrupted
        #[arg(long, default_value_t = 0)]
        count: u64,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    Json,
    Pretty,
    Summary,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info");
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    match cli.command {
        Commands::Collect { format, sample_ms } => collect(format, sample_ms),
        Commands::Watch {
            format,
            interval_ms,
            count,
        } => watch(format, interval_ms, count),
    }
}

fn new_sampler(config: SamplerConfig) -> Result<MetricSampler> {
    let mut sampler = MetricSampler::new(Box::new(PlatformProbes::new()), open_smc(), config);
    sampler
        .initialize()
        .context("establishing the CPU tick baseline")?;
    Ok(sampler)
}

fn collect(format: OutputFormat, sample_ms: u64) -> Result<()> {
    // One-shot mode wants every delta metric to span the warm-up window,
    // so all gates open on the second update.
    let window = Duration::from_millis(sample_ms.max(1));
    let config = SamplerConfig::default()
        .with_network_interval(window)
        .with_disk_interval(window)
        .with_gpu_interval(window)
        .with_battery_interval(window)
        .with_fan_interval(window);

    let mut sampler = new_sampler(config)?;
    sampler.update();
    thread::sleep(window);
    let snapshot = sampler.update();
    print_snapshot(snapshot, format)
}

fn watch(format: OutputFormat, interval_ms: u64, count: u64) -> Result<()> {
    let interval = Duration::from_millis(interval_ms.max(1));
    let mut sampler = new_sampler(SamplerConfig::default())?;

    let mut produced = 0u64;
    loop {
        let started = Instant::now();
        let snapshot = sampler.update();
        print_snapshot(snapshot, format)?;

        produced += 1;
        if count != 0 && produced >= count {
            return Ok(());
        }
        thread::sleep(interval.saturating_sub(started.elapsed()));
    }
}

fn print_snapshot(snapshot: &TelemetrySnapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", snapshot.to_json()?),
        OutputFormat::Pretty => println!("{}", snapshot.to_json_pretty()?),
        OutputFormat::Summary => println!("{}", snapshot.summary()),
    }
    Ok(())
}
