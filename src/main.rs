// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! DervMon - Diesel Engine Sensor Monitor
//!
//! Continuously polls engine sensors over a (real or simulated) OBD link,
//! debounces threshold breaches into fault codes, and renders periodic
//! diagnostic reports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use dervmon::core::{EventPayload, EventType};
use dervmon::obd::SimulatedLink;
use dervmon::reporting::{console, json};
use dervmon::{Config, DiagnosticEngine, Severity, VERSION};

/// DervMon - Diesel Engine Sensor Monitor
#[derive(Parser, Debug)]
#[command(name = "dervmon")]
#[command(author = "DervMon Project")]
#[command(version = VERSION)]
#[command(about = "Event-driven diesel engine diagnostics and fault alerting")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Vehicle identifier used in reports
    #[arg(long)]
    vehicle_id: Option<String>,

    /// Sensor polling interval override in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Report cadence override in seconds
    #[arg(long)]
    report_interval_s: Option<u64>,

    /// Directory for periodic JSON reports
    #[arg(long)]
    json_dir: Option<PathBuf>,

    /// Seed for the simulated OBD link (reproducible runs)
    #[arg(long)]
    seed: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("DervMon v{VERSION} - Diesel Engine Sensor Monitor");

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if let Some(vehicle_id) = args.vehicle_id.clone() {
        config.vehicle_id = vehicle_id;
    }
    if let Some(interval) = args.poll_interval_ms {
        config.poll_interval_ms = interval;
    }
    if let Some(interval) = args.report_interval_s {
        config.report_interval_s = interval;
    }
    if args.seed.is_some() {
        config.simulation.seed = args.seed;
    }

    info!("Configuration loaded from {:?}", config_path);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, args))
}

async fn run(config: Config, args: Args) -> Result<()> {
    if let Some(dir) = &args.json_dir {
        std::fs::create_dir_all(dir)?;
    }

    let link = Arc::new(SimulatedLink::new(config.simulation.clone()));
    let report_interval = Duration::from_secs(config.report_interval_s);
    let vehicle_id = config.vehicle_id.clone();
    let engine = Arc::new(DiagnosticEngine::new(config, link)?);
    let bus = engine.bus();

    // Alert logging for fault transitions
    bus.subscribe(
        |event| {
            if let EventPayload::Fault(fault) = &event.payload {
                match event.severity {
                    Severity::Critical => {
                        error!("[FAULT] {} — {} {}", fault.sensor_id, fault.code, fault.description)
                    }
                    Severity::High | Severity::Warning => {
                        warn!("[FAULT] {} — {} {}", fault.sensor_id, fault.code, fault.description)
                    }
                    Severity::Info => {
                        info!("[CLEARED] {} — {}", fault.sensor_id, fault.code)
                    }
                }
            }
            Ok(())
        },
        None,
    );

    // Periodic report rendering
    let json_dir = args.json_dir.clone();
    bus.subscribe(
        move |event| {
            if let EventPayload::Report(report) = &event.payload {
                console::print(report);
                if let Some(dir) = &json_dir {
                    let stamp = report.generated_at.format("%Y%m%d_%H%M%S");
                    let path = dir.join(format!("{}_{stamp}.json", report.vehicle_id));
                    json::write_file(report, &path)?;
                    info!("JSON report saved to {:?}", path);
                }
            }
            Ok(())
        },
        Some(EventType::ReportReady),
    );

    info!("Starting diagnostic session for {vehicle_id} — press Ctrl+C to stop");

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run(report_interval).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping diagnostic session...");
    engine.stop();
    runner.await??;

    // Final snapshot on the way out
    match engine.snapshot() {
        Ok(report) => console::print(&report),
        Err(error) => warn!(%error, "final snapshot unavailable"),
    }

    info!("DervMon shutdown complete");
    Ok(())
}
