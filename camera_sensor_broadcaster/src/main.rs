//! # Camera Sensor Broadcaster Binary
//!
//! Hosts a camera sensor broadcaster against a simulated camera and an
//! in-process transport.
//!
//! # Usage
//!
//! ```bash
//! # Run until Ctrl-C
//! camera_sensor_broadcaster --config config/broadcaster.toml
//!
//! # 500 cycles, debug logs, frame metadata as JSON lines
//! camera_sensor_broadcaster -c config/broadcaster.toml -n 500 -v --frames-out frames.jsonl
//! ```

use broadcaster_common::config::{ConfigLoader, LogLevel};
use broadcaster_common::consts::DEFAULT_CONFIG_PATH;
use broadcaster_common::msgs::Image;
use camera_sensor_broadcaster::broadcaster::raw_topic;
use camera_sensor_broadcaster::config::BroadcasterConfig;
use camera_sensor_broadcaster::monitor::FrameSummary;
use camera_sensor_broadcaster::transport::{InProcessTransport, Subscription};
use camera_sensor_broadcaster::{BroadcasterHost, ControllerRegistry};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Camera Sensor Broadcaster - republishes camera frames every control cycle
#[derive(Parser, Debug)]
#[command(name = "camera_sensor_broadcaster")]
#[command(version)]
#[command(about = "Lifecycle-managed camera sensor broadcaster")]
#[command(long_about = None)]
struct Args {
    /// Path to the broadcaster configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Stop after this many cycles (default: run until Ctrl-C).
    #[arg(short = 'n', long)]
    cycles: Option<u64>,

    /// Write one JSON line of metadata per delivered frame to this file.
    #[arg(long, value_name = "FILE")]
    frames_out: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Broadcaster failed: {}", e);
        eprintln!("camera_sensor_broadcaster: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = BroadcasterConfig::load(&args.config);
    let log_level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);
    let config = config?;

    info!(
        "{} v{} starting...",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION")
    );

    let transport = Arc::new(InProcessTransport::<Image>::new());
    let topic = raw_topic(&config.host.controller_name);
    let subscription = transport.subscribe(&topic, 8)?;

    let registry = ControllerRegistry::with_builtin();
    let mut host = BroadcasterHost::new(&config, &registry, transport.clone())?;

    let running = host.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let monitor_running = Arc::new(AtomicBool::new(true));
    let monitor = spawn_monitor(
        subscription,
        args.frames_out.clone(),
        Arc::clone(&monitor_running),
    )?;

    match host.bring_up() {
        Ok(()) => host.run(args.cycles),
        Err(e) => error!("Bring-up failed: {}", e),
    }

    host.shutdown()?;
    monitor_running.store(false, Ordering::SeqCst);
    let received = monitor.join().map_err(|_| "frame monitor panicked")?;

    let stats = host.stats();
    info!(
        "Shutdown complete: {} cycles, avg={}us, max={}us, {} frames received on {} ({} dropped)",
        stats.cycle_count,
        stats.avg_cycle_time_us(),
        stats.max_cycle_time_us,
        received,
        topic,
        transport.dropped(&topic)
    );
    Ok(())
}

/// Receive frames until `running` is cleared; returns the number received.
fn spawn_monitor(
    subscription: Subscription<Image>,
    frames_out: Option<PathBuf>,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<u64>> {
    let mut sink = match frames_out {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    thread::Builder::new()
        .name("frame_monitor".to_string())
        .spawn(move || {
            let mut received = 0u64;
            while running.load(Ordering::SeqCst) {
                let Some(frame) = subscription.recv_timeout(Duration::from_millis(50)) else {
                    continue;
                };
                received += 1;
                let summary = FrameSummary::from_image(&frame);
                debug!(
                    "Frame #{} on {}: {}x{} {} checksum={}",
                    received,
                    subscription.topic(),
                    summary.width,
                    summary.height,
                    summary.encoding,
                    summary.checksum
                );
                let failed = match sink.as_mut() {
                    Some(out) => summary.write_json_line(out).err(),
                    None => None,
                };
                if let Some(e) = failed {
                    warn!("Failed to write frame summary: {}", e);
                    sink = None;
                }
            }
            if let Some(mut out) = sink {
                if let Err(e) = out.flush() {
                    warn!("Failed to flush frame summaries: {}", e);
                }
            }
            received
        })
}

/// Setup tracing subscriber based on CLI arguments and configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
