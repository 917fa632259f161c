use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use packetwatch_capture::{
    CaptureBackend, InterfaceSelector, PcapBackend, PcapFileBackend, RawPacket, SyntheticBackend,
    SystemInterfaces, SYNTHETIC_INTERFACE,
};
use packetwatch_config::{CaptureMode, PacketwatchConfig};
use packetwatch_core::PipelineEvent;
use packetwatch_detection::{load_classifier, FeatureExtractor};
use packetwatch_engine::{Pipeline, PipelineState};
use packetwatch_telemetry::EventLogger;

/// How often `run` checks whether a replay has finished on its own.
const STATUS_POLL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "packetwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture, classify and report until interrupted
    Run(RunArgs),
    /// List capture interface candidates and the one that would be selected
    Interfaces(ConfigArgs),
    /// Load the classifier artifacts and label two probe packets
    CheckModel(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration file (defaults to config/packetwatch.yaml plus environment)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Interface to capture on; selected automatically when omitted
    #[arg(short, long)]
    pub interface: Option<String>,
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Capture file to replay (implies --mode file)
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Print Prometheus metrics on exit
    #[arg(long)]
    pub metrics: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ModeArg {
    Pcap,
    File,
    Synthetic,
}

impl From<ModeArg> for CaptureMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Pcap => CaptureMode::Pcap,
            ModeArg::File => CaptureMode::File,
            ModeArg::Synthetic => CaptureMode::Synthetic,
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PacketwatchConfig> {
    let config = match path {
        Some(path) => PacketwatchConfig::load_from_path(path),
        None => PacketwatchConfig::load(),
    }
    .context("failed to load configuration")?;
    EventLogger::init(&config.telemetry.log_filter, config.telemetry.json_logs)?;
    Ok(config)
}

/// Backend for the configured mode, plus the interface it should open when
/// none was named.
fn backend_for(config: &PacketwatchConfig) -> anyhow::Result<(Arc<dyn CaptureBackend>, Option<String>)> {
    match config.capture.mode {
        CaptureMode::Pcap => {
            let backend: Arc<dyn CaptureBackend> = Arc::new(PcapBackend::new());
            Ok((backend, None))
        }
        CaptureMode::File => {
            let path = config
                .capture
                .file
                .clone()
                .context("file mode needs a capture file (--file)")?;
            let file = PcapFileBackend::new(path);
            let label = file.label();
            let backend: Arc<dyn CaptureBackend> = Arc::new(file);
            Ok((backend, Some(label)))
        }
        CaptureMode::Synthetic => {
            let backend: Arc<dyn CaptureBackend> =
                Arc::new(SyntheticBackend::new(config.capture.synthetic_seed));
            Ok((backend, Some(SYNTHETIC_INTERFACE.to_string())))
        }
    }
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.config.as_deref())?;
    if let Some(file) = args.file {
        config.capture.file = Some(file);
        config.capture.mode = CaptureMode::File;
    }
    if let Some(mode) = args.mode {
        config.capture.mode = mode.into();
    }

    let classifier =
        load_classifier(&config.model).context("failed to load classifier artifacts")?;
    let (backend, default_interface) = backend_for(&config)?;
    let pipeline = Arc::new(Pipeline::new(
        config.capture.clone(),
        config.pipeline.clone(),
        backend,
        classifier,
    )?);

    let mut events = pipeline.subscribe();
    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => report(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event reporter lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let hint = args.interface.or(default_interface);
    let status = pipeline.start(hint.as_deref())?;
    info!(interface = ?status.interface, "capturing, press Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(STATUS_POLL);
    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("interrupt received, stopping");
                break;
            }
            _ = poll.tick() => {
                if pipeline.status().state == PipelineState::Idle {
                    info!("capture source finished");
                    break;
                }
            }
        }
    }

    let stopper = pipeline.clone();
    let status = tokio::task::spawn_blocking(move || stopper.stop()).await?;
    reporter.abort();

    println!("{}", serde_json::to_string_pretty(&status)?);
    if args.metrics {
        print!("{}", pipeline.metrics().gather()?);
    }
    Ok(())
}

fn report(event: &PipelineEvent) {
    match event {
        PipelineEvent::Batch(report) => {
            let stats = &report.stats;
            for record in report.records.iter().filter(|r| r.is_malicious()) {
                let addr = |a: Option<std::net::IpAddr>| {
                    a.map(|ip| ip.to_string()).unwrap_or_else(|| "-".into())
                };
                println!(
                    "[{}] MALICIOUS {} {} -> {} ({} bytes)",
                    record.observed_at.format("%H:%M:%S"),
                    record.packet.protocol,
                    addr(record.packet.source_address),
                    addr(record.packet.dest_address),
                    record.packet.length,
                );
            }
            println!(
                "batch {}: benign {} malicious {} | total benign {} malicious {}",
                stats.batches,
                stats.batch_benign,
                stats.batch_malicious,
                stats.total_benign,
                stats.total_malicious
            );
        }
        PipelineEvent::Error { message } => eprintln!("capture error: {message}"),
        PipelineEvent::ClassificationFailed { reason } => {
            eprintln!("classification failed: {reason}")
        }
    }
}

pub fn interfaces(args: ConfigArgs) -> anyhow::Result<()> {
    load_config(args.config.as_deref())?;
    let selector = InterfaceSelector::new(Arc::new(SystemInterfaces::new(Arc::new(
        PcapBackend::new(),
    ))));

    for candidate in selector.candidates() {
        println!("{:<48} score {}", candidate.name, candidate.score);
    }
    match selector.select_interface() {
        Ok(selected) => println!("selected: {} (score {})", selected.name, selected.score),
        Err(e) => println!("{e}"),
    }
    Ok(())
}

pub fn check_model(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let classifier =
        load_classifier(&config.model).context("failed to load classifier artifacts")?;

    let zero = RawPacket::bare(0, 0.0);
    let mut syn_ack = RawPacket::bare(60, 0.0);
    syn_ack.syn = true;
    syn_ack.ack = true;
    syn_ack.transport_header_length = 20;
    syn_ack.protocol = "TCP".into();

    for (name, packet) in [("zero", zero), ("syn+ack", syn_ack)] {
        let label = classifier.classify(&FeatureExtractor::extract(&packet))?;
        println!("{name:<8} {label}");
    }
    Ok(())
}
