//! Keystroke Telemetry CLI
//!
//! Records keystroke-dynamics windows and scores a subject's history.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use keystroke_telemetry::{
    collector::{ChannelCollector, CollectorConfig, CollectorError, KeyEvent},
    config::Config,
    core::{analyze, RecordBuilder, ResultSeries, WindowLabel},
    session::TelemetrySession,
    store::WindowStore,
    transparency::{create_shared_log_with_persistence, TransparencyLog},
    transport::{HistorySource, WindowSink},
    TelemetryEmitter, PRIVACY_DECLARATION, VERSION,
};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "gateway")]
use keystroke_telemetry::GatewayClient;

#[derive(Parser)]
#[command(name = "keystroke-telemetry")]
#[command(version = VERSION)]
#[command(about = "Keystroke-dynamics telemetry and impostor scoring", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record keystroke windows from stdin (`<code> <down|up> <timestamp_ms>` per line)
    Record {
        /// Subject the windows belong to
        #[arg(long)]
        subject: String,

        /// Submit windows to this server instead of the local store
        #[arg(long)]
        gateway: Option<String>,

        /// Window length in seconds (overrides the configured value)
        #[arg(long)]
        window_secs: Option<u64>,

        /// Flush the partial window when input ends instead of discarding it
        #[arg(long)]
        flush_on_exit: bool,
    },

    /// Score a subject's window history against their profile
    Score {
        /// Subject to score
        #[arg(long)]
        subject: String,

        /// Fetch history from this server instead of the local store
        #[arg(long)]
        gateway: Option<String>,

        /// Print the result series as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve window submission and scoring over HTTP (requires server feature)
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
    },

    /// Show stored subjects and cumulative counters
    Status,

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match cli.command {
        Commands::Record {
            subject,
            gateway,
            window_secs,
            flush_on_exit,
        } => cmd_record(&subject, gateway, window_secs, flush_on_exit),
        Commands::Score {
            subject,
            gateway,
            json,
        } => cmd_score(&subject, gateway, json),
        Commands::Serve { port } => cmd_serve(port),
        Commands::Status => cmd_status(),
        Commands::Privacy => {
            println!("{PRIVACY_DECLARATION}");
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

/// Install the global subscriber. Logs go to stderr so `score --json` output stays clean.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        warn!("could not load config, using defaults: {e}");
        Config::default()
    })
}

fn window_sink(config: &Config, gateway: Option<String>) -> anyhow::Result<Arc<dyn WindowSink>> {
    match gateway.or_else(|| config.gateway_url.clone()) {
        #[cfg(feature = "gateway")]
        Some(url) => {
            let client = GatewayClient::new(config.gateway_config(url))?;
            println!("  Device ID: {}", client.device_id());
            Ok(Arc::new(client))
        }
        #[cfg(not(feature = "gateway"))]
        Some(_) => bail!("--gateway requires the `gateway` feature"),
        None => {
            let store = WindowStore::open(config.store_path())
                .with_context(|| format!("opening {:?}", config.store_path()))?;
            Ok(Arc::new(store))
        }
    }
}

fn history_source(
    config: &Config,
    gateway: Option<String>,
) -> anyhow::Result<Box<dyn HistorySource>> {
    match gateway.or_else(|| config.gateway_url.clone()) {
        #[cfg(feature = "gateway")]
        Some(url) => Ok(Box::new(GatewayClient::new(config.gateway_config(url))?)),
        #[cfg(not(feature = "gateway"))]
        Some(_) => bail!("--gateway requires the `gateway` feature"),
        None => {
            let store = WindowStore::open(config.store_path())
                .with_context(|| format!("opening {:?}", config.store_path()))?;
            Ok(Box::new(store))
        }
    }
}

fn cmd_record(
    subject: &str,
    gateway: Option<String>,
    window_secs: Option<u64>,
    flush_on_exit: bool,
) -> anyhow::Result<()> {
    let mut config = load_config();
    if let Some(secs) = window_secs {
        config.window_duration = Duration::from_secs(secs);
    }
    config.validate()?;
    if let Err(e) = config.ensure_directories() {
        warn!("could not create data directory: {e}");
    }

    println!("Keystroke Telemetry v{VERSION}");
    println!();
    println!("  Subject: {subject}");
    println!("  Window duration: {}s", config.window_duration.as_secs());

    let runtime = tokio::runtime::Runtime::new()?;
    let guard = runtime.enter();

    let transparency = create_shared_log_with_persistence(config.transparency_path());
    let sink = window_sink(&config, gateway)?;
    let builder = RecordBuilder::new().with_timezone(config.tz()?);
    println!("  Session ID: {}", builder.session_id());

    let emitter = TelemetryEmitter::new(subject, sink, builder, transparency.clone());
    let session = TelemetrySession::new(config.window_duration, emitter, transparency.clone())?;

    let mut collector = ChannelCollector::new(CollectorConfig::default());
    collector.start()?;
    let sender = collector
        .sender()
        .context("collector closed before start")?;
    collector.close();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            let event = match line.parse::<KeyEvent>() {
                Ok(event) => event,
                Err(e) => {
                    warn!("skipping input line: {e}");
                    continue;
                }
            };
            match sender.send(event) {
                Ok(()) => {}
                Err(CollectorError::QueueFull) => warn!("event queue full; dropping key event"),
                Err(_) => break,
            }
        }
    });

    println!();
    println!("Reading key events from stdin. Press Ctrl+C to stop.");
    println!();

    session.start()?;
    let receiver = collector.receiver().clone();
    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                session.handle_event(&event);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                info!("input closed");
                break;
            }
        }
    }

    if flush_on_exit {
        if let Some(window) = session.flush() {
            println!(
                "Flushed final window {} with {} keystrokes",
                window.index, window.aggregate.stroke_count
            );
        }
    }
    let discarded = session.stop();
    collector.stop();
    if discarded > 0 {
        println!("Discarded {discarded} keystrokes from the unfinished window");
    }

    // Let in-flight submissions finish before the runtime goes away.
    drop(guard);
    runtime.block_on(tokio::time::sleep(Duration::from_millis(250)));
    runtime.shutdown_timeout(Duration::from_secs(5));

    if let Err(e) = transparency.save() {
        warn!("could not save transparency log: {e}");
    }

    println!();
    println!("{}", transparency.summary());
    Ok(())
}

fn cmd_score(subject: &str, gateway: Option<String>, json: bool) -> anyhow::Result<()> {
    let config = load_config();
    let source = history_source(&config, gateway)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let windows = runtime.block_on(source.fetch_history(subject))?;
    let series = analyze(subject, &windows, &config.scoring)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&series)?);
    } else {
        print_series(&series);
    }
    Ok(())
}

fn print_series(series: &ResultSeries) {
    println!("Subject: {}", series.subject_id());
    println!(
        "Profile: window {} | inactive below {} strokes | suspicious above {:.2}",
        series.profile_index(),
        series.policy().inactivity_threshold,
        series.policy().suspicion_threshold
    );
    println!();
    println!("{:>6}  {:>8}  {:>8}  label", "window", "strokes", "smd");
    for (point, label) in series.labels() {
        println!(
            "{:>6}  {:>8}  {:>8.3}  {}",
            point.window_index, point.stroke_count, point.smd, label
        );
    }
    println!();
    println!(
        "{} legitimate, {} suspicious, {} inactive",
        series.count(WindowLabel::Legitimate),
        series.count(WindowLabel::Suspicious),
        series.count(WindowLabel::Inactive)
    );

    let runs: Vec<String> = series
        .active_runs()
        .iter()
        .map(|run| format!("{}-{}", run.start, run.end - 1))
        .collect();
    if !runs.is_empty() {
        println!("Active runs: {}", runs.join(", "));
    }
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16) -> anyhow::Result<()> {
    use keystroke_telemetry::server::{self, ServerConfig};

    let config = load_config();
    config.validate()?;
    config.ensure_directories()?;

    let store = Arc::new(
        WindowStore::open(config.store_path())
            .with_context(|| format!("opening {:?}", config.store_path()))?,
    );
    println!(
        "Loaded {} windows for {} subjects",
        store.window_count(),
        store.subjects().len()
    );

    let transparency = create_shared_log_with_persistence(config.transparency_path());
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (addr, shutdown) = server::run(
            ServerConfig::new(port, config.scoring),
            store,
            transparency.clone(),
        )
        .await?;
        println!("Listening on http://{addr}. Press Ctrl+C to stop.");

        tokio::signal::ctrl_c().await?;
        let _ = shutdown.send(());
        anyhow::Ok(())
    })?;

    if let Err(e) = transparency.save() {
        warn!("could not save transparency log: {e}");
    }
    Ok(())
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_port: u16) -> anyhow::Result<()> {
    bail!("`serve` requires the `server` feature (rebuild with --features server)")
}

fn cmd_status() -> anyhow::Result<()> {
    let config = load_config();

    println!("Keystroke Telemetry Status");
    println!("==========================");
    println!();
    println!("  Window duration: {}s", config.window_duration.as_secs());
    println!(
        "  Gateway: {}",
        config.gateway_url.as_deref().unwrap_or("none (local store)")
    );
    println!();

    let store_path = config.store_path();
    if store_path.exists() {
        let store = WindowStore::open(&store_path)
            .with_context(|| format!("opening {store_path:?}"))?;
        println!("Stored windows ({store_path:?}):");
        for subject in store.subjects() {
            println!("  {subject}: {}", store.history(&subject).len());
        }
    } else {
        println!("No local window store found.");
    }
    println!();

    if config.transparency_path().exists() {
        let log = TransparencyLog::with_persistence(config.transparency_path());
        println!("{}", log.summary());
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if let Err(e) = config.validate() {
        bail!("configuration is invalid: {e}");
    }
    Ok(())
}
