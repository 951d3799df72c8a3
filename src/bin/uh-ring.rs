//! uh-ring CLI
//!
//! Commands:
//! - (none): Print today's report
//! - get: Print a single metric value
//! - serve: Poll the API and forward samples via remote write
//! - metrics: List the known metric types

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use uh_ring::config::{load_config, ConfigLayer, Settings};
use uh_ring::logging::init_logging;
use uh_ring::registry::{MetricKind, SpecialMetric};
use uh_ring::render::metric_value;
use uh_ring::{
    decoder, server, ConfigError, FetchError, MetricRegistry, MetricsSource, Poller,
    RemoteWriteClient, Renderer, TextRenderer, TrackerState, TransportError, UltrahumanClient,
    VERSION,
};

/// uh-ring - Ultrahuman ring metrics in the terminal and in Prometheus
#[derive(Parser)]
#[command(name = "uh-ring")]
#[command(version = VERSION)]
#[command(about = "Show Ultrahuman ring metrics or forward them to Prometheus", long_about = None)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct GlobalOptions {
    /// Ultrahuman partner API token
    #[arg(long, env = "ULTRAHUMAN_API_TOKEN", global = true, hide_env_values = true)]
    api_token: Option<String>,

    /// Daily metrics endpoint
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Config file (defaults to ./uh-ring.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a single metric value for today
    Get {
        /// Metric type, e.g. hr, steps, sleep, motion
        metric: String,
    },

    /// Poll the API and forward new samples via Prometheus remote write
    Serve {
        /// Port for the /health and /status endpoints
        #[arg(long)]
        port: Option<u16>,

        /// Poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Prometheus remote write endpoint
        #[arg(long, env = "PROMETHEUS_REMOTE_WRITE_URL")]
        remote_write_url: Option<String>,

        /// Advance high-water marks before the push instead of after it succeeds
        #[arg(long)]
        commit_before_send: bool,
    },

    /// List the metric types uh-ring knows about
    Metrics,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.options.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), UhCliError> {
    let registry = MetricRegistry::standard();

    if let Some(Commands::Metrics) = cli.command {
        cmd_metrics(&registry);
        return Ok(());
    }

    let file = load_config(cli.options.config.as_deref())?;
    let mut layer = ConfigLayer {
        api_token: cli.options.api_token,
        api_url: cli.options.api_url,
        ..Default::default()
    };
    if let Some(Commands::Serve {
        port,
        interval,
        remote_write_url,
        commit_before_send,
    }) = &cli.command
    {
        layer.port = *port;
        layer.interval_seconds = *interval;
        layer.remote_write_url = remote_write_url.clone();
        // An unset flag defers to the config file
        layer.commit_before_send = commit_before_send.then_some(true);
    }
    let settings = Settings::resolve(file, layer)?;

    match cli.command {
        None => cmd_report(&settings, &registry).await,
        Some(Commands::Get { metric }) => cmd_get(&settings, &registry, &metric).await,
        Some(Commands::Serve { .. }) => cmd_serve(settings, registry).await,
        Some(Commands::Metrics) => Ok(()),
    }
}

async fn cmd_report(settings: &Settings, registry: &MetricRegistry) -> Result<(), UhCliError> {
    let client = UltrahumanClient::new(&settings.api_url, &settings.api_token)?;
    let response = client.fetch(Local::now().date_naive()).await?;

    let report = decoder::decode_response(&response, registry);
    print!("{}", TextRenderer::local(registry).render(&report));
    Ok(())
}

async fn cmd_get(
    settings: &Settings,
    registry: &MetricRegistry,
    metric: &str,
) -> Result<(), UhCliError> {
    let client = UltrahumanClient::new(&settings.api_url, &settings.api_token)?;
    let response = client.fetch(Local::now().date_naive()).await?;

    let envelopes = response
        .data
        .metrics
        .values()
        .next()
        .map(Vec::as_slice)
        .unwrap_or_default();
    println!("{}", metric_value(envelopes, metric, registry));
    Ok(())
}

async fn cmd_serve(settings: Settings, registry: MetricRegistry) -> Result<(), UhCliError> {
    let remote_write_url = settings.require_remote_write()?;
    let sink = RemoteWriteClient::new(remote_write_url)?;
    let source = UltrahumanClient::new(&settings.api_url, &settings.api_token)?;

    let registry = Arc::new(registry);
    let tracker = Arc::new(TrackerState::new());

    let poller = Poller::new(source, sink, registry, Arc::clone(&tracker))
        .with_interval(settings.interval)
        .with_commit_policy(settings.commit_policy);
    tracing::info!(
        interval_seconds = settings.interval.as_secs(),
        remote_write_url,
        "starting poll loop"
    );
    let poll_task = tokio::spawn(poller.run());

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    // The poll loop only returns if its task dies; take the process down with it
    tokio::select! {
        served = server::run_server(addr, tracker, settings.interval) => served?,
        joined = poll_task => {
            let message = match joined {
                Ok(()) => "poll loop exited".to_string(),
                Err(e) => e.to_string(),
            };
            tracing::error!(%message, "poll loop stopped");
            return Err(UhCliError::Poller(message));
        }
    }
    Ok(())
}

fn cmd_metrics(registry: &MetricRegistry) {
    println!("{:<28} {:<14} {:<10} FORWARDED AS", "TYPE", "KIND", "UNIT");
    for entry in registry.entries() {
        let kind = match entry.kind {
            MetricKind::TimeSeries => "time series",
            MetricKind::Scalar => "scalar",
            MetricKind::CompositeSleep => "sleep",
        };
        let forwarded = if entry.is_forwarded() {
            entry.output_name
        } else {
            "-"
        };
        println!(
            "{:<28} {:<14} {:<10} {}",
            entry.wire_type, kind, entry.unit, forwarded
        );
    }
    for special in [SpecialMetric::Sleep, SpecialMetric::Motion] {
        println!("{:<28} {:<14} {:<10} -", special.as_str(), "special", "");
    }
}

// Error types

#[derive(Debug)]
enum UhCliError {
    Config(ConfigError),
    Fetch(FetchError),
    Transport(TransportError),
    Io(std::io::Error),
    Poller(String),
}

impl From<ConfigError> for UhCliError {
    fn from(e: ConfigError) -> Self {
        UhCliError::Config(e)
    }
}

impl From<FetchError> for UhCliError {
    fn from(e: FetchError) -> Self {
        UhCliError::Fetch(e)
    }
}

impl From<TransportError> for UhCliError {
    fn from(e: TransportError) -> Self {
        UhCliError::Transport(e)
    }
}

impl From<std::io::Error> for UhCliError {
    fn from(e: std::io::Error) -> Self {
        UhCliError::Io(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<UhCliError> for CliError {
    fn from(e: UhCliError) -> Self {
        match e {
            UhCliError::Config(e) => {
                let hint = match e {
                    ConfigError::MissingToken => {
                        Some("Pass --api-token or set ULTRAHUMAN_API_TOKEN".to_string())
                    }
                    ConfigError::MissingRemoteWrite => Some(
                        "Pass --remote-write-url or set PROMETHEUS_REMOTE_WRITE_URL".to_string(),
                    ),
                    _ => None,
                };
                CliError {
                    code: "CONFIG_ERROR".to_string(),
                    message: e.to_string(),
                    hint,
                }
            }
            UhCliError::Fetch(e) => CliError {
                code: "FETCH_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the API token and network connection".to_string()),
            },
            UhCliError::Transport(e) => CliError {
                code: "TRANSPORT_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            UhCliError::Poller(message) => CliError {
                code: "POLLER_ERROR".to_string(),
                message,
                hint: None,
            },
            UhCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check that the port is free".to_string()),
            },
        }
    }
}
