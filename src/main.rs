//! Incident Relay - tail an event log and raise a ticket for every event.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use incident_relay::config::{ConfigLoader, RelayConfig};
use incident_relay::display;
use incident_relay::forwarder::IncidentForwarder;
use incident_relay::monitor::{run_sampler, MetricsService, NotificationService};
use incident_relay::ticket::TicketClient;
use incident_relay::watcher::{parse_line, LogWatcher, ParseOutcome};

#[derive(Parser)]
#[command(
    name = "incident-relay",
    about = "Tail an event log and forward each incident as a ticket",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to .incident-relay.toml, then the user config dir).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the log file and create a ticket for every new event.
    Watch {
        /// Log file to tail, overriding the configuration.
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Parse lines from a file (or stdin) and report each outcome.
    Check {
        /// File to read; stdin when omitted.
        file: Option<PathBuf>,
    },
    /// Print the effective configuration with tokens redacted.
    Config,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn loader(path: Option<PathBuf>) -> ConfigLoader {
    path.map_or_else(ConfigLoader::new, ConfigLoader::with_path)
}

async fn watch(config: RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let notifier = Arc::new(NotificationService::new(config.monitoring.enable_logging));
    let metrics = Arc::new(MetricsService::new(
        &config.monitoring,
        Arc::clone(&notifier),
    ));

    let client = TicketClient::new(&config.ticketing)?;
    let forwarder =
        IncidentForwarder::new(client, config.ticketing.defaults).with_metrics(Arc::clone(&metrics));
    let mut watcher = LogWatcher::new(&config.watcher, forwarder)
        .await
        .with_metrics(Arc::clone(&metrics));

    let cancel = CancellationToken::new();
    let sampler = tokio::spawn(run_sampler(
        Arc::clone(&metrics),
        config.monitoring.sample_interval(),
        cancel.clone(),
    ));
    let watcher_cancel = cancel.clone();
    let watcher_task = tokio::spawn(async move { watcher.run(watcher_cancel).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    cancel.cancel();

    let totals = watcher_task.await?;
    sampler.await?;

    tracing::info!(
        lines = totals.lines,
        parsed = totals.parsed,
        rejected = totals.rejected,
        forwarded = totals.forwarded,
        failed = totals.failed,
        truncations = totals.truncations,
        alerts = notifier.unresolved_count(),
        "Incident relay stopped"
    );
    Ok(())
}

fn check(file: Option<PathBuf>) -> Result<bool, std::io::Error> {
    let reader: Box<dyn BufRead> = match file {
        Some(path) => Box::new(std::io::BufReader::new(std::fs::File::open(path)?)),
        None => Box::new(std::io::stdin().lock()),
    };

    let (mut parsed, mut rejected) = (0, 0);
    for (idx, bytes) in reader.split(b'\n').enumerate() {
        let bytes = bytes?;
        let text = String::from_utf8_lossy(&bytes);
        let text: &str = &text;
        let line = text.strip_suffix('\r').unwrap_or(text);
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            ParseOutcome::Parsed(event) => {
                parsed += 1;
                display::print_parsed(idx + 1, &event);
            }
            ParseOutcome::Rejected(reason) => {
                rejected += 1;
                display::print_rejected(idx + 1, line, reason);
            }
        }
    }
    display::print_summary(parsed, rejected);
    Ok(rejected == 0)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Watch { log_file } => {
            let config = match loader(cli.config).load_validated_with(|config| {
                if let Some(path) = log_file {
                    config.watcher.log_file = path;
                }
            }) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };

            tracing::info!(
                log_file = %config.watcher.log_file.display(),
                base_url = %config.ticketing.base_url,
                poll_interval_ms = config.watcher.poll_interval_ms,
                "Starting incident relay"
            );
            if let Err(e) = watch(config).await {
                tracing::error!(error = %e, "Incident relay failed");
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Commands::Check { file } => match check(file) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
        Commands::Config => {
            let mut config = match loader(cli.config).load() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            config.apply_env_overrides();
            match toml::to_string_pretty(&config.redacted()) {
                Ok(text) => {
                    print!("{text}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
