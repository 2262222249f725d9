use clap::CommandFactory;
use clap::FromArgMatches;
use clap::Parser;
use gnmi_target::config::TargetConfig;
use gnmi_target::model::openconfig_model;
use gnmi_target::{spawn_datetime_heartbeat, start_rpc_server, ConfigStore, TargetService};
use gnmi_target::{Error, Result};
use log::error;
use log::info;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// gNMI target simulating a device with OpenConfig models.
#[derive(Parser, Debug)]
#[command(name = "gnmi-target", version)]
struct Cli {
    /// Bind to address:port or just :port
    #[arg(long)]
    bind_address: Option<String>,

    /// IETF JSON file for target startup config
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = parse_cli();

    let mut settings = TargetConfig::new()?;
    if let Some(bind_address) = cli.bind_address {
        settings.server.bind_address = bind_address;
    }
    if cli.config.is_some() {
        settings.server.startup_config = cli.config;
    }
    settings.validate()?;

    // Initializing Logs
    let _guard = init_observability();

    let model = Arc::new(openconfig_model());
    let startup_config = match &settings.server.startup_config {
        Some(path) => Some(std::fs::read(path).map_err(|e| {
            error!("error in reading config file {}: {e}", path.display());
            e
        })?),
        None => None,
    };
    let store = Arc::new(ConfigStore::new(
        model,
        startup_config.as_deref(),
        None,
        settings.limits.config_event_ring_capacity,
    )?);

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("failed to shutdown: {e:?}");
        }
    });

    spawn_datetime_heartbeat(
        store.clone(),
        graceful_rx.clone(),
        Duration::from_secs(settings.telemetry.datetime_interval_secs),
    );

    let service = TargetService::new(store, &settings);
    let listen_address = settings.server.listen_address()?;
    info!("starting gNMI agent to serve on {listen_address}");
    start_rpc_server(service, listen_address, graceful_rx).await?;

    println!("Exiting program.");
    Ok(())
}

/// Parses the CLI, listing the supported models in the long help like the
/// flag usage of a hardware target would.
fn parse_cli() -> Cli {
    let mut help = String::from("Supported models:\n");
    for model in gnmi_target::model::openconfig_model().model_data() {
        let _ = writeln!(
            help,
            "  {} {} ({})",
            model.name, model.version, model.organization
        );
    }
    let matches = Cli::command().after_help(help).get_matches();
    match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    }
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("failed to send shutdown signal: {e}");
        Error::SignalSenderClosed(format!("failed to send shutdown signal: {e}"))
    })?;

    info!("shutdown completed");
    Ok(())
}

fn init_observability() -> WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();
    guard
}
