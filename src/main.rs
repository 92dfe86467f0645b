use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wattchecker::{
    DeviceConfig, Exporter, MeasurementMode, SerialConfig, SerialTransport, SessionConfig,
    Settings, Transport, WattChecker, exporter,
};

type Device = Arc<WattChecker<SerialTransport>>;

/// Prometheus exporter for REX-BTWATTCH watt checkers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The address to listen on for HTTP requests.
    #[arg(long, default_value = ":4351")]
    listen_address: String,
    /// Settings file (defaults to setting.yml next to the executable).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Minimum time between two polls of the same device, in milliseconds.
    #[arg(long, default_value_t = 500)]
    poll_interval_ms: u64,
    /// Serial read/write timeout, in seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
    /// Start measuring in the accelerated test mode.
    #[arg(long)]
    accelerated: bool,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn setup_logging(verbosity: &Verbosity<InfoLevel>) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Accepts `:port` as shorthand for all interfaces.
fn parse_listen_address(addr: &str) -> Result<SocketAddr> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    full.parse()
        .with_context(|| format!("invalid listen address: {addr}"))
}

async fn open_device(
    config: &DeviceConfig,
    timeout: Duration,
    session: SessionConfig,
) -> Result<Device> {
    let mut transport =
        SerialTransport::new(SerialConfig::new(&config.device_path).timeout(timeout));
    transport
        .connect()
        .await
        .with_context(|| format!("failed to open {}", config.device_path))?;

    let device = WattChecker::new(&config.device_name, transport, session);
    if let Err(e) = device.initialize().await {
        if let Err(close_err) = device.close().await {
            warn!("failed to close {}: {}", config.device_path, close_err);
        }
        return Err(e).with_context(|| format!("failed to initialize {}", config.device_name));
    }

    Ok(Arc::new(device))
}

async fn close_all(devices: &[Device]) {
    for device in devices {
        if let Err(e) = device.close().await {
            warn!("failed to close {}: {}", device.name(), e);
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.verbose);

    let path = match cli.config {
        Some(path) => path,
        None => Settings::default_path()?,
    };
    let settings = Settings::load(&path)?;
    let addr = parse_listen_address(&cli.listen_address)?;

    let mode = if cli.accelerated {
        MeasurementMode::Accelerated
    } else {
        MeasurementMode::Normal
    };
    let session = SessionConfig::default()
        .poll_interval(Duration::from_millis(cli.poll_interval_ms))
        .mode(mode);
    let timeout = Duration::from_secs(cli.timeout_secs);

    let mut devices = Vec::with_capacity(settings.devices.len());
    for config in &settings.devices {
        match open_device(config, timeout, session).await {
            Ok(device) => devices.push(device),
            Err(e) => {
                close_all(&devices).await;
                return Err(e);
            }
        }
    }

    let exporter = Arc::new(Exporter::new(devices.clone())?);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("serving metrics on http://{}/metrics", addr);
    let served = axum::serve(listener, exporter::router(exporter))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    close_all(&devices).await;
    info!("server stopped");
    served.context("HTTP server failed")
}
