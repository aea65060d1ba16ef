//! Ubilink - demo device reporting to Ubidots over MQTT

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::{signal, time};
use tracing::{error, info, warn};
use ubilink_client::{
    EventKind, MqttEngine, NetTransport, Session, SessionConfig, SessionError,
};

mod common;
mod config;
use common::{init_logging, print_message};
use config::Config;

#[derive(Parser, Debug)]
#[command(name = "ubilink")]
#[command(about = "Demo device that publishes a value to Ubidots and prints variable updates")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Ubidots account token
    #[arg(short = 't', long, env = "UBIDOTS_TOKEN")]
    token: Option<String>,

    /// Device label
    #[arg(short = 'd', long, env = "UBIDOTS_DEVICE")]
    device: Option<String>,

    /// Broker hostname
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Connect over TLS
    #[arg(long)]
    tls: bool,

    /// Custom CA certificate file (PEM format)
    #[arg(long)]
    ca_path: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Variable the demo value is published to
    #[arg(long)]
    variable: Option<String>,

    /// Variable to subscribe to (can be specified multiple times)
    #[arg(short = 's', long)]
    subscribe: Vec<String>,

    /// Seconds between loop iterations
    #[arg(short = 'i', long, default_value = "2")]
    interval: u64,

    /// Silence the session's progress lines
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// The device loop: connect when needed, otherwise subscribe, publish and keep alive.
struct Device {
    session: Session<MqttEngine<NetTransport>>,
    ticker: time::Interval,
    variable: String,
    subscribe: Vec<String>,
    value: f32,
    resubscribe: Arc<AtomicBool>,
}

impl Device {
    async fn step(&mut self) {
        self.ticker.tick().await;

        if !self.session.is_connected() {
            // Failures are reported through the Error callback.
            if let Err(SessionError::SocketNotAvailable) = self.session.connect().await {
                self.session.reset().await;
            }

            if !self.session.is_connected() {
                return;
            }
        }

        if self.resubscribe.swap(false, Ordering::Relaxed) {
            for variable in &self.subscribe {
                if let Err(e) = self.session.subscribe(variable, print_message).await {
                    warn!("Failed to subscribe to {}: {}", variable, e);
                }
            }
        }

        self.value += 2.0;
        match self.session.publish(&self.variable, self.value).await {
            Ok(()) | Err(SessionError::PublishError) => {}
            Err(e) => warn!("Failed to publish {}: {}", self.variable, e),
        }

        if let Err(e) = self.session.keep_alive().await {
            warn!("Keep-alive failed: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) if path.exists() => Config::from_file(path)?,
        Some(path) => {
            eprintln!("Config file not found: {}", path.display());
            std::process::exit(1);
        }
        None => Config::default(),
    };

    init_logging(args.verbose, &config.logging.level);

    // CLI flags override the config file
    let token = args
        .token
        .or(config.device.token)
        .ok_or("no device token given (--token or [device] token)")?;
    let device = args
        .device
        .or(config.device.id)
        .ok_or("no device label given (--device or [device] id)")?;
    let host = args.host.unwrap_or(config.broker.host);
    let encrypted = args.tls || config.broker.tls;
    let subscribe = if args.subscribe.is_empty() {
        config.device.subscribe
    } else {
        args.subscribe
    };

    let mut session_config = SessionConfig::new(token, device)
        .host(host)
        .encrypted(encrypted)
        .logging(config.logging.session && !args.quiet)
        .danger_skip_tls_verify(args.insecure || config.broker.insecure);

    if let Some(ca_path) = args.ca_path.or(config.broker.ca_path) {
        session_config = session_config.ca_path(ca_path);
    }

    let mut session = Session::new(session_config)?;

    info!(
        "Reporting to {}:{} as {}",
        session.config().broker_host(),
        session.config().port(),
        session.device_name()
    );

    let resubscribe = Arc::new(AtomicBool::new(false));
    let flag = resubscribe.clone();
    session.register_callback(EventKind::Connected, move |_| {
        flag.store(true, Ordering::Relaxed);
    });
    session.register_callback(EventKind::Disconnected, |_| {
        warn!("Disconnected from broker");
    });
    session.register_callback(EventKind::Error, |status| {
        if let Some(e) = status {
            error!("Session error: {}", e);
        }
    });

    let mut device = Device {
        session,
        ticker: time::interval(Duration::from_secs(args.interval.max(1))),
        variable: args.variable.unwrap_or(config.device.variable),
        subscribe,
        value: 0.0,
        resubscribe,
    };

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    // Handle Ctrl+C for graceful shutdown
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                eprintln!("\nDisconnecting...");
                break;
            }
            _ = device.step() => {}
        }
    }

    device.session.reset().await;

    Ok(())
}
