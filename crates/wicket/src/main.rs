//! Wicket - Entry point
//!
//! Serves the demo routes until SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use wicket::demo::DemoService;
use wicket::server::{register, DrainReason};
use wicket::settings;

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = std::env::var_os(settings::CONFIG_PATH_ENV).map(PathBuf::from);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("wicket {}", wicket::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Wicket - HTTP serving shell

USAGE:
    wicket [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    WICKET_CONFIG                         Configuration file path (default: wicket.toml)
    WICKET__SERVER__HTTP_ADDR             Listen address (default: 0.0.0.0:8082)
    WICKET__SERVER__SHUTDOWN_TIMEOUT_SECS Drain deadline in seconds (default: 30)
    WICKET__LOGGING__LEVEL                Log filter (default: info)
    WICKET__METRICS__ENABLED              Prometheus exporter (default: false)

EXAMPLES:
    # Run with configuration file
    wicket --config /etc/wicket/wicket.toml

    # Run on another port
    WICKET__SERVER__HTTP_ADDR=127.0.0.1:9000 wicket
"
    );
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logging is not up yet
    let config = match settings::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = wicket::telemetry::init_telemetry(
        &settings::log_config(&config.logging),
        &settings::metrics_config(&config.metrics),
    ) {
        eprintln!("Failed to initialize telemetry: {e}");
        std::process::exit(1);
    }

    info!(
        version = wicket::VERSION,
        addr = %config.server.http_addr,
        "Starting wicket"
    );

    let service = Arc::new(DemoService::new());
    match register(service, settings::server_config(&config.server)).await {
        Ok(report) if report.reason == DrainReason::TransportFailure => {
            warn!(
                elapsed_ms = report.elapsed.as_millis(),
                "Listener failed, drained and exiting"
            );
            std::process::exit(1);
        }
        Ok(report) => {
            info!(
                elapsed_ms = report.elapsed.as_millis(),
                "Shutdown complete"
            );
        }
        Err(e) => {
            error!("Server failed to start: {}", e);
            std::process::exit(1);
        }
    }
}
