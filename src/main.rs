//! herakles-live-monitor - version 0.1.0
//!
//! Live system telemetry server with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod startup_checks;
mod state;

use axum::{
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use herakles_live_monitor::Monitor;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_config, command_signal, command_snapshot};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{
    config_handler, control_handler, health_handler, history_handler, history_index_handler,
    processes_handler, root_handler, snapshot_handler, topology_handler,
};
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };
    let Some(log_level) = log_level else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Builds the HTTP router.
fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/config", get(config_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/topology", get(topology_handler))
        .route("/api/processes", get(processes_handler))
        .route("/api/processes/{pid}/{action}", post(control_handler))
        .route("/api/history", get(history_index_handler))
        .route("/api/history/{stream}", get(history_handler))
        .with_state(state)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.show_user_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone(), args.show_user_config);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        setup_logging(&args);
        let config = load_validated_config(&args)?;
        let monitor_config = config.monitor_config();

        return match command {
            Commands::Snapshot {
                cycles,
                format,
                history,
                top,
            } => Ok(command_snapshot(&config, *cycles, *format, *history, *top).await?),

            Commands::Signal {
                pid,
                action,
                start_time,
            } => Ok(command_signal(&config, *pid, *action, *start_time)?),

            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),

            Commands::CheckRequirements => {
                println!("🔍 Checking Runtime Requirements");
                println!("================================\n");

                match startup_checks::validate_requirements(
                    &monitor_config.proc_root,
                    &monitor_config.sys_root,
                ) {
                    Ok(_) => {
                        println!("\n✅ All requirements met");
                        Ok(())
                    }
                    Err(e) => {
                        eprintln!("\n❌ Requirements check failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;
    setup_logging(&args);

    info!("Starting herakles-live-monitor");

    let monitor_config = config.monitor_config();
    if let Err(e) =
        startup_checks::validate_requirements(&monitor_config.proc_root, &monitor_config.sys_root)
    {
        error!("❌ Startup validation failed: {}", e);
        error!("   The monitor will start but CPU and memory metrics will be missing!");
    }

    let monitor = Monitor::new(monitor_config);
    monitor.start().await;

    let topology = monitor.topology();
    info!(
        "Detected {} logical cores ({} performance, {} efficiency) on {}",
        topology.logical_cores,
        topology.performance_cores,
        topology.efficiency_cores,
        topology.architecture
    );

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    if config.enable_control.unwrap_or(false) {
        if !addr.ip().is_loopback() {
            warn!(
                "Process control enabled on non-loopback address {} - any client that can reach it may signal processes",
                addr.ip()
            );
        }
    } else {
        info!("Process control disabled - POST /api/processes/... will be rejected");
    }

    let state: SharedState = Arc::new(AppState::new(monitor.clone(), Arc::new(config.clone())));
    let app = build_router(state);

    let served: Result<(), Box<dyn std::error::Error>> = match (
        config.enable_tls.unwrap_or(false),
        config.tls_cert_path.as_deref(),
        config.tls_key_path.as_deref(),
    ) {
        (true, Some(cert_path), Some(key_path)) => {
            info!("Loading TLS certificate from: {}", cert_path);
            info!("Loading TLS private key from: {}", key_path);

            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .map_err(|e| {
                    error!("Failed to load TLS configuration: {}", e);
                    e
                })?;

            info!(
                "herakles-live-monitor listening on https://{}:{}",
                bind_ip_str, port
            );

            let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());
            tokio::select! {
                result = server => result.map_err(|e| e.into()),
                _ = shutdown_signal() => Ok(()),
            }
        }
        _ => {
            let listener = TcpListener::bind(addr).await?;
            info!(
                "herakles-live-monitor listening on http://{}:{}",
                bind_ip_str, port
            );

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(|e| e.into())
        }
    };

    monitor.stop().await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e);
    }

    info!("herakles-live-monitor stopped gracefully");
    Ok(())
}
