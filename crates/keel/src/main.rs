mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use core_logging::{LogFormat, LoggingPlugin};
use heartbeat_example::HeartbeatPlugin;
use keel_core::kernel::constants;
use keel_core::{BootstrapSession, CancellationToken, SessionConfig};
use log::{error, info, warn};

/// Keel: dependency-ordered bootstrap for plugin components
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Simple ping command for testing
    #[arg(long)]
    ping: bool,

    /// Session configuration file (.json, .yaml, .yml or .toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Log filter, overrides the configured level and RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print startup and shutdown groups without starting anything
    Plan,
    /// List registered components and their metadata
    List,
    /// Start the session, keep it running, then stop it
    Run {
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    let config = match &args.config {
        Some(path) => match SessionConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => SessionConfig::default(),
    };

    let filter = args.log_level.clone().or_else(|| config.log_level.clone());
    let format = if args.json_logs { LogFormat::Json } else { LogFormat::Text };
    if let Err(e) = core_logging::install(filter.as_deref(), format) {
        eprintln!("Failed to set up logging: {}", e);
    }
    info!("{} v{}", constants::APP_NAME, constants::APP_VERSION);

    let mut session = match build_session(config, filter) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to create session: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = match args.command {
        Some(Commands::Plan) => show(&mut session, true).await,
        Some(Commands::List) => show(&mut session, false).await,
        Some(Commands::Run { duration_secs }) => {
            run(&mut session, duration_secs.map(Duration::from_secs)).await
        }
        None => run(&mut session, Some(Duration::from_secs(1))).await,
    };

    if let Err(e) = session.dispose().await {
        error!("Shutdown finished with errors: {}", e);
        eprintln!("Shutdown finished with errors: {}", e);
        return ExitCode::FAILURE;
    }
    code
}

fn build_session(config: SessionConfig, filter: Option<String>) -> keel_core::KernelResult<BootstrapSession> {
    let mut session = BootstrapSession::new(config)?;
    session.add_plugin(Box::new(LoggingPlugin::new(filter)))?;
    session.add_plugin(Box::new(HeartbeatPlugin::default()))?;
    Ok(session)
}

async fn show(session: &mut BootstrapSession, plan: bool) -> ExitCode {
    if let Err(e) = session.initialize() {
        eprintln!("Initialization failed: {}", e);
        return ExitCode::FAILURE;
    }
    if !plan {
        match session.registry() {
            Ok(registry) => cli::print_components(&registry),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    match (session.startup_plan(), session.shutdown_plan()) {
        (Ok(startup), Ok(shutdown)) => {
            cli::print_plan("Startup", &startup);
            cli::print_plan("Shutdown", &shutdown);
            ExitCode::SUCCESS
        }
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Invalid component graph: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(session: &mut BootstrapSession, duration: Option<Duration>) -> ExitCode {
    let cancel = CancellationToken::new();
    println!("Starting session...");

    let startup = tokio::select! {
        result = session.run(&cancel) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted during startup");
            cancel.cancel();
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = startup {
        eprintln!("Startup failed: {}", e);
        for failure in e.component_failures() {
            eprintln!("  - {}", failure);
        }
        return ExitCode::FAILURE;
    }
    if let Some(report) = session.last_startup_report() {
        println!("Session running: {}", report);
    }

    match duration {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => info!("Run duration elapsed"),
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
            }
        }
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Could not listen for Ctrl-C: {}", e);
            }
        }
    }

    println!("Shutting down session...");
    for name in session.background_failures() {
        warn!("Background start of '{}' failed", name);
    }
    ExitCode::SUCCESS
}
