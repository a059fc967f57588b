//! Application startup
//!
//! Parses the command line, loads the configuration file, starts logging
//! and dispatches the subcommand. Returns the process exit code.

use crate::app::cli::args::{Args, Command, SimulateArgs};
use crate::app::cli::config::Settings;
use crate::app::simulate::{run_simulation, Scenario};
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::version::version_banner;
use clap::Parser;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_INTERRUPTED: i32 = 130;

pub async fn startup() -> i32 {
    let args = Args::parse();
    run(args).await
}

/// Run with already parsed arguments
pub async fn run(args: Args) -> i32 {
    // Logging is not up yet, so configuration errors go straight to stderr
    let mut settings = match Settings::load(args.config_file.as_deref()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG;
        }
    };
    settings.apply_args(&args);

    let log_file = settings
        .logging
        .file
        .as_ref()
        .map(|path| path.to_string_lossy().to_string());
    if let Err(e) = init_logging(
        settings.logging.level.as_deref(),
        settings.logging.format.as_deref(),
        log_file.as_deref(),
        args.use_color(),
    ) {
        eprintln!("Error: failed to initialise logging: {}", e);
        return EXIT_CONFIG;
    }

    log::debug!("{} starting", version_banner());

    match &args.command {
        Command::Version => {
            println!("{}", version_banner());
            EXIT_OK
        }
        Command::Simulate(simulate_args) => simulate(settings, simulate_args).await,
    }
}

async fn simulate(mut settings: Settings, args: &SimulateArgs) -> i32 {
    if let Err(e) = settings.apply_simulate_args(args) {
        log_error_with_context(&e, "Validating coordinator settings");
        return EXIT_CONFIG;
    }

    let scenario = match Scenario::load(&args.scenario).await {
        Ok(scenario) => scenario,
        Err(e) => {
            log_error_with_context(&e, "Loading scenario");
            return EXIT_CONFIG;
        }
    };

    let result = ShutdownCoordinator::guard(|coordinator, shutdown_rx| async move {
        let report = run_simulation(&settings, &scenario, shutdown_rx).await;
        if coordinator.is_shutdown_requested() {
            log::info!("Simulation stopped by signal");
        }
        report
    })
    .await;

    match result {
        Ok(report) => {
            print!("{}", report);
            if report.interrupted {
                EXIT_INTERRUPTED
            } else {
                EXIT_OK
            }
        }
        Err(e) => {
            log_error_with_context(&e, "Replaying scenario");
            EXIT_FAILURE
        }
    }
}
