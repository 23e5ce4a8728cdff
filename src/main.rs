//! spaces-dl - CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use spaces_dl::{
    cli::Args,
    config::{parse_space_id, validate_config, Config},
    error::{exit_codes, Result},
    output::{
        print_banner, print_error, print_info, print_success, print_task_summary,
        print_warning, render_events,
    },
    task::Task,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    // Print banner
    print_banner();

    // Load configuration
    let mut config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => {
            tracing::debug!("Loading configuration from {}", path.display());
            Config::load(&path)?
        }
        None => {
            print_warning("No configuration file found");
            print_info("Using default configuration with CLI arguments");
            Config::default()
        }
    };

    let space_id = parse_space_id(&args.id)?;
    let keep_workdir = args.keep_workdir;

    // Merge CLI arguments into config
    args.merge_into_config(&mut config);

    // Validate configuration
    validate_config(&config)?;

    let output_dir = config.output_directory();
    let login = if config.options.browser_login {
        "browser"
    } else if config.options.disable_browser_login {
        "API flow only"
    } else {
        "API flow, browser fallback"
    };
    print_task_summary(&space_id, login, &output_dir.display().to_string());

    let mut task = Task::new(
        &space_id,
        config.credentials(),
        &output_dir,
        config.task_options(),
    )?;
    let work_dir = task.paths().work_dir.clone();
    let renderer = tokio::spawn(render_events(task.subscribe()));

    let cancel = task.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            print_warning("Interrupted; stopping before the next phase (press Ctrl+C again to quit now)");
            cancel.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(exit_codes::ABORT);
        }
    });

    let result = if keep_workdir {
        task.process().await
    } else {
        task.run().await
    };

    // Dropping the task closes the event channel.
    drop(task);
    let _ = renderer.await;

    match result {
        Ok(path) => {
            print_success(&format!("Saved {}", path.display()));
            if keep_workdir {
                print_info(&format!("Working directory kept at {}", work_dir.display()));
            }
            Ok(())
        }
        Err(e) => {
            if work_dir.exists() {
                print_info(&format!(
                    "Partial download kept in {}; run again to resume",
                    work_dir.display()
                ));
            }
            Err(e)
        }
    }
}
