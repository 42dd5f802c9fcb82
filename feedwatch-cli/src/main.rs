mod cli;
mod commands;
mod config;
mod error;
mod output;

use crate::{
    cli::{Args, Commands, OutputFormat},
    commands::{CommandExecutor, WatchOptions},
    config::AppConfig,
    error::{AppError, Result},
};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use notification_client::NotificationFilters;
use std::process;
use tracing::{Level, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let json_output = matches!(
        &args.command,
        Commands::List {
            output: OutputFormat::Json,
            ..
        } | Commands::Stats {
            output: OutputFormat::Json
        }
    );

    if let Err(e) = run(args).await {
        if json_output {
            let error_json = serde_json::json!({
                "status": "error",
                "message": e.to_string(),
            });
            println!("{error_json}");
        } else {
            error!("Application error: {}", e);
            #[cfg(feature = "colored-output")]
            {
                eprintln!("{} {}", "Error:".red().bold(), e);
            }
            #[cfg(not(feature = "colored-output"))]
            {
                eprintln!("Error: {}", e);
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet, args.log_json)?;

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_args(&args);
    info!(base_url = %config.base_url, "using notification backend");

    let executor = CommandExecutor::new(config, cfg!(feature = "colored-output"));

    match args.command {
        Commands::Watch {
            no_polling,
            polling_only,
            polling_interval,
            max_reconnect_attempts,
        } => {
            executor
                .watch(WatchOptions {
                    no_polling,
                    polling_only,
                    polling_interval,
                    max_reconnect_attempts,
                })
                .await?;
        }

        Commands::List {
            kind,
            unread_only,
            page,
            limit,
            grouped,
            output,
        } => {
            let filters = NotificationFilters {
                page,
                limit,
                kind,
                unread_only: unread_only.then_some(true),
                ..NotificationFilters::default()
            };
            executor.list(filters, grouped, output).await?;
        }

        Commands::Stats { output } => executor.stats(output).await?,

        Commands::Read { id } => executor.mark_as_read(&id).await?,

        Commands::ReadAll => executor.mark_all_as_read().await?,

        Commands::Delete { id } => executor.delete(&id).await?,

        Commands::Create {
            title,
            message,
            kind,
            user_id,
            metadata,
        } => {
            executor
                .create(title, message, kind, user_id, metadata.as_deref())
                .await?;
        }

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Args::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }

        Commands::Config { show, reset } => {
            if reset {
                let path = AppConfig::reset(args.config.as_deref())?;
                println!("✓ Configuration reset to defaults ({})", path.display());
            } else if show {
                let config = AppConfig::load(args.config.as_deref())?;
                println!("{}", config.show()?);
            } else {
                println!(
                    "Use --show to display current configuration or --reset to reset to defaults"
                );
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool, json: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = if json {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(verbose)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.map_err(|e| AppError::Logging(e.to_string()))
}
