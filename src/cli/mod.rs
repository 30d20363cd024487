use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{level_filters::LevelFilter, warn};

use crate::{
    config::{Settings, UpdaterOptions},
    server, updater,
    utils::{
        clock::SystemClock, dir::create_application_default_path, logging::enable_logging,
    },
};

#[derive(Parser, Debug)]
#[command(name = "Wakastatus", version, long_about = None)]
#[command(about = "Publishes your WakaTime coding activity as a GitHub profile status")]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Write logs to the application state directory")]
    log: bool,
    #[arg(long = "log-console", help = "Mirror file logs to stdout")]
    log_console: bool,
    #[arg(long = "log-filter", help = "Log level filter")]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the updater loop in the foreground")]
    Run {
        #[command(flatten)]
        options: UpdaterOptions,
    },
    #[command(about = "Run exactly one update cycle and exit")]
    Once {
        #[command(flatten)]
        options: UpdaterOptions,
    },
    #[command(about = "Serve an HTTP endpoint that runs one update cycle per request")]
    Serve {
        #[arg(long, default_value_t = 8080, help = "Port to listen on")]
        port: u16,
        #[command(flatten)]
        options: UpdaterOptions,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let log_dir = if args.log {
        Some(create_application_default_path()?.join("logs"))
    } else {
        None
    };
    enable_logging(
        log_dir.as_deref(),
        args.log_filter,
        args.log_console || log_dir.is_none(),
    )?;

    match args.commands {
        Commands::Run { options } => {
            let settings = Settings::load(&options)?;
            updater::start_updater(settings).await
        }
        Commands::Once { options } => {
            let settings = Settings::load(&options)?;
            let mut cycle = updater::build_cycle(&settings, Box::new(SystemClock));
            let report = cycle.run_once().await?;
            if let Some(error) = report.fetch_error {
                warn!("Published fallback status after fetch failure {error:?}");
            }
            println!("{} {}", report.status.emoji, report.status.text);
            Ok(())
        }
        Commands::Serve { port, options } => {
            let settings = Settings::load(&options)?;
            let cycle = updater::build_cycle(&settings, Box::new(SystemClock));
            server::serve(port, cycle).await
        }
    }
}
