//! claude-meter CLI binary entry point.

use clap::Parser;
use claude_meter::cli::{self, AuthCommands, Cli, Commands, ConfigCommands};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {e}");
        if let Some(hint) = cli::hint(&e) {
            eprintln!("{hint}");
        }
        std::process::exit(cli::exit_code(&e));
    }
}

async fn run(command: Commands) -> claude_meter::error::Result<()> {
    let (config, settings) = cli::load_config()?;

    match command {
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Login => cli::auth::handle_login(&config, settings).await,
            AuthCommands::Status => cli::auth::handle_status(&config, &settings).await,
            AuthCommands::Logout => cli::auth::handle_logout(&config, settings).await,
        },
        Commands::Usage(args) => cli::usage::handle_usage(&config, &settings, args.json).await,
        Commands::Watch => {
            let shutdown = CancellationToken::new();
            let on_ctrl_c = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });
            cli::usage::handle_watch(&config, &settings, shutdown).await
        }
        Commands::Config(config_args) => match config_args.command {
            ConfigCommands::Interval { secs } => {
                cli::usage::handle_interval(&config, settings, secs)
            }
        },
    }
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("claude_meter=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("claude_meter=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
