mod browser_commands;
mod config_commands;
mod run_command;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "webpilot",
    version,
    about = "Webpilot — run prompts on browser-hosted coding assistants"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of the discovered one.
    #[arg(long, global = true, env = "WEBPILOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a prompt and wait for the assistant to finish.
    Run(run_command::RunArgs),
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// List the available product profiles.
    Profiles,
    /// Browser detection and launch settings.
    Browser {
        #[command(subcommand)]
        action: browser_commands::BrowserAction,
    },
}

/// Logs go to stderr so stdout carries only command output.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "webpilot starting");

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => {
            let succeeded = run_command::handle_run(args, config_path).await?;
            if !succeeded {
                std::process::exit(1);
            }
            Ok(())
        },
        Commands::Config { action } => config_commands::handle_config(action, config_path),
        Commands::Profiles => handle_profiles(config_path),
        Commands::Browser { action } => browser_commands::handle_browser(action, config_path),
    }
}

fn handle_profiles(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = webpilot_config::load_or_discover(config_path)?;
    for name in config.product_names() {
        let marker = if name == config.product { "*" } else { " " };
        let origin = if config.products.contains_key(&name) {
            "config"
        } else {
            "built-in"
        };
        match config.product_profile(&name) {
            Some(product) => println!("{marker} {name} [{origin}] {}", product.landing_url),
            None => println!("{marker} {name} [{origin}]"),
        }
    }
    if !config.product_names().contains(&config.product) {
        eprintln!("selected product '{}' is not defined", config.product);
    }
    Ok(())
}
