use std::path::{Path, PathBuf};

use {
    anyhow::{Result, bail},
    clap::Subcommand,
};

use webpilot_config::{
    WebpilotConfig,
    validate::{self, Severity},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the path of the configuration file in use.
    Path,
    /// Write a configuration file with every default spelled out.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

pub fn handle_config(action: ConfigAction, explicit: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => show(explicit),
        ConfigAction::Check { verbose } => check(explicit, verbose),
        ConfigAction::Path => {
            let (path, exists) = config_path(explicit);
            if exists {
                println!("{}", path.display());
            } else {
                println!("{} (not created yet)", path.display());
            }
            Ok(())
        },
        ConfigAction::Init { force } => init(explicit, force),
    }
}

/// The explicit path, else the discovered file, else where `init` would
/// write one.
fn config_path(explicit: Option<&Path>) -> (PathBuf, bool) {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(webpilot_config::find_or_default_config_path);
    let exists = path.exists();
    (path, exists)
}

fn show(explicit: Option<&Path>) -> Result<()> {
    let config = webpilot_config::load_or_discover(explicit)?;
    print!("{}", render(&config)?);
    Ok(())
}

fn render(config: &WebpilotConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

fn init(explicit: Option<&Path>, force: bool) -> Result<()> {
    let (path, exists) = config_path(explicit);
    if exists && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    webpilot_config::save_config(&WebpilotConfig::default(), &path)?;
    println!("Config written to {}", path.display());
    Ok(())
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(explicit: Option<&Path>, verbose: bool) -> Result<()> {
    let (path, exists) = config_path(explicit);
    let config = if exists {
        eprintln!("Checking {}\n", path.display());
        webpilot_config::load_config(&path)?
    } else {
        eprintln!("No config file found; checking defaults.\n");
        WebpilotConfig::default()
    };
    let result = validate::validate(&config);

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}
