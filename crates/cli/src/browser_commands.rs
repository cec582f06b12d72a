//! CLI subcommands for browser detection and launch settings.

use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use webpilot_browser::{BrowserConfig, detect_browser};

#[derive(Subcommand)]
pub enum BrowserAction {
    /// Show the launch settings and which browser would be used.
    Status,
}

pub fn handle_browser(action: BrowserAction, config_path: Option<&Path>) -> Result<()> {
    match action {
        BrowserAction::Status => status(config_path),
    }
}

fn status(config_path: Option<&Path>) -> Result<()> {
    let config = webpilot_config::load_or_discover(config_path)?;
    let browser = BrowserConfig::from(&config.browser);

    println!("Browser configuration:");
    println!("  headless:       {}", browser.headless);
    println!(
        "  viewport:       {}x{}",
        browser.viewport_width, browser.viewport_height
    );
    println!("  nav timeout:    {}ms", browser.navigation_timeout_ms);
    match browser.user_agent {
        Some(ref ua) => println!("  user_agent:     {ua}"),
        None => println!("  user_agent:     (browser default)"),
    }
    if let Some(ref path) = browser.chrome_path {
        println!("  chrome_path:    {path}");
    } else {
        println!("  chrome_path:    (auto-detect)");
    }
    println!("  launch args:    {}", browser.launch_args().join(" "));

    let detection = detect_browser(browser.chrome_path.as_deref());
    match (&detection.path, detection.source) {
        (Some(path), Some(source)) => {
            println!("\nDetected browser: {} ({source:?})", path.display());
        },
        _ => {
            println!("\n{}", detection.install_hint);
        },
    }

    Ok(())
}
