//! `webpilot run`: one prompt, one browser session, one result.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::{Context, Result, anyhow, bail},
    clap::Args,
    serde::Serialize,
    tracing::{debug, error, info, warn},
    webpilot_browser::{BrowserConfig, CdpLauncher},
    webpilot_config::{Severity, WebpilotConfig},
    webpilot_engine::{
        EngineSettings, EnvCredentials, Orchestrator, ProductProfile, PromptTask, TaskResult,
    },
};

#[derive(Args)]
pub struct RunArgs {
    /// Prompt text.
    #[arg(long, conflicts_with = "prompt_file", required_unless_present = "prompt_file")]
    prompt: Option<String>,
    /// Read the prompt from a file.
    #[arg(long)]
    prompt_file: Option<PathBuf>,
    /// Repository the assistant works on (e.g. https://github.com/owner/repo).
    #[arg(long, env = "WEBPILOT_REPO")]
    repo: String,
    /// Upstream repository, when `--repo` is a fork.
    #[arg(long)]
    original_repo: Option<String>,
    /// Product profile (overrides the config value).
    #[arg(long)]
    product: Option<String>,
    /// Write the result as JSON to this file.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Run the browser headless (overrides the config value).
    #[arg(long)]
    headless: bool,
}

/// JSON document written by `--output`.
#[derive(Serialize)]
struct ResultsFile<'a> {
    generated_at: String,
    product: &'a str,
    prompt: &'a str,
    #[serde(flatten)]
    result: &'a TaskResult,
}

/// Returns whether the task succeeded.
pub async fn handle_run(args: RunArgs, config_path: Option<&Path>) -> Result<bool> {
    let mut config = webpilot_config::load_or_discover(config_path)?;
    if let Some(ref product) = args.product {
        config.product = product.clone();
    }
    if args.headless {
        config.browser.headless = true;
    }
    check_config(&config)?;

    let product = config
        .selected_product()
        .ok_or_else(|| anyhow!("unknown product '{}'", config.product))?;
    let profile = ProductProfile::try_from(&product)?;
    let task = build_task(&args)?;

    let mut orchestrator = Orchestrator::new(
        Arc::new(CdpLauncher::new(BrowserConfig::from(&config.browser))),
        profile,
        EngineSettings::from(&config.automation),
        Arc::new(EnvCredentials::from(&config.credentials)),
    );

    info!(product = config.product, repository = task.repository_url, "running task");
    let outcome = tokio::select! {
        result = orchestrator.run(&task) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(result) = outcome else {
        warn!("interrupted, closing the browser");
        if let Err(e) = orchestrator.close().await {
            warn!(error = %e, "closing the browser failed");
        }
        bail!("interrupted");
    };

    println!("{}", result.render());
    if let Some(ref path) = args.output {
        write_results(path, &config.product, &task, &result)?;
        info!(path = %path.display(), "results written");
    }
    Ok(result.success)
}

/// Log every diagnostic; errors abort the run.
fn check_config(config: &WebpilotConfig) -> Result<()> {
    let validation = webpilot_config::validate(config);
    for d in &validation.diagnostics {
        match d.severity {
            Severity::Error => error!(path = d.path, "{}", d.message),
            Severity::Warning => warn!(path = d.path, "{}", d.message),
            Severity::Info => debug!(path = d.path, "{}", d.message),
        }
    }
    if validation.has_errors() {
        bail!(
            "configuration has {} error(s); run `webpilot config check` for details",
            validation.count(Severity::Error)
        );
    }
    Ok(())
}

fn build_task(args: &RunArgs) -> Result<PromptTask> {
    let prompt = match (&args.prompt, &args.prompt_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file {}", path.display()))?,
        (None, None) => bail!("either --prompt or --prompt-file is required"),
    };
    let prompt = prompt.trim();
    if prompt.is_empty() {
        bail!("the prompt is empty");
    }

    let mut task = PromptTask::new(prompt, args.repo.trim());
    if let Some(ref original) = args.original_repo {
        task = task.with_original(original.trim());
    }
    Ok(task)
}

/// Creates parent directories as needed.
fn write_results(path: &Path, product: &str, task: &PromptTask, result: &TaskResult) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let doc = ResultsFile {
        generated_at: chrono::Utc::now().to_rfc3339(),
        product,
        prompt: &task.prompt,
        result,
    };
    let json = serde_json::to_string_pretty(&doc)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
