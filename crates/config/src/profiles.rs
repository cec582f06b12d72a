//! Built-in product profiles.
//!
//! Selectors are CSS, optionally followed by one trailing text filter:
//! `:has-text('...')` keeps elements whose rendered text contains the quoted
//! string, `:text-is('...')` keeps elements that (or one of whose
//! descendants) render exactly that text.

use crate::schema::{
    AuthConfig, CompletionConfig, ProductConfig, ProviderConfig, TaskConfig, WorkspaceConfig,
};

pub const OPENAI_CODEX: &str = "openai-codex";

/// Names of every built-in profile.
pub const BUILTIN_NAMES: &[&str] = &[OPENAI_CODEX];

/// Look up a built-in profile by name.
pub fn builtin(name: &str) -> Option<ProductConfig> {
    match name {
        OPENAI_CODEX => Some(openai_codex()),
        _ => None,
    }
}

fn list(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| (*s).to_string()).collect()
}

/// One single-selector strategy per entry.
fn strategies(selectors: &[&str]) -> Vec<Vec<String>> {
    selectors.iter().map(|s| vec![(*s).to_string()]).collect()
}

/// Google accounts login pages.
pub fn google_provider() -> ProviderConfig {
    ProviderConfig {
        origin: "accounts.google.com".into(),
        email_inputs: strategies(&[
            "input[type='email']",
            "#identifierId",
            "input[name='email']",
            "input[autocomplete='username']",
        ]),
        email_next: strategies(&[
            "#identifierNext",
            "button:has-text('Next')",
            "input[type='submit']",
            "button[type='submit']",
        ]),
        password_inputs: strategies(&[
            "input[type='password']",
            "input[name='password']",
            "#password",
            "input[autocomplete='current-password']",
        ]),
        password_next: strategies(&[
            "#passwordNext",
            "button:has-text('Next')",
            "input[type='submit']",
            "button[type='submit']",
        ]),
    }
}

/// OpenAI Codex (chatgpt.com/codex) reached through "Continue with Google".
pub fn openai_codex() -> ProductConfig {
    ProductConfig {
        landing_url: "https://chatgpt.com/auth/login?next=/codex/settings/environments".into(),
        auth: AuthConfig {
            authenticated_url: "chatgpt.com/codex/settings/environment".into(),
            login_url: "auth/login".into(),
            login_page_texts: list(&["Get started", "Log in", "Sign up"]),
            login_button: list(&["button[data-testid='login-button']"]),
            identity_origin: "auth.openai.com".into(),
            continue_button: list(&["button:has-text('Continue with Google')"]),
            provider: google_provider(),
        },
        workspace: WorkspaceConfig {
            create_url: "settings/environment/create".into(),
            existing_row: list(&[r"tr.group\/row:text-is('{name}')"]),
            use_this: list(&["button:has-text('Use this')"]),
            create_button: list(&["button.btn-primary"]),
            candidate_list: list(&[".flex.max-h-56.flex-col.overflow-y-auto"]),
            candidate: list(&[
                "button:has(p.text-token-text-primary):text-is('{repo}')",
                "button p.text-token-text-primary:text-is('{repo}')",
            ]),
            confirm_create: list(&[
                "div.flex.items-center.justify-center:has-text('Create environment')",
                "button:has-text('Create environment')",
            ]),
            existing_wait_ms: 10_000,
            population_wait_ms: 10_000,
            selection_settle_ms: 2_000,
        },
        task: TaskConfig {
            prompt_input: list(&["#prompt-textarea"]),
            submit_button: list(&["button:has-text('Code')"]),
            loading: list(&[".animate-pulse", ".loading", "[role='progressbar']"]),
            task_link: list(&[".task-row-container a"]),
            focus_after_open: list(&["#prompt-textarea"]),
            output: list(&[
                "div.markdown.prose",
                "div[class*='markdown'][class*='prose']",
            ]),
            output_fallback: list(&["div[class*='markdown']", "div[class*='prose']"]),
            create_pr_button: list(&["div.btn-primary button:has-text('Create PR')"]),
            pr_link: list(&["a:has-text('View PR')"]),
            pr_host: "github.com".into(),
            task_link_wait_ms: 15_000,
            pr_button_wait_ms: 10_000,
            pr_link_wait_ms: 30_000,
        },
        completion: CompletionConfig::Indicator {
            selectors: list(&[
                "button[aria-label='stop-button']",
                "button[data-testid='stop-button']",
            ]),
            appear_timeout_ms: 30_000,
        },
    }
}
