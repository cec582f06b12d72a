//! Locating a Chromium-based browser to drive.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Executable names searched in `PATH`, most preferred first.
const PATH_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
    "microsoft-edge-stable",
    "msedge",
    "brave-browser",
    "brave",
];

#[cfg(target_os = "macos")]
const PLATFORM_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

#[cfg(target_os = "windows")]
const PLATFORM_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PLATFORM_PATHS: &[&str] = &[];

/// Where a detected browser came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// `browser.chrome_path` in the config file.
    Configured,
    /// The `CHROME` environment variable.
    Environment,
    /// A well-known install location for this platform.
    Platform,
    /// An executable found in `PATH`.
    SearchPath,
}

/// Outcome of [`detect_browser`].
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub path: Option<PathBuf>,
    pub source: Option<DetectionSource>,
    /// Install guidance, empty when a browser was found.
    pub install_hint: String,
}

impl Detection {
    pub fn found(&self) -> bool {
        self.path.is_some()
    }

    fn hit(path: PathBuf, source: DetectionSource) -> Self {
        Self {
            path: Some(path),
            source: Some(source),
            install_hint: String::new(),
        }
    }
}

/// Find a browser executable.
///
/// The configured path wins, then `CHROME`, then platform install
/// locations, then `PATH`. A configured path that does not exist is
/// skipped rather than treated as an error.
pub fn detect_browser(configured: Option<&str>) -> Detection {
    let env_path = std::env::var("CHROME").ok();
    detect_with(configured, env_path.as_deref(), |name| {
        which::which(name).ok()
    })
}

fn detect_with(
    configured: Option<&str>,
    env_path: Option<&str>,
    search: impl Fn(&str) -> Option<PathBuf>,
) -> Detection {
    if let Some(p) = configured.map(Path::new).filter(|p| p.exists()) {
        return Detection::hit(p.to_path_buf(), DetectionSource::Configured);
    }
    if let Some(p) = env_path.map(Path::new).filter(|p| p.exists()) {
        return Detection::hit(p.to_path_buf(), DetectionSource::Environment);
    }
    if let Some(p) = PLATFORM_PATHS.iter().map(Path::new).find(|p| p.exists()) {
        return Detection::hit(p.to_path_buf(), DetectionSource::Platform);
    }
    if let Some(p) = PATH_CANDIDATES.iter().find_map(|name| search(name)) {
        return Detection::hit(p, DetectionSource::SearchPath);
    }
    Detection {
        path: None,
        source: None,
        install_hint: install_instructions(),
    }
}

/// Platform-specific install guidance.
pub fn install_instructions() -> String {
    let steps = if cfg!(target_os = "macos") {
        "  brew install --cask google-chrome"
    } else if cfg!(target_os = "windows") {
        "  winget install Google.Chrome"
    } else if cfg!(target_os = "linux") {
        "  Debian/Ubuntu: sudo apt install chromium-browser\n  \
         Fedora:         sudo dnf install chromium\n  \
         Arch:           sudo pacman -S chromium"
    } else {
        "  Download from https://www.google.com/chrome/"
    };

    format!(
        "No Chromium-based browser found. Install one:\n\n\
         {steps}\n\n\
         Or point webpilot at it:\n  \
         [browser]\n  \
         chrome_path = \"/path/to/chrome\"\n\n\
         Or set the CHROME environment variable."
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn configured_path_wins_when_it_exists() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let found = detect_with(Some(path), Some("/also/missing"), |_| None);
        assert_eq!(found.source, Some(DetectionSource::Configured));
        assert_eq!(found.path.as_deref(), Some(file.path()));
        assert!(found.install_hint.is_empty());
    }

    #[test]
    fn missing_configured_path_falls_through_to_env() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let env = file.path().to_str().unwrap();
        let found = detect_with(Some("/nonexistent/chrome"), Some(env), |_| None);
        assert_eq!(found.source, Some(DetectionSource::Environment));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn search_path_uses_first_candidate_found() {
        let found = detect_with(None, None, |name| {
            (name == "chromium").then(|| PathBuf::from("/usr/bin/chromium"))
        });
        assert_eq!(found.source, Some(DetectionSource::SearchPath));
        assert_eq!(found.path, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn nothing_found_carries_install_hint() {
        let found = detect_with(None, None, |_| None);
        assert!(!found.found());
        assert!(found.install_hint.contains("chrome_path"));
        assert!(found.install_hint.contains("apt"));
    }
}
