use crate::browser::DEFAULT_USER_AGENT;
use crate::model::ConfigError;
use crate::parser::{ExtractorSettings, SiteProfile, SiteRegistry};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DriverKind {
    /// Plain HTTP fetch, no script execution.
    Http,
    /// Headless Chromium (needs the `chromium` feature).
    Chromium,
}

#[derive(Debug, Parser)]
#[command(
    name = "odds-sniper",
    version,
    about = "Scrapes over/under odds for a market line from betting sites"
)]
pub struct Cli {
    /// JSON request file; read from stdin when omitted.
    #[arg(long, value_name = "FILE")]
    pub request: Option<PathBuf>,

    /// Maximum number of browsing sessions open at once.
    #[arg(long, env = "ODDS_MAX_SESSIONS", default_value_t = 3)]
    pub max_sessions: usize,

    /// Default per-site deadline in milliseconds.
    #[arg(long, env = "ODDS_TIMEOUT_MS", default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Wait after navigation before reading the page, in milliseconds.
    #[arg(long, env = "ODDS_SETTLE_MS", default_value_t = 2_000)]
    pub settle_ms: u64,

    #[arg(long, env = "ODDS_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Caller origins allowed by the fronting request layer.
    #[arg(long, env = "ODDS_ALLOWED_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub allowed_origins: Vec<String>,

    /// JSON file with site profiles and extraction keywords.
    #[arg(long, env = "ODDS_SETTINGS", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    #[arg(long, env = "ODDS_DRIVER", value_enum, default_value_t = DriverKind::Http)]
    pub driver: DriverKind,

    /// Print a health probe response and exit.
    #[arg(long)]
    pub health: bool,
}

impl Cli {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Contents of the optional settings file. Missing keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub sites: Vec<SiteProfile>,
    #[serde(flatten)]
    pub extractor: ExtractorSettings,
}

/// Built-in profiles overlaid with the settings file, if any.
pub fn load_settings(path: Option<&Path>) -> Result<(SiteRegistry, ExtractorSettings), ConfigError> {
    let mut registry = SiteRegistry::builtin()?;
    let Some(path) = path else {
        return Ok((registry, ExtractorSettings::default()));
    };

    let content = fs::read_to_string(path)?;
    let file: SettingsFile = serde_json::from_str(&content)?;
    for profile in file.sites {
        registry.insert(profile)?;
    }
    Ok((registry, file.extractor))
}
