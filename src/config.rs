//! Configuration for jgantt
//!
//! Chart and fetch settings live in a project file (`jgantt.toml` in the
//! current directory, or the path given with `--config`).
//!
//! Jira credentials are stored separately in `~/.config/jgantt/jira.toml`
//! so they don't end up committed next to the project settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::timeline::{DEFAULT_EXCLUDED_STATUSES, TimelineOptions};

/// Default project config file name
pub const CONFIG_FILE: &str = "jgantt.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub chart: ChartConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    /// Jira field ids for the planned schedule
    #[serde(default)]
    pub fields: FieldsConfig,

    #[serde(default)]
    pub timeline: TimelineConfig,
}

/// Chart rendering defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartConfig {
    /// Statuses that never start a bar
    #[serde(default = "default_excluded_statuses")]
    pub excluded_statuses: Vec<String>,

    /// Output format: "mermaid", "ascii", "json" or "yaml" (None = ascii on a terminal, else mermaid)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Draw the "today" marker and current-month band
    #[serde(default = "default_true")]
    pub highlight: bool,
}

fn default_excluded_statuses() -> Vec<String> {
    DEFAULT_EXCLUDED_STATUSES.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            excluded_statuses: default_excluded_statuses(),
            format: None,
            highlight: true,
        }
    }
}

/// Search paging and HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchConfig {
    /// Issues requested per search page
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Abort after this many pages
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_page_size() -> u64 {
    50
}

fn default_max_pages() -> usize {
    200
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Which issue fields hold the planned schedule. Empty string disables one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldsConfig {
    #[serde(default = "default_planned_start")]
    pub planned_start: String,

    #[serde(default = "default_planned_end")]
    pub planned_end: String,
}

fn default_planned_start() -> String {
    "customfield_10015".to_string()
}

fn default_planned_end() -> String {
    "duedate".to_string()
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            planned_start: default_planned_start(),
            planned_end: default_planned_end(),
        }
    }
}

/// Reconstruction behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineConfig {
    /// Open the initial status at the ticket's creation time
    #[serde(default = "default_true")]
    pub seed_from_created: bool,

    /// Skip tickets whose transitions don't match the current status
    #[serde(default = "default_true")]
    pub strict: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            seed_from_created: true,
            strict: true,
        }
    }
}

/// Jira connection settings
/// Stored in ~/.config/jgantt/jira.toml (user's global config, not in repo)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct JiraConfig {
    /// Jira server (e.g., "jira.example.com" or "https://example.atlassian.net")
    #[serde(default)]
    pub server: Option<String>,

    /// Username or email
    #[serde(default)]
    pub username: Option<String>,

    /// Password or API token for basic auth
    #[serde(default)]
    pub password: Option<String>,

    /// Personal access token (bearer auth, preferred over password)
    #[serde(default)]
    pub token: Option<String>,
}

impl JiraConfig {
    /// Get the path to the global Jira config file
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("jgantt").join("jira.toml"))
    }

    /// Load Jira configuration from ~/.config/jgantt/jira.toml
    /// Returns default (empty) config if file doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read Jira config: {}", e))?;

        let config: JiraConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse Jira config: {}", e))?;

        Ok(config)
    }

    /// Check if the configuration has a server and some way to authenticate
    pub fn has_credentials(&self) -> bool {
        self.server.is_some()
            && (self.token.is_some() || (self.username.is_some() && self.password.is_some()))
    }
}

impl Config {
    /// Resolve the project config path: explicit path, else ./jgantt.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    /// Load configuration from the given file
    /// Returns default config if file doesn't exist
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config: {}", e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Save configuration to the given file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;

        fs::write(path, content).map_err(|e| anyhow::anyhow!("Failed to write config: {}", e))?;

        Ok(())
    }

    /// Initialize default config file if it doesn't exist
    pub fn init(path: &Path) -> anyhow::Result<bool> {
        if path.exists() {
            return Ok(false); // Already exists
        }

        let config = Self::default();
        config.save(path)?;
        Ok(true) // Created new
    }

    /// Reconstruction options, with an optional override of the excluded statuses
    pub fn timeline_options(&self, excluded_override: Option<&[String]>) -> TimelineOptions {
        let excluded = excluded_override.unwrap_or(self.chart.excluded_statuses.as_slice());
        let mut options = TimelineOptions::with_excluded(excluded);
        options.seed_from_created = self.timeline.seed_from_created;
        options.strict = self.timeline.strict;
        options
    }
}
