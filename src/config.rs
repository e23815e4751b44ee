use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use taskmirror_core::constants::{
    DEFAULT_EVENT_DURATION_MINUTES, DEFAULT_LOOKBACK_DAYS, DEFAULT_REMINDER_MINUTES,
    DEFAULT_TIMEZONE,
};
use taskmirror_core::SyncOptions;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub openproject: OpenProjectConfig,
    pub google: GoogleConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logsheet: LogSheetConfig,
}

/// OpenProject API endpoint and project selection
#[derive(Debug, Deserialize)]
pub struct OpenProjectConfig {
    /// Base API URL, e.g. "https://tracker.example.com/api/v3/"
    pub url: String,
    pub api_key: String,
    /// Project name as it appears on OpenProject
    pub project: String,
}

/// OAuth credentials and target calendar
#[derive(Debug, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
}

/// Knobs for payload construction and event listing
#[derive(Debug, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_event_duration_minutes")]
    pub event_duration_minutes: i64,
    #[serde(default = "default_reminder_minutes")]
    pub reminder_minutes: Vec<i64>,
    /// Lower bound for listing calendar events: now - lookback_days
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

/// Optional Google Sheets run log
#[derive(Debug, Default, Deserialize)]
pub struct LogSheetConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub spreadsheet_id: String,
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_event_duration_minutes() -> i64 {
    DEFAULT_EVENT_DURATION_MINUTES
}

fn default_reminder_minutes() -> Vec<i64> {
    DEFAULT_REMINDER_MINUTES.to_vec()
}

fn default_lookback_days() -> i64 {
    DEFAULT_LOOKBACK_DAYS
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            timezone: default_timezone(),
            event_duration_minutes: default_event_duration_minutes(),
            reminder_minutes: default_reminder_minutes(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl SyncConfig {
    /// Materialize the [sync] section as core options.
    pub fn options(&self) -> Result<SyncOptions> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|_| anyhow::anyhow!("Unknown timezone '{}' in [sync] config", self.timezone))?;

        Ok(SyncOptions {
            timezone,
            event_duration: chrono::Duration::minutes(self.event_duration_minutes),
            reminder_minutes: self.reminder_minutes.clone(),
        })
    }
}

/// OAuth tokens for the authenticated Google account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Get the config directory path (~/.config/taskmirror)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("taskmirror");
    Ok(config_dir)
}

/// Get the config file path (~/.config/taskmirror/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the tokens file path (~/.config/taskmirror/tokens.json)
pub fn tokens_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("tokens.json"))
}

/// Load config from ~/.config/taskmirror/config.toml
pub fn load_config() -> Result<Config> {
    let path = config_path()?;

    if !path.exists() {
        anyhow::bail!(
            "Config file not found at {}\n\n\
            Create it with your OpenProject and Google settings:\n\n\
            [openproject]\n\
            url = \"https://tracker.example.com/api/v3/\"\n\
            api_key = \"your-api-key\"\n\
            project = \"Your Project\"\n\n\
            [google]\n\
            client_id = \"your-client-id.apps.googleusercontent.com\"\n\
            client_secret = \"your-client-secret\"\n\
            calendar_id = \"primary\"",
            path.display()
        );
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

    Ok(config)
}

/// Load tokens from ~/.config/taskmirror/tokens.json
pub fn load_tokens() -> Result<AccountTokens> {
    let path = tokens_path()?;

    if !path.exists() {
        anyhow::bail!(
            "No stored tokens found at {}\n\
            Run `taskmirror auth` first.",
            path.display()
        );
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read tokens file at {}", path.display()))?;

    let tokens: AccountTokens = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse tokens file at {}", path.display()))?;

    Ok(tokens)
}

/// Save tokens to ~/.config/taskmirror/tokens.json
pub fn save_tokens(tokens: &AccountTokens) -> Result<()> {
    let path = tokens_path()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory at {}", parent.display()))?;
    }

    let contents = serde_json::to_string_pretty(tokens).context("Failed to serialize tokens")?;

    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write tokens file at {}", path.display()))?;

    // Tokens grant calendar and spreadsheet access; keep them private
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Whether the access token is expired or about to expire.
pub fn tokens_need_refresh(tokens: &AccountTokens) -> bool {
    match tokens.expires_at {
        Some(expires_at) => expires_at <= chrono::Utc::now() + chrono::Duration::seconds(60),
        None => false,
    }
}
