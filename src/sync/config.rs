use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides the stored access token
pub const TOKEN_ENV_VAR: &str = "STOCKSYNC_TOKEN";

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const CONFIG_FILE: &str = "config.toml";
const CREDENTIALS_FILE: &str = ".credentials";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error("Credentials not found")]
    CredentialsNotFound,
}

/// Where and how the inventory is synced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Whether sync is enabled at all
    #[serde(default)]
    pub enabled: bool,
    /// Repository owner on the content host
    #[serde(default)]
    pub owner: String,
    /// Repository holding `index.json`, `categories/` and `images/`
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Base URL of the contents API
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// Auto-sync interval in minutes (for periodic mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<u64>,
    /// Last successful pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            owner: String::new(),
            repo: String::new(),
            branch: default_branch(),
            api_base_url: default_api_base(),
            sync_mode: SyncMode::Manual,
            sync_interval: None,
            last_sync: None,
        }
    }
}

impl SyncConfig {
    /// Load `config.toml` from `data_dir`, falling back to defaults when absent
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(data_dir)?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(data_dir.join(CONFIG_FILE), content)?;
        Ok(())
    }

    /// Coordinates and a token are all present
    pub fn is_configured(&self, credentials: Option<&SyncCredentials>) -> bool {
        !self.owner.trim().is_empty()
            && !self.repo.trim().is_empty()
            && credentials.map_or(false, |c| !c.token.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owner.trim().is_empty() {
            return Err(ConfigError::Invalid("owner is required".to_string()));
        }
        if self.repo.trim().is_empty() {
            return Err(ConfigError::Invalid("repo is required".to_string()));
        }
        if self.branch.trim().is_empty() {
            return Err(ConfigError::Invalid("branch must not be empty".to_string()));
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "API URL must start with http:// or https://".to_string(),
            ));
        }
        Ok(())
    }

    /// Timer interval when periodic sync is switched on
    pub fn auto_sync_interval(&self) -> Option<Duration> {
        if !self.enabled || self.sync_mode != SyncMode::Periodic {
            return None;
        }
        Some(interval_from_minutes(
            self.sync_interval.unwrap_or(DEFAULT_INTERVAL_MINUTES),
        ))
    }
}

/// Auto-sync interval when none is configured
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// At least one minute; absurd values saturate instead of overflowing
pub fn interval_from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.max(1).saturating_mul(60))
}

/// Sync mode configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// User-triggered sync only
    #[default]
    Manual,
    /// Sync at regular intervals
    Periodic,
}

/// Access token for the content host
#[derive(Clone)]
pub struct SyncCredentials {
    pub token: String,
}

impl std::fmt::Debug for SyncCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCredentials").field("token", &"***").finish()
    }
}

impl SyncCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    fn file_path(data_dir: &Path) -> PathBuf {
        data_dir.join(CREDENTIALS_FILE)
    }

    /// Token from the environment, then from the credentials file
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                return Ok(Self::new(token.trim()));
            }
        }

        match std::fs::read_to_string(Self::file_path(data_dir)) {
            Ok(data) if !data.trim().is_empty() => Ok(Self::new(data.trim())),
            Ok(_) => Err(ConfigError::CredentialsNotFound),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConfigError::CredentialsNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn store(&self, data_dir: &Path) -> Result<(), ConfigError> {
        let file_path = Self::file_path(data_dir);
        std::fs::create_dir_all(data_dir)?;
        std::fs::write(&file_path, &self.token)?;
        // Restrict permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&file_path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn delete(data_dir: &Path) -> Result<(), ConfigError> {
        match std::fs::remove_file(Self::file_path(data_dir)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// What a sync step did to one partition or attachment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Uploaded,
    Downloaded,
    None,
    Error,
}

/// Outcome of syncing one category partition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOutcome {
    pub category: String,
    pub action: SyncAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CategoryOutcome {
    pub fn new(category: impl Into<String>, action: SyncAction) -> Self {
        Self {
            category: category.into(),
            action,
            error: None,
        }
    }

    pub fn error(category: impl Into<String>, message: String) -> Self {
        Self {
            category: category.into(),
            action: SyncAction::Error,
            error: Some(message),
        }
    }
}

/// Result of one full pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    /// What happened to `index.json`
    pub index: SyncAction,
    pub categories: Vec<CategoryOutcome>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl PassReport {
    pub fn uploaded(&self) -> usize {
        self.count(SyncAction::Uploaded)
    }

    pub fn downloaded(&self) -> usize {
        self.count(SyncAction::Downloaded)
    }

    pub fn errors(&self) -> usize {
        self.count(SyncAction::Error)
    }

    fn count(&self, action: SyncAction) -> usize {
        self.categories.iter().filter(|c| c.action == action).count()
    }
}

/// Engine state as shown to the user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<PassReport>,
    /// Message of the last pass that failed in the index phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_roundtrip_and_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(SyncConfig::load(dir.path()).unwrap(), SyncConfig::default());

        let config = SyncConfig {
            enabled: true,
            owner: "werkstatt".to_string(),
            repo: "lager".to_string(),
            sync_mode: SyncMode::Periodic,
            sync_interval: Some(10),
            ..Default::default()
        };
        config.save(dir.path()).unwrap();

        let loaded = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.branch, "main");
        assert_eq!(loaded.auto_sync_interval(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_interval_from_minutes_bounds() {
        assert_eq!(interval_from_minutes(0), Duration::from_secs(60));
        assert_eq!(interval_from_minutes(15), Duration::from_secs(900));
        assert_eq!(interval_from_minutes(u64::MAX), Duration::from_secs(u64::MAX));

        let config = SyncConfig {
            enabled: true,
            sync_mode: SyncMode::Periodic,
            sync_interval: Some(u64::MAX),
            ..Default::default()
        };
        assert_eq!(config.auto_sync_interval(), Some(Duration::from_secs(u64::MAX)));
    }

    #[test]
    fn test_validate() {
        let mut config = SyncConfig {
            owner: "o".to_string(),
            repo: "r".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.api_base_url = "ftp://example.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_is_configured_needs_token() {
        let config = SyncConfig {
            owner: "o".to_string(),
            repo: "r".to_string(),
            ..Default::default()
        };
        assert!(!config.is_configured(None));
        assert!(config.is_configured(Some(&SyncCredentials::new("ghp_x"))));
        assert!(!SyncConfig::default().is_configured(Some(&SyncCredentials::new("ghp_x"))));
    }

    #[cfg(unix)]
    #[test]
    fn test_credentials_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        SyncCredentials::new("ghp_secret").store(dir.path()).unwrap();

        let mode = std::fs::metadata(dir.path().join(CREDENTIALS_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);

        SyncCredentials::delete(dir.path()).unwrap();
        SyncCredentials::delete(dir.path()).unwrap();
    }
}
