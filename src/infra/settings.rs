use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_USER_AGENT: &str = concat!("modtrack/", env!("CARGO_PKG_VERSION"));

/// User level settings, read from `<config dir>/modtrack/config.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: String,
    pub modrinth_token: Option<String>,
    pub curseforge_api_key: Option<String>,
    pub user_agent: String,
    /// 0 issues every batch item at once.
    pub max_concurrent_requests: usize,
    /// Whether `upgrade` fails instead of skipping a mod that has no
    /// compatible version left.
    pub fail_upgrade_without_compatible_version: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: "modrinth".to_string(),
            modrinth_token: None,
            curseforge_api_key: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_concurrent_requests: 0,
            fail_upgrade_without_compatible_version: false,
        }
    }
}

#[derive(Clone)]
pub struct SettingsManager {
    config_dir: PathBuf,
}

impl SettingsManager {
    pub fn new() -> anyhow::Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("modtrack");

        Ok(Self { config_dir })
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn settings_exist(&self) -> bool {
        self.settings_path().exists()
    }

    /// Settings from disk, or defaults when there is no file yet.
    pub async fn load_settings(&self) -> anyhow::Result<Settings> {
        if !self.settings_exist() {
            return Ok(Settings::default());
        }
        read_settings(&self.settings_path()).await
    }

    pub async fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.config_dir).await?;
        let toml_str = toml::to_string_pretty(settings)?;
        tokio::fs::write(self.settings_path(), toml_str).await?;
        Ok(())
    }
}

async fn read_settings(path: &Path) -> anyhow::Result<Settings> {
    let content = tokio::fs::read_to_string(path).await?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}

impl Settings {
    /// Environment variables win over the file, but not over explicit flags.
    pub fn apply_env(mut self) -> Self {
        if let Ok(token) = std::env::var("MODRINTH_TOKEN")
            && !token.is_empty()
        {
            self.modrinth_token = Some(token);
        }
        if let Ok(key) = std::env::var("CURSEFORGE_API_KEY")
            && !key.is_empty()
        {
            self.curseforge_api_key = Some(key);
        }
        self
    }
}
