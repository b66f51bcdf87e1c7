mod channels;
mod defaults;

#[cfg(test)]
mod tests;

pub use channels::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::HermesError;
use defaults::*;

/// Environment variable that overrides `telegram.bot_token`.
pub const ENV_TELEGRAM_TOKEN: &str = "HERMES_TELEGRAM_BOT_TOKEN";
/// Environment variable that overrides `telegram.chat_id`.
pub const ENV_TELEGRAM_CHAT: &str = "HERMES_TELEGRAM_CHAT_ID";

/// Top-level Hermes configuration.
///
/// Built once in `main` and handed to each component's constructor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hermes: HermesConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HermesConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for HermesConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl HermesConfig {
    /// Resolve a path relative to the (expanded) data directory.
    pub fn data_path(&self, relative: &str) -> PathBuf {
        Path::new(&shellexpand(&self.data_dir)).join(relative)
    }
}

/// Where the store snapshot and the auth document are kept.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// JSON files under `{data_dir}`.
    #[default]
    File,
    /// One SQLite database holding both documents.
    Sqlite,
}

impl PersistenceBackend {
    pub fn display_name(&self) -> &str {
        match self {
            Self::File => "file",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Persistence config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,
    /// SQLite database path (ignored by the file backend).
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Store autosave period.
    #[serde(default = "default_flush_interval")]
    pub store_flush_interval_secs: u64,
    /// Credential write coalescing window.
    #[serde(default = "default_creds_debounce")]
    pub creds_debounce_ms: u64,
}

impl PersistenceConfig {
    pub fn store_flush_interval(&self) -> Duration {
        Duration::from_secs(self.store_flush_interval_secs.max(1))
    }

    pub fn creds_debounce(&self) -> Duration {
        Duration::from_millis(self.creds_debounce_ms)
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::default(),
            db_path: default_db_path(),
            store_flush_interval_secs: default_flush_interval(),
            creds_debounce_ms: default_creds_debounce(),
        }
    }
}

/// Command module config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Messages starting with this prefix are commands.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Only react to messages sent from the paired account itself.
    #[serde(default = "default_true")]
    pub self_only: bool,
    /// Phone numbers allowed to run commands in addition to the owner.
    #[serde(default)]
    pub allowed_users: Vec<String>,
    /// Module names that are not registered.
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            self_only: true,
            allowed_users: Vec::new(),
            disabled: Vec::new(),
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Secrets from the
/// environment are applied on top of whatever the file says.
pub fn load(path: &str) -> Result<Config, HermesError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HermesError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str::<Config>(&content)
            .map_err(|e| HermesError::Config(format!("failed to parse config: {}", e)))?
    } else {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Overlay secrets taken from the environment.
    ///
    /// `lookup` is injected so tests do not have to mutate the process env.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(ENV_TELEGRAM_TOKEN).filter(|t| !t.trim().is_empty()) {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TELEGRAM_CHAT) {
            match raw.trim().parse::<i64>() {
                Ok(id) => self.telegram.chat_id = id,
                Err(e) => warn!("ignoring {ENV_TELEGRAM_CHAT}={raw}: {e}"),
            }
        }
    }

    /// Reject combinations that cannot work at runtime.
    pub fn validate(&self) -> Result<(), HermesError> {
        if self.telegram.enabled {
            if self.telegram.bot_token.is_empty() {
                return Err(HermesError::Config(format!(
                    "telegram mirror is enabled but bot_token is empty; set it in the config or {ENV_TELEGRAM_TOKEN}"
                )));
            }
            if self.telegram.chat_id == 0 {
                return Err(HermesError::Config(format!(
                    "telegram mirror is enabled but chat_id is not set; set it in the config or {ENV_TELEGRAM_CHAT}"
                )));
            }
        }
        if self.modules.prefix.trim().is_empty() {
            return Err(HermesError::Config("modules.prefix must not be empty".into()));
        }
        if self.whatsapp.session_id.trim().is_empty() {
            return Err(HermesError::Config(
                "whatsapp.session_id must not be empty".into(),
            ));
        }
        Ok(())
    }
}
