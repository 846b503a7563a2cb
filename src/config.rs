use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

pub const DEFAULT_RCON_PORT: u16 = 25575;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub minecraft: MinecraftConfig,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MinecraftConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl Default for MinecraftConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_RCON_PORT,
            password: String::new(),
        }
    }
}

impl MinecraftConfig {
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.password.is_empty()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Role ids are stored as strings, an empty string meaning "not set".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct DiscordConfig {
    pub linked_role_id: String,
    pub admin_role_id: String,
}

impl DiscordConfig {
    pub fn linked_role(&self) -> Option<&str> {
        non_empty(&self.linked_role_id)
    }

    pub fn admin_role(&self) -> Option<&str> {
        non_empty(&self.admin_role_id)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    match s.is_empty() {
        true => None,
        false => Some(s),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to write config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize config: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Shared, file-backed process configuration. Every setter persists immediately.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    path: Arc<PathBuf>,
    config: Arc<RwLock<Config>>,
}

impl ConfigHandle {
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: Arc::new(path.into()),
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Falls back to the default configuration when the file is missing or invalid.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let config = match read_config(&path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::error!("Error loading config from {}: {}", path.display(), e);
                Config::default()
            }
        };

        Self::new(path, config)
    }

    pub fn minecraft(&self) -> MinecraftConfig {
        self.read().minecraft.clone()
    }

    pub fn discord(&self) -> DiscordConfig {
        self.read().discord.clone()
    }

    pub fn set_server(&self, host: String, port: u16, password: String) -> Result<(), ConfigError> {
        self.update(|config| {
            config.minecraft = MinecraftConfig {
                host,
                port,
                password,
            }
        })
    }

    pub fn set_linked_role(&self, role_id: String) -> Result<(), ConfigError> {
        self.update(|config| config.discord.linked_role_id = role_id)
    }

    pub fn set_admin_role(&self, role_id: String) -> Result<(), ConfigError> {
        self.update(|config| config.discord.admin_role_id = role_id)
    }

    fn update<F: FnOnce(&mut Config)>(&self, f: F) -> Result<(), ConfigError> {
        let snapshot = {
            let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
            f(&mut *config);
            config.clone()
        };

        write_config(&self.path, &snapshot)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Config> {
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }
}

fn read_config(path: &Path) -> anyhow::Result<Config> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn write_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}
