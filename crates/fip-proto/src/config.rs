use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::model::{CatalogMatch, Credential};
use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub favorites: FavoritesConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// JSON key/value file backing the local favorites backend.
    #[serde(default = "default_store_file")]
    pub store_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default = "default_channel_names")]
    pub names: Vec<String>,
    /// Maximum archived events per channel.  0 keeps everything.
    #[serde(default)]
    pub history_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoritesConfig {
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Name of the remote playlist mirroring the favorites.
    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,
}

/// Remote account used as a second favorites backend.
///
/// Sync only happens when `enabled` is set and an access token is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
}

/// Static catalog table: channel track id → catalog match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub entries: BTreeMap<String, CatalogMatch>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            store_file: default_store_file(),
        }
    }
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            names: default_channel_names(),
            history_limit: 0,
        }
    }
}

impl Default for FavoritesConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            playlist_name: default_playlist_name(),
        }
    }
}

impl RemoteConfig {
    pub fn credential(&self) -> Option<Credential> {
        if !self.enabled || self.access_token.trim().is_empty() {
            return None;
        }
        Some(Credential {
            access_token: self.access_token.clone(),
            refresh_token: non_empty(&self.refresh_token),
            expires_in: None,
            token_type: non_empty(&self.token_type),
        })
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn default_log_file() -> PathBuf {
    platform::data_dir().join("daemon.log")
}

fn default_store_file() -> PathBuf {
    platform::data_dir().join("store.json")
}

fn default_channel_names() -> Vec<String> {
    ["fip", "fip-rock", "fip-jazz", "fip-groove", "fip-monde", "fip-nouveautes", "fip-reggae", "fip-electro"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_storage_key() -> String {
    "favorites".to_string()
}

fn default_playlist_name() -> String {
    "fipradio".to_string()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
