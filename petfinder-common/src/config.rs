//! Configuration loading and root folder resolution

use crate::matcher::{ranked, MatchMode, TargetMode};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const ROOT_FOLDER_ENV: &str = "PETFINDER_ROOT_FOLDER";

/// Expo push API endpoint
pub const DEFAULT_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

/// Service configuration, read from TOML. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Data folder holding the database and uploaded images
    pub root_folder: Option<PathBuf>,
    /// Base of public image URLs; defaults to the listen address
    pub public_base_url: Option<String>,
    /// Warn about (and so reject) request fields outside the contract
    pub strict_requests: bool,
    pub matcher: MatcherConfig,
    pub embedding: EmbeddingConfig,
    pub push: PushConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
            root_folder: None,
            public_base_url: None,
            strict_requests: true,
            matcher: MatcherConfig::default(),
            embedding: EmbeddingConfig::default(),
            push: PushConfig::default(),
        }
    }
}

/// Which matcher runs and how it is tuned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub kind: MatcherKind,
    pub match_mode: MatchMode,
    pub target_mode: TargetMode,
    /// Number of alerts a ranked match may select
    pub k: usize,
    /// Proximity weight for ranked matching
    pub decay: f64,
    /// Seed for the spoof matcher's random choices
    pub seed: Option<u64>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            kind: MatcherKind::Spoof,
            match_mode: MatchMode::Always,
            target_mode: TargetMode::All,
            k: ranked::DEFAULT_K,
            decay: ranked::DEFAULT_DECAY,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    Spoof,
    Ranked,
}

/// Remote embedding model service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL serving `GET /embed?fname=<image>`; disabled when unset
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 10,
        }
    }
}

/// Push notification delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub enabled: bool,
    pub endpoint: String,
    /// Upper bound for one push request
    pub timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: DEFAULT_PUSH_ENDPOINT.to_string(),
            timeout_secs: 5,
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one the platform config file is
    /// used if present; otherwise defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!("Config file not found: {}", path.display())));
                }
                path.to_path_buf()
            }
            None => match default_config_path() {
                Some(path) => path,
                None => {
                    warn!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL for public image links, without trailing slash
    pub fn public_base_url(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen_addr()))
            .trim_end_matches('/')
            .to_string()
    }
}

/// Root folder resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &ServiceConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    get_default_root_folder()
}

/// Platform config file, if one exists
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("petfinder").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/petfinder/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("petfinder"))
        .unwrap_or_else(|| PathBuf::from("./petfinder_data"))
}

/// Create the folder layout under `root`, returning the database path
pub fn ensure_root_folder(root: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root.join("images"))?;
    Ok(root.join("petfinder.db"))
}
