pub mod connection;
pub mod error;
pub mod settings;

pub use connection::{ConnectionCatalog, ConnectionConfig};
pub use error::*;
pub use settings::{RuntimeSettings, StoreSettings, WaitSpec, WaiterSettings};

use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "cloudweave.yaml";
const CONFIG_DIR: &str = ".cloudweave";
const APP_DIR: &str = "cloudweave";

/// Environment variable pointing directly at a config file
pub const CONFIG_PATH_ENV: &str = "CLOUDWEAVE_CONFIG_PATH";

/// Contents of `cloudweave.yaml`
#[derive(Debug, Clone, Default)]
pub struct CloudweaveConfig {
    pub connections: ConnectionCatalog,
    pub runtime: RuntimeSettings,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    connections: Vec<ConnectionConfig>,
    #[serde(default)]
    runtime: RuntimeSettings,
}

impl CloudweaveConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(content)?;
        raw.runtime.validate()?;
        Ok(Self {
            connections: ConnectionCatalog::new(raw.connections)?,
            runtime: raw.runtime,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Loads the file found by [`find_config_file`]
    pub fn load_default() -> Result<Self> {
        Self::load(find_config_file()?)
    }
}

/// Locates `cloudweave.yaml`
///
/// Search order:
/// 1. `CLOUDWEAVE_CONFIG_PATH` (direct path)
/// 2. current directory: cloudweave.yaml
/// 3. ./.cloudweave/cloudweave.yaml
/// 4. ~/.config/cloudweave/cloudweave.yaml
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    let path = current_dir.join(CONFIG_FILE);
    if path.exists() {
        return Ok(path);
    }

    let path = current_dir.join(CONFIG_DIR).join(CONFIG_FILE);
    if path.exists() {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join(APP_DIR).join(CONFIG_FILE);
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}
