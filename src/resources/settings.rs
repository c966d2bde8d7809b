use std::fs;
use std::path::{Path, PathBuf};

use bevy::log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::resources::constants::{DEFAULT_MAX_CONNS_PER_HOST, DEFAULT_USER_AGENT};

/// Application settings, loaded once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub network: NetworkSettings,
    pub paths: PathSettings,
    #[serde(default)]
    pub viewer: ViewerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Cap on simultaneous requests to one remote host
    #[serde(default = "default_max_conns_per_host")]
    pub max_conns_per_host: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root of the on-disk tile cache
    pub cache: PathBuf,
    /// Directory holding one `<id>.toml` file per map source
    pub maps: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerSettings {
    pub default_map: Option<String>,
    pub zoom: Option<u8>,
    pub center_lat: Option<f64>,
    pub center_lon: Option<f64>,
}

fn default_max_conns_per_host() -> usize {
    DEFAULT_MAX_CONNS_PER_HOST
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            max_conns_per_host: DEFAULT_MAX_CONNS_PER_HOST,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: NetworkSettings::default(),
            paths: PathSettings {
                cache: PathBuf::from("cache"),
                maps: PathBuf::from("maps"),
            },
            viewer: ViewerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. A missing or malformed file is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadSettings {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::parse(&contents).map_err(|source| ConfigError::ParseSettings {
            path: path.to_path_buf(),
            source,
        })?;

        settings.paths.cache = make_absolute(&settings.paths.cache);
        settings.paths.maps = make_absolute(&settings.paths.maps);
        if settings.network.max_conns_per_host == 0 {
            debug!("max_conns_per_host = 0, using 1");
            settings.network.max_conns_per_host = 1;
        }

        debug!("Cache directory: {}", settings.paths.cache.display());
        debug!("Maps directory: {}", settings.paths.maps.display());
        Ok(settings)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

/// Resolve a relative path against the current working directory
fn make_absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
