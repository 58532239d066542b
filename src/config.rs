use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::MetabError;
use crate::exclusion::{DEFAULT_EXCLUSION_FILE, DEFAULT_HUB_THRESHOLD};
use crate::network::NetworkOptions;
use crate::resolver::DEFAULT_WORKERS;

pub const DEFAULT_CONFIG_FILE: &str = "micrometab.json";
pub const DEFAULT_KB_DIR: &str = "kegg";
pub const DEFAULT_STORE_DIR: &str = ".micrometab";

/// Where gene and reaction annotations come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Local,
    Kegg,
    Togows,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub kb_dir: Option<String>,
    #[serde(default)]
    pub exclusion_list: Option<String>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub network: Option<NetworkOptions>,
    #[serde(default)]
    pub hub_threshold: Option<usize>,
    #[serde(default)]
    pub strict_records: Option<bool>,
    #[serde(default)]
    pub store_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub kb_dir: Utf8PathBuf,
    pub exclusion_list: Utf8PathBuf,
    pub source: Source,
    pub workers: usize,
    pub network: NetworkOptions,
    pub hub_threshold: usize,
    pub strict_records: bool,
    pub store_dir: Utf8PathBuf,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Without an explicit path, a missing `micrometab.json` means defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, MetabError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MetabError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| MetabError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, MetabError> {
        let workers = config.workers.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(MetabError::ConfigParse(
                "workers must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            kb_dir: expand_home(config.kb_dir.as_deref().unwrap_or(DEFAULT_KB_DIR))?,
            exclusion_list: expand_home(
                config
                    .exclusion_list
                    .as_deref()
                    .unwrap_or(DEFAULT_EXCLUSION_FILE),
            )?,
            source: config.source.unwrap_or_default(),
            workers,
            network: config.network.unwrap_or_default(),
            hub_threshold: config.hub_threshold.unwrap_or(DEFAULT_HUB_THRESHOLD),
            strict_records: config.strict_records.unwrap_or(false),
            store_dir: expand_home(config.store_dir.as_deref().unwrap_or(DEFAULT_STORE_DIR))?,
        })
    }
}

/// Resolves a leading `~/` against the user's home directory.
pub fn expand_home(path: &str) -> Result<Utf8PathBuf, MetabError> {
    let Some(rest) = path.strip_prefix("~/") else {
        return Ok(Utf8PathBuf::from(path));
    };
    BaseDirs::new()
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.home_dir().join(rest)).ok())
        .ok_or_else(|| MetabError::Filesystem("unable to resolve home directory".to_string()))
}
