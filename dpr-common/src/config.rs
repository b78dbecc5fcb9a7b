//! Configuration loading and data folder resolution
//!
//! Resolution order for both the config file and the data folder:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing config file is never fatal: defaults apply and a warning is logged.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pagination::{EXPLORE_PAGE_SIZE, RECOMMENDATION_PAGE_SIZE};
use crate::{Error, Result};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "DPR_DATA_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_FILE_ENV: &str = "DPR_CONFIG";

/// File name of the saved-items store inside the data folder
pub const SAVED_ITEMS_FILE: &str = "saved_patterns.json";

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub log_level: String,
    pub listen_addr: String,
    pub sparql_endpoint: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let data_folder = if cfg!(target_os = "linux") {
            // ~/.local/share/dpr
            dirs::data_local_dir()
                .map(|d| d.join("dpr"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/dpr"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("dpr"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/dpr"))
        } else if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("dpr"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\dpr"))
        } else {
            PathBuf::from("./dpr_data")
        };

        Self {
            data_folder,
            log_level: "info".to_string(),
            listen_addr: "127.0.0.1:5780".to_string(),
            sparql_endpoint: "http://localhost:3030/result/query".to_string(),
        }
    }
}

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Taxonomy and catalogue source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// SPARQL query endpoint of the graph store
    #[serde(default)]
    pub sparql_endpoint: Option<String>,
    /// JSON snapshot read instead of querying the graph store
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// Root class of the quiz questions
    #[serde(default = "default_problem_root")]
    pub problem_root: String,
    /// Root class of the pattern catalogue
    #[serde(default = "default_pattern_root")]
    pub pattern_root: String,
    /// Root class offered to the exploration selectors
    #[serde(default = "default_explore_root")]
    pub explore_root: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            sparql_endpoint: None,
            snapshot_path: None,
            problem_root: default_problem_root(),
            pattern_root: default_pattern_root(),
            explore_root: default_explore_root(),
        }
    }
}

fn default_problem_root() -> String {
    "onto:Problem".to_string()
}

fn default_pattern_root() -> String {
    "onto:Pattern".to_string()
}

fn default_explore_root() -> String {
    "owl:Thing".to_string()
}

/// HTTP service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub listen_addr: Option<String>,
    #[serde(default = "default_explore_page_size")]
    pub explore_page_size: usize,
    #[serde(default = "default_recommendation_page_size")]
    pub recommendation_page_size: usize,
    /// Idle minutes after which a quiz or explore session is dropped
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: None,
            explore_page_size: default_explore_page_size(),
            recommendation_page_size: default_recommendation_page_size(),
            session_ttl_minutes: default_session_ttl_minutes(),
        }
    }
}

fn default_explore_page_size() -> usize {
    EXPLORE_PAGE_SIZE
}

fn default_recommendation_page_size() -> usize {
    RECOMMENDATION_PAGE_SIZE
}

fn default_session_ttl_minutes() -> u64 {
    60
}

/// Contents of `<config dir>/dpr/<module>.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub data_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse a config file, falling back to defaults when it is absent
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load(path)
            }
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                warn!("No config file location available, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Resolves config file and data folder locations for one module
#[derive(Debug, Clone)]
pub struct DataFolderResolver {
    module_name: String,
    cli_data_folder: Option<PathBuf>,
    cli_config_file: Option<PathBuf>,
}

impl DataFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_data_folder: None,
            cli_config_file: None,
        }
    }

    pub fn with_cli_data_folder(mut self, path: Option<PathBuf>) -> Self {
        self.cli_data_folder = path;
        self
    }

    pub fn with_cli_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.cli_config_file = path;
        self
    }

    /// Location of the TOML config file, whether or not it exists
    pub fn config_file_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_config_file {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|d| d.join("dpr").join(format!("{}.toml", self.module_name)))
    }

    /// Data folder for `config`, following the resolution order
    pub fn resolve_data_folder(&self, config: &TomlConfig) -> PathBuf {
        if let Some(path) = &self.cli_data_folder {
            return path.clone();
        }
        if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
            return PathBuf::from(path);
        }
        if let Some(path) = &config.data_folder {
            return path.clone();
        }
        CompiledDefaults::for_current_platform().data_folder
    }
}

/// Creates the data folder and names the files inside it
#[derive(Debug, Clone)]
pub struct DataFolderInitializer {
    data_folder: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(data_folder: PathBuf) -> Self {
        Self { data_folder }
    }

    /// Create the folder (and parents); safe to call repeatedly
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.data_folder.exists() {
            std::fs::create_dir_all(&self.data_folder)?;
            info!("Created data folder {}", self.data_folder.display());
        }
        Ok(())
    }

    pub fn saved_items_path(&self) -> PathBuf {
        self.data_folder.join(SAVED_ITEMS_FILE)
    }
}
