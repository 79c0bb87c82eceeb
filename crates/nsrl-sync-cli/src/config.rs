use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nsrl_sync::{ConfigurationError, ContainerKind, Credentials, DEFAULT_SET_KEY, SourceDescriptor};
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub updater: UpdaterSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            updater: UpdaterSection::default(),
            store: StoreSection::default(),
            sources: default_sources(),
        }
    }
}

impl AppConfig {
    /// Descriptors for every enabled source, in file order.
    pub fn descriptors(&self) -> Result<Vec<SourceDescriptor>, ConfigurationError> {
        self.sources
            .iter()
            .filter(|entry| entry.enabled)
            .map(SourceEntry::to_descriptor)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdaterSection {
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub fingerprint_dedup: bool,
}

impl Default for UpdaterSection {
    fn default() -> Self {
        Self {
            working_dir: None,
            timeout_secs: None,
            fingerprint_dedup: true,
        }
    }
}

impl UpdaterSection {
    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(nsrl_sync_http::DEFAULT_TIMEOUT)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Redis,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: Backend,
    /// SQLite database holding the hash sets (sqlite backend) and the
    /// update state (always).
    pub path: Option<PathBuf>,
    pub url: Option<String>,
    #[serde(default = "default_set_key")]
    pub set_key: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            path: None,
            url: None,
            set_key: default_set_key(),
        }
    }
}

/// A single source definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceEntry {
    pub name: String,
    pub uri: String,
    pub pattern: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Inline PEM certificate to trust for this and later sources.
    pub ca_cert: Option<String>,
    #[serde(default)]
    pub ignore_ssl_errors: bool,
    pub proxy: Option<String>,
    pub container: Option<ContainerKind>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl SourceEntry {
    fn new(name: &str, uri: &str, pattern: &str) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            pattern: Some(pattern.into()),
            enabled: true,
            username: None,
            password: None,
            ca_cert: None,
            ignore_ssl_errors: false,
            proxy: None,
            container: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn to_descriptor(&self) -> Result<SourceDescriptor, ConfigurationError> {
        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigurationError::Other(format!(
                    "source {}: username and password must be given together",
                    self.name
                )));
            }
        };

        Ok(SourceDescriptor {
            name: self.name.clone(),
            uri: self.uri.clone(),
            credentials,
            ca_cert: self.ca_cert.clone(),
            ignore_ssl_errors: self.ignore_ssl_errors,
            proxy: self.proxy.clone(),
            headers: self.headers.clone(),
            pattern: self.pattern.clone(),
            container: self.container,
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_set_key() -> String {
    DEFAULT_SET_KEY.into()
}

/// The NIST RDS sets the updater tracks out of the box.
pub fn default_sources() -> Vec<SourceEntry> {
    vec![
        SourceEntry::new(
            "minimal",
            "https://s3.amazonaws.com/rds.nsrl.nist.gov/RDS/current/rds_modernm.zip",
            "rds_modernm/NSRLFile.txt",
        ),
        SourceEntry::new(
            "android",
            "https://s3.amazonaws.com/rds.nsrl.nist.gov/RDS/current/RDS_android.iso",
            "NSRLFile.txt",
        ),
    ]
}

/// Config file path: `~/.config/nsrl-sync/sources.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nsrl-sync").join("sources.toml"))
}

/// Load config from `explicit`, else from the default location, else fall
/// back to the built-in defaults. A file that exists but cannot be read
/// or parsed is an error, never replaced by defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigurationError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(AppConfig::default()),
        },
    };

    let file_error = |message: String| ConfigurationError::File {
        path: path.clone(),
        message,
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| file_error(e.to_string()))?;
    toml::from_str(&contents).map_err(|e| file_error(e.to_string()))
}
