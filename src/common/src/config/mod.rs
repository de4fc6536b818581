use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use regex::Regex;

/// Default config file looked up in the working directory.
pub const CONFIG_FILE: &str = "kube-workloads.toml";

/// Prefix for environment overrides, nested keys split on `__`.
pub const ENV_PREFIX: &str = "KUBE_WORKLOADS__";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid datasource pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no datasource matches pattern '{0}'")]
    NoMatchingDatasource(String),
}

/// A named Prometheus-compatible endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasourceEntry {
    pub name: String,
    pub url: String,
}

/// Datasource registry plus the name pattern used to pick from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasourcesConfig {
    /// Regex matched against datasource names
    pub pattern: String,
    /// Known datasources
    pub sources: Vec<DatasourceEntry>,
}

impl Default for DatasourcesConfig {
    fn default() -> Self {
        Self {
            pattern: String::from("prometheus"),
            sources: vec![DatasourceEntry {
                name: String::from("prometheus"),
                url: String::from("http://localhost:9090"),
            }],
        }
    }
}

impl DatasourcesConfig {
    /// All datasources whose name matches the configured pattern, in
    /// declaration order.
    pub fn matching(&self) -> Result<Vec<&DatasourceEntry>, ConfigError> {
        let re = Regex::new(&self.pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: self.pattern.clone(),
            source,
        })?;

        Ok(self
            .sources
            .iter()
            .filter(|ds| re.is_match(&ds.name))
            .collect())
    }

    /// The first matching datasource; this is what the `datasource` variable
    /// starts out as.
    pub fn default_datasource(&self) -> Result<&DatasourceEntry, ConfigError> {
        self.matching()?
            .into_iter()
            .next()
            .ok_or_else(|| ConfigError::NoMatchingDatasource(self.pattern.clone()))
    }

    pub fn url_for(&self, name: &str) -> Option<&str> {
        self.sources
            .iter()
            .find(|ds| ds.name == name)
            .map(|ds| ds.url.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Per-request HTTP timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Resolution step for range queries
    #[serde(with = "humantime_serde")]
    pub step: Duration,
    /// Width of the default time range ending at "now"
    #[serde(with = "humantime_serde")]
    pub lookback: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            step: Duration::from_secs(60),
            lookback: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    /// Rows per page in workload tables
    pub page_size: usize,
    /// Interval at which the primary queries are re-run
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            refresh_interval: Duration::from_secs(30),
        }
    }
}

/// Initial values for the scope variables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub cluster: String,
    /// Regex over namespaces
    pub namespace: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            cluster: String::new(),
            namespace: String::from(".*"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// File receiving log output while the terminal UI owns stdout
    pub file: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    pub datasources: DatasourcesConfig,
    pub query: QueryConfig,
    pub table: TableConfig,
    pub scope: ScopeConfig,
    pub logging: LoggingConfig,
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(CONFIG_FILE))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(path))
    }

    fn figment(file: figment::providers::Data<Toml>) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}
