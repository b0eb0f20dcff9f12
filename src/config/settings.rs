use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::agentlocal::{DEFAULT_LISTEN_PORT, LOCALHOST};
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Default pmm-managed pprof port on PMM Server.
pub const DEFAULT_PMM_MANAGED_PPROF_PORT: u16 = 7773;
/// Default qan-api2 pprof port on PMM Server.
pub const DEFAULT_QAN_API2_PPROF_PORT: u16 = 9933;

/// Error loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Application configuration.
///
/// Built once per invocation (defaults, then the TOML file, then CLI flags)
/// and handed to everything that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local pmm-agent settings
    pub pmm_agent: AgentConfig,
    /// PMM Server settings
    pub server: ServerConfig,
    /// Timeout for every HTTP request
    pub http_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Address of the pmm-agent local API
    pub listen_address: String,
    /// Port of the pmm-agent local API
    pub listen_port: u16,
    /// pmm-agent binary used for `--version`
    pub binary: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PMM Server URL; when unset, the URL known to pmm-agent is used
    pub url: Option<String>,
    /// Skip TLS certificate validation even if pmm-agent does not
    pub insecure_tls: bool,
    /// Force co-location with PMM Server on or off instead of detecting it
    pub on_pmm_server: Option<bool>,
    /// Host serving the server-side pprof handlers
    pub pprof_host: String,
    pub pmm_managed_pprof_port: u16,
    pub qan_api2_pprof_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pmm_agent: AgentConfig {
                listen_address: LOCALHOST.to_string(),
                listen_port: DEFAULT_LISTEN_PORT,
                binary: PathBuf::from("pmm-agent"),
            },
            server: ServerConfig {
                url: None,
                insecure_tls: false,
                on_pmm_server: None,
                pprof_host: LOCALHOST.to_string(),
                pmm_managed_pprof_port: DEFAULT_PMM_MANAGED_PPROF_PORT,
                qan_api2_pprof_port: DEFAULT_QAN_API2_PPROF_PORT,
            },
            // CPU profiles alone take 60 seconds.
            http_timeout: Duration::from_secs(120),
        }
    }
}

/// TOML representation of the `[pmm_agent]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlAgentConfig {
    pub listen_address: Option<String>,
    pub listen_port: Option<u16>,
    pub binary: Option<PathBuf>,
}

/// TOML representation of the `[server]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlServerConfig {
    pub url: Option<String>,
    pub insecure_tls: Option<bool>,
    pub on_pmm_server: Option<bool>,
    pub pprof_host: Option<String>,
    pub pmm_managed_pprof_port: Option<u16>,
    pub qan_api2_pprof_port: Option<u16>,
}

/// TOML representation of the `[http]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlHttpConfig {
    pub timeout_secs: Option<u64>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub pmm_agent: Option<TomlAgentConfig>,
    pub server: Option<TomlServerConfig>,
    pub http: Option<TomlHttpConfig>,
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub pmm_agent_listen_port: Option<u16>,
    pub server_url: Option<String>,
    pub server_insecure_tls: bool,
}

impl Config {
    /// Load configuration, merging the config file over defaults.
    ///
    /// An explicit `path` must exist. Without one, the default
    /// `~/.pmm-admin/config.toml` is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config_file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (config_path(), false),
        };

        if !required && !config_file.exists() {
            tracing::debug!(path = %config_file.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&config_file).map_err(|source| ConfigError::Read {
            path: config_file.clone(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_file,
            source,
        })
    }

    /// Parse config file contents on top of defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let toml_config: TomlConfig = toml::from_str(contents)?;
        let mut config = Config::default();
        config.merge(toml_config);
        Ok(config)
    }

    fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(agent) = toml_config.pmm_agent {
            if let Some(listen_address) = agent.listen_address {
                self.pmm_agent.listen_address = listen_address;
            }
            if let Some(listen_port) = agent.listen_port {
                self.pmm_agent.listen_port = listen_port;
            }
            if let Some(binary) = agent.binary {
                self.pmm_agent.binary = binary;
            }
        }

        if let Some(server) = toml_config.server {
            if server.url.is_some() {
                self.server.url = server.url;
            }
            if let Some(insecure_tls) = server.insecure_tls {
                self.server.insecure_tls = insecure_tls;
            }
            if server.on_pmm_server.is_some() {
                self.server.on_pmm_server = server.on_pmm_server;
            }
            if let Some(pprof_host) = server.pprof_host {
                self.server.pprof_host = pprof_host;
            }
            if let Some(port) = server.pmm_managed_pprof_port {
                self.server.pmm_managed_pprof_port = port;
            }
            if let Some(port) = server.qan_api2_pprof_port {
                self.server.qan_api2_pprof_port = port;
            }
        }

        if let Some(timeout_secs) = toml_config.http.and_then(|http| http.timeout_secs) {
            self.http_timeout = Duration::from_secs(timeout_secs);
        }
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(port) = overrides.pmm_agent_listen_port {
            self.pmm_agent.listen_port = port;
        }
        if overrides.server_url.is_some() {
            self.server.url = overrides.server_url;
        }
        if overrides.server_insecure_tls {
            self.server.insecure_tls = true;
        }
        self
    }
}
