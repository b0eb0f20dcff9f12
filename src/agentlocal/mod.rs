//! Client for the local pmm-agent API.
//!
//! pmm-agent exposes its status, its own log bundle and Go pprof handlers on a
//! loopback HTTP listener (port 7777 by default).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::http::{FetchError, Fetcher};

/// Default pmm-agent local API port.
pub const DEFAULT_LISTEN_PORT: u16 = 7777;

/// Loopback address every local endpoint is reached on.
pub const LOCALHOST: &str = "127.0.0.1";

/// Agent and node ID used by the pmm-agent embedded in PMM Server.
pub const PMM_SERVER_ID: &str = "pmm-server";

/// Agent type reported for the VictoriaMetrics scrape agent.
pub const AGENT_TYPE_VM_AGENT: &str = "AGENT_TYPE_VM_AGENT";
const LEGACY_AGENT_TYPE_VM_AGENT: &str = "VM_AGENT";

/// Error retrieving or decoding pmm-agent status.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("cannot get pmm-agent status (is pmm-agent running?): {0}")]
    Fetch(#[from] FetchError),
    #[error("cannot decode pmm-agent status: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct StatusRequest {
    get_network_info: bool,
}

/// pmm-agent status as returned by `/local/Status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    pub agent_id: String,
    pub runs_on_node_id: String,
    pub node_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerInfo>,
    pub agents_info: Vec<AgentInfo>,
    pub config_filepath: String,
    pub agent_version: String,
    pub connection_uptime: f32,
}

/// PMM Server connection details known to pmm-agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    pub url: String,
    pub insecure_tls: bool,
    pub connected: bool,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock_drift: Option<String>,
}

/// One agent (exporter, QAN agent, vmagent) supervised by pmm-agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentInfo {
    pub agent_id: String,
    pub agent_type: String,
    pub status: String,
    pub listen_port: u32,
    pub process_exec_path: String,
}

impl AgentInfo {
    pub fn is_vmagent(&self) -> bool {
        self.agent_type == AGENT_TYPE_VM_AGENT || self.agent_type == LEGACY_AGENT_TYPE_VM_AGENT
    }
}

impl Status {
    /// Whether this pmm-agent is the one embedded in PMM Server.
    pub fn runs_on_pmm_server(&self) -> bool {
        self.agent_id == PMM_SERVER_ID || self.runs_on_node_id == PMM_SERVER_ID
    }
}

/// Typed access to the pmm-agent local API.
#[derive(Debug, Clone)]
pub struct AgentLocalClient {
    base_url: String,
    fetcher: Fetcher,
}

impl AgentLocalClient {
    pub fn new(config: &Config, fetcher: Fetcher) -> Self {
        Self {
            base_url: format!(
                "http://{}:{}",
                config.pmm_agent.listen_address, config.pmm_agent.listen_port
            ),
            fetcher,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL prefix of pmm-agent's pprof handlers.
    pub fn pprof_url(&self) -> String {
        format!("{}/debug/pprof", self.base_url)
    }

    /// URL of pmm-agent's own log bundle.
    pub fn logs_zip_url(&self) -> String {
        format!("{}/logs.zip", self.base_url)
    }

    /// Fetch current status, optionally asking pmm-agent to measure server latency.
    pub async fn status(
        &self,
        cancel: &CancellationToken,
        network_info: bool,
    ) -> Result<Status, StatusError> {
        let url = format!("{}/local/Status", self.base_url);
        let body = self
            .fetcher
            .post_json(
                cancel,
                &url,
                &StatusRequest {
                    get_network_info: network_info,
                },
            )
            .await?;
        let status: Status = serde_json::from_slice(&body)?;
        tracing::debug!(
            agent_id = %status.agent_id,
            node_id = %status.runs_on_node_id,
            agents = status.agents_info.len(),
            "Got pmm-agent status"
        );
        Ok(status)
    }

    /// Download pmm-agent's `logs.zip`.
    pub async fn logs_zip(&self, cancel: &CancellationToken) -> Result<Vec<u8>, FetchError> {
        self.fetcher.get(cancel, &self.logs_zip_url()).await
    }
}
