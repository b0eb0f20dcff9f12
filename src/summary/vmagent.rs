use std::collections::HashMap;
use std::io::{Seek, Write};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::agentlocal::{AgentInfo, LOCALHOST};
use crate::http::{FetchError, Fetcher};

use super::archive::{zip_now, ArchiveWriter};

pub const TARGETS_JSON_ENTRY: &str = "client/vmagent-targets.json";
pub const TARGETS_HTML_ENTRY: &str = "client/vmagent-targets.html";

/// Response of vmagent's `/api/v1/targets`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetsResponse {
    pub status: String,
    pub data: TargetsData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TargetsData {
    pub active_targets: Vec<Target>,
}

/// One scrape target known to vmagent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Target {
    pub labels: HashMap<String, String>,
    pub scrape_url: String,
    pub health: String,
    pub last_error: String,
}

impl TargetsResponse {
    /// Active targets whose last scrape did not succeed.
    pub fn unhealthy(&self) -> impl Iterator<Item = &Target> {
        self.data
            .active_targets
            .iter()
            .filter(|target| target.health != "up")
    }
}

/// Both target dumps of one vmagent.
#[derive(Debug)]
pub struct VmagentTargets {
    pub agent_id: String,
    pub json: Result<Vec<u8>, FetchError>,
    pub html: Result<Vec<u8>, FetchError>,
}

/// Fetch scrape targets from the first listening vmagent in `agents`.
///
/// Returns `None` when no vmagent with a listen port runs on this node.
pub async fn fetch_targets(
    fetcher: &Fetcher,
    cancel: &CancellationToken,
    agents: &[AgentInfo],
) -> Option<VmagentTargets> {
    let agent = agents
        .iter()
        .find(|agent| agent.is_vmagent() && agent.listen_port > 0)?;
    let base = format!("http://{}:{}", LOCALHOST, agent.listen_port);

    let json = fetcher
        .get(cancel, &format!("{}/api/v1/targets", base))
        .await;
    let html = fetcher
        .get_with_accept(cancel, &format!("{}/targets", base), "text/html")
        .await;

    Some(VmagentTargets {
        agent_id: agent.agent_id.clone(),
        json,
        html,
    })
}

/// Add vmagent target dumps; failed fetches are logged and left out.
pub async fn add_vmagent_targets<W: Write + Seek>(
    archive: &mut ArchiveWriter<W>,
    fetcher: &Fetcher,
    cancel: &CancellationToken,
    agents: &[AgentInfo],
) {
    let Some(targets) = fetch_targets(fetcher, cancel, agents).await else {
        tracing::debug!("No vmagent found");
        return;
    };

    let now = zip_now();
    match targets.json {
        Ok(body) => {
            log_target_health(&targets.agent_id, &body);
            archive.add_bytes(TARGETS_JSON_ENTRY, now, &body);
        }
        Err(err) => tracing::warn!(agent_id = %targets.agent_id, error = %err, "Cannot get vmagent targets"),
    }
    match targets.html {
        Ok(body) => archive.add_bytes(TARGETS_HTML_ENTRY, now, &body),
        Err(err) => tracing::warn!(agent_id = %targets.agent_id, error = %err, "Cannot get vmagent targets page"),
    }
}

fn log_target_health(agent_id: &str, body: &[u8]) {
    let response: TargetsResponse = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(agent_id, error = %err, "Cannot decode vmagent targets");
            return;
        }
    };

    let total = response.data.active_targets.len();
    let down: Vec<&Target> = response.unhealthy().collect();
    if down.is_empty() {
        tracing::debug!(agent_id, total, "All vmagent targets are up");
        return;
    }

    tracing::warn!(agent_id, down = down.len(), total, "Some vmagent targets are down");
    for target in down {
        tracing::debug!(
            url = %target.scrape_url,
            health = %target.health,
            error = %target.last_error,
            "vmagent target is down"
        );
    }
}
