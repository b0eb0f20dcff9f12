use std::io::{Seek, Write};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::agentlocal::AgentLocalClient;
use crate::config::Config;
use crate::http::{FetchError, Fetcher};

use super::archive::{zip_now, ArchiveWriter};

/// One kind of profile and where it lives under a pprof base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileKind {
    pub file_name: &'static str,
    pub url_path: &'static str,
}

/// Profiles collected from every source, one kind at a time.
pub const PROFILE_KINDS: [ProfileKind; 3] = [
    ProfileKind {
        file_name: "profile.pb.gz",
        url_path: "/profile?seconds=60",
    },
    ProfileKind {
        file_name: "heap.pb.gz",
        url_path: "/heap?gc=1",
    },
    ProfileKind {
        file_name: "trace.out",
        url_path: "/trace?seconds=10",
    },
];

/// A process exposing pprof handlers; `label` is its directory in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSource {
    pub label: String,
    pub base_url: String,
}

/// Outcome of fetching one profile from one source.
#[derive(Debug)]
pub struct PprofFetch {
    pub entry_name: String,
    pub outcome: Result<Vec<u8>, FetchError>,
}

/// Sources to profile, sorted by label.
///
/// pmm-agent is always included; pmm-managed and qan-api2 only with `include_server`.
pub fn profile_sources(
    config: &Config,
    agent: &AgentLocalClient,
    include_server: bool,
) -> Vec<ProfileSource> {
    let mut sources = vec![ProfileSource {
        label: "client/pprof/pmm-agent".to_string(),
        base_url: agent.pprof_url(),
    }];

    if include_server {
        let host = &config.server.pprof_host;
        sources.push(ProfileSource {
            label: "server/pprof/pmm-managed".to_string(),
            base_url: format!(
                "http://{}:{}/debug/pprof",
                host, config.server.pmm_managed_pprof_port
            ),
        });
        sources.push(ProfileSource {
            label: "server/pprof/qan-api2".to_string(),
            base_url: format!(
                "http://{}:{}/debug/pprof",
                host, config.server.qan_api2_pprof_port
            ),
        });
    }

    sources.sort_by(|a, b| a.label.cmp(&b.label));
    sources
}

/// Fetch one profile kind from all sources in parallel.
///
/// Every worker sends exactly one result on a channel sized to the number of
/// sources, so no worker ever waits on the channel. Results are read only after
/// all workers finished, in arrival order.
pub async fn fetch_kind(
    fetcher: &Fetcher,
    cancel: &CancellationToken,
    sources: &[ProfileSource],
    kind: ProfileKind,
) -> Vec<PprofFetch> {
    let (tx, mut rx) = mpsc::channel(sources.len().max(1));
    let mut workers = JoinSet::new();

    for source in sources {
        let tx = tx.clone();
        let fetcher = fetcher.clone();
        let cancel = cancel.clone();
        let url = format!("{}{}", source.base_url, kind.url_path);
        let entry_name = format!("{}/{}", source.label, kind.file_name);

        workers.spawn(async move {
            tracing::info!(%url, "Getting profile ...");
            let outcome = fetcher.get(&cancel, &url).await;
            let _ = tx.send(PprofFetch { entry_name, outcome }).await;
        });
    }
    drop(tx);

    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            tracing::error!(error = %err, "pprof worker failed");
        }
    }

    let mut results = Vec::with_capacity(sources.len());
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    results
}

/// Add every profile kind from every source; failed fetches are logged and left out.
///
/// Returns the number of profiles added.
pub async fn add_pprof_data<W: Write + Seek>(
    archive: &mut ArchiveWriter<W>,
    fetcher: &Fetcher,
    cancel: &CancellationToken,
    sources: &[ProfileSource],
) -> usize {
    let mut added = 0;
    for kind in PROFILE_KINDS {
        for result in fetch_kind(fetcher, cancel, sources, kind).await {
            match result.outcome {
                Ok(data) => {
                    archive.add_bytes(&result.entry_name, zip_now(), &data);
                    added += 1;
                }
                Err(err) => {
                    tracing::warn!(entry = %result.entry_name, error = %err, "Cannot get profile");
                }
            }
        }
    }
    added
}
