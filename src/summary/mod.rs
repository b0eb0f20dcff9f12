//! Diagnostic bundle ("summary archive") builder.
//!
//! The bundle is best-effort: only failing to create the output file, failing
//! to get pmm-agent status, or failing to finalize the zip abort the build.
//! Every other data source is logged and skipped (or replaced by its error
//! text) when it fails, so a partially populated archive is the normal way to
//! report partial failure.
//!
//! Layout of the archive:
//! - `client/status.json`, `client/pmm-agent-version.txt`, `client/pmm-admin-version.txt`
//! - `client/pmm-agent/...` (pmm-agent's own logs.zip)
//! - `client/pmm-agent-config.yaml`
//! - `client/vmagent-targets.{json,html}`
//! - `client/pprof/pmm-agent/...`, `server/pprof/...` with `--pprof`
//! - `server/...` (PMM Server logs.zip) unless server data is skipped

pub mod archive;
pub mod client;
pub mod pprof;
pub mod scrub;
pub mod server;
pub mod vmagent;

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::agentlocal::{AgentLocalClient, Status, StatusError};
use crate::config::Config;
use crate::http::{FetchError, Fetcher, FetcherOptions};

use self::archive::ArchiveWriter;

/// Fatal summary errors.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("cannot create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error("cannot finish {path}: {source}")]
    Finish {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Client(#[from] FetchError),
}

/// Options of one summary run.
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    /// Output archive path
    pub filename: PathBuf,
    /// Do not collect anything from PMM Server
    pub skip_server: bool,
    /// Include performance profiles
    pub pprof: bool,
}

/// Result rendered by the `summary` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryResult {
    pub filename: String,
}

impl fmt::Display for SummaryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} created.", self.filename)
    }
}

/// Shared inputs of the section assemblers.
pub struct SectionContext<'a> {
    pub config: &'a Config,
    pub fetcher: &'a Fetcher,
    pub agent: &'a AgentLocalClient,
    pub cancel: &'a CancellationToken,
}

/// Builds summary archives for one configuration.
pub struct SummaryBuilder {
    config: Config,
    fetcher: Fetcher,
    agent: AgentLocalClient,
}

impl SummaryBuilder {
    pub fn new(config: Config) -> Result<Self, SummaryError> {
        let fetcher = Fetcher::new(FetcherOptions {
            timeout: config.http_timeout,
            insecure_tls: false,
        })?;
        let agent = AgentLocalClient::new(&config, fetcher.clone());
        Ok(Self {
            config,
            fetcher,
            agent,
        })
    }

    /// Whether server-side sources are local to this process.
    pub fn on_pmm_server(&self, status: &Status) -> bool {
        self.config
            .server
            .on_pmm_server
            .unwrap_or_else(|| status.runs_on_pmm_server())
    }

    /// Write the summary archive described by `options`.
    pub async fn build(
        &self,
        cancel: &CancellationToken,
        options: &SummaryOptions,
    ) -> Result<SummaryResult, SummaryError> {
        let path = &options.filename;
        let file = File::create(path).map_err(|source| SummaryError::Create {
            path: path.clone(),
            source,
        })?;
        let mut archive = ArchiveWriter::new(file);

        let status = match self.agent.status(cancel, true).await {
            Ok(status) => status,
            Err(err) => {
                drop(archive);
                if let Err(rm) = fs::remove_file(path) {
                    tracing::debug!(path = %path.display(), error = %rm, "Cannot remove partial archive");
                }
                return Err(err.into());
            }
        };

        let cx = SectionContext {
            config: &self.config,
            fetcher: &self.fetcher,
            agent: &self.agent,
            cancel,
        };

        client::add_client_data(&mut archive, &cx, &status).await;

        if options.pprof {
            let include_server = !options.skip_server && self.on_pmm_server(&status);
            let sources = pprof::profile_sources(&self.config, &self.agent, include_server);
            let added = pprof::add_pprof_data(&mut archive, &self.fetcher, cancel, &sources).await;
            tracing::debug!(added, sources = sources.len(), "Collected profiles");
        }

        if !options.skip_server {
            self.add_server(&mut archive, cancel, &status, options.pprof)
                .await;
        }

        let mut file = archive.finish().map_err(|source| SummaryError::Finish {
            path: path.clone(),
            source,
        })?;
        file.flush()
            .and_then(|_| file.sync_all())
            .map_err(|source| SummaryError::Write {
                path: path.clone(),
                source,
            })?;

        Ok(SummaryResult {
            filename: path.display().to_string(),
        })
    }

    async fn add_server(
        &self,
        archive: &mut ArchiveWriter<File>,
        cancel: &CancellationToken,
        status: &Status,
        pprof: bool,
    ) {
        let Some(base_url) = server::server_base_url(&self.config, status) else {
            tracing::error!("PMM Server URL is unknown, skipping server data");
            return;
        };

        let fetcher = if server::server_insecure_tls(&self.config, status) {
            match Fetcher::new(FetcherOptions {
                timeout: self.config.http_timeout,
                insecure_tls: true,
            }) {
                Ok(fetcher) => fetcher,
                Err(err) => {
                    tracing::error!(error = %err, "Cannot create PMM Server client");
                    return;
                }
            }
        } else {
            self.fetcher.clone()
        };

        server::add_server_data(archive, &fetcher, cancel, base_url, pprof).await;
    }
}
