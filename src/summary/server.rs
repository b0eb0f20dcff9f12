use std::io::{Seek, Write};

use tokio_util::sync::CancellationToken;

use crate::agentlocal::Status;
use crate::config::Config;
use crate::http::Fetcher;

use super::archive::ArchiveWriter;

/// Archive directory mirroring the server's own logs.zip.
pub const SERVER_DIR: &str = "server";

/// PMM Server base URL: the configured one, else the one pmm-agent uses.
pub fn server_base_url<'a>(config: &'a Config, status: &'a Status) -> Option<&'a str> {
    config
        .server
        .url
        .as_deref()
        .or_else(|| status.server_info.as_ref().map(|info| info.url.as_str()))
        .filter(|url| !url.is_empty())
}

/// Whether TLS verification should be skipped when talking to PMM Server.
pub fn server_insecure_tls(config: &Config, status: &Status) -> bool {
    config.server.insecure_tls
        || status
            .server_info
            .as_ref()
            .map(|info| info.insecure_tls)
            .unwrap_or(false)
}

/// Server logs bundle URL; pmm-managed answers 423 while another pprof run is in progress.
pub fn logs_url(base_url: &str, pprof: bool) -> String {
    format!(
        "{}/v1/server/logs.zip?pprof={}",
        base_url.trim_end_matches('/'),
        pprof
    )
}

/// Download PMM Server's `/v1/server/logs.zip` and copy its files under `server/`.
///
/// Failures are logged and leave the archive without server entries.
pub async fn add_server_data<W: Write + Seek>(
    archive: &mut ArchiveWriter<W>,
    fetcher: &Fetcher,
    cancel: &CancellationToken,
    base_url: &str,
    pprof: bool,
) {
    let data = match fetcher.get(cancel, &logs_url(base_url, pprof)).await {
        Ok(data) => data,
        Err(err) => {
            tracing::error!(error = %err, "Cannot download PMM Server logs");
            return;
        }
    };

    match archive.add_zip(SERVER_DIR, &data) {
        Ok(count) => tracing::debug!(count, "Added PMM Server logs"),
        Err(err) => tracing::error!(error = %err, "Cannot read PMM Server logs.zip"),
    }
}
