use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use tokio::process::Command;

use crate::agentlocal::Status;
use crate::version;

use super::archive::{zip_now, zip_system_time, ArchiveWriter};
use super::scrub::redact_status;
use super::vmagent::add_vmagent_targets;
use super::SectionContext;

pub const STATUS_ENTRY: &str = "client/status.json";
pub const AGENT_VERSION_ENTRY: &str = "client/pmm-agent-version.txt";
pub const ADMIN_VERSION_ENTRY: &str = "client/pmm-admin-version.txt";
pub const AGENT_CONFIG_ENTRY: &str = "client/pmm-agent-config.yaml";
pub const AGENT_LOGS_DIR: &str = "client/pmm-agent";

/// Add everything known about the local PMM Client.
pub async fn add_client_data<W: Write + Seek>(
    archive: &mut ArchiveWriter<W>,
    cx: &SectionContext<'_>,
    status: &Status,
) {
    add_vmagent_targets(archive, cx.fetcher, cx.cancel, &status.agents_info).await;

    let now = zip_now();
    archive.add_bytes(STATUS_ENTRY, now, &status_json(status));

    let agent_version = match agent_version(&cx.config.pmm_agent.binary).await {
        Ok(output) => output,
        Err(err) => {
            tracing::debug!(error = %err, "Cannot get pmm-agent version");
            err.into_bytes()
        }
    };
    archive.add_bytes(AGENT_VERSION_ENTRY, now, &agent_version);
    archive.add_bytes(ADMIN_VERSION_ENTRY, now, version::full_info().as_bytes());

    match cx.agent.logs_zip(cx.cancel).await {
        Ok(data) => {
            if let Err(err) = archive.add_zip(AGENT_LOGS_DIR, &data) {
                tracing::warn!(error = %err, "Cannot read pmm-agent logs.zip");
            }
        }
        Err(err) => tracing::warn!(error = %err, "Cannot download pmm-agent logs"),
    }

    if !status.config_filepath.is_empty() {
        add_file(archive, AGENT_CONFIG_ENTRY, Path::new(&status.config_filepath));
    }
}

/// Indented status JSON with credentials removed from the server URL.
pub fn status_json(status: &Status) -> Vec<u8> {
    let mut b = serde_json::to_vec_pretty(&redact_status(status)).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "Cannot encode status");
        err.to_string().into_bytes()
    });
    b.push(b'\n');
    b
}

/// Output of `<binary> --version`, stdout followed by stderr.
///
/// On failure the error text is returned so it can be stored instead.
pub async fn agent_version(binary: &Path) -> Result<Vec<u8>, String> {
    let output = Command::new(binary)
        .arg("--version")
        .output()
        .await
        .map_err(|err| format!("{}: {}", binary.display(), err))?;

    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);
    if output.status.success() {
        Ok(combined)
    } else {
        Err(format!(
            "{}{}: {}",
            String::from_utf8_lossy(&combined),
            binary.display(),
            output.status
        ))
    }
}

/// Stream a local file into the archive, or its open error if it cannot be read.
pub fn add_file<W: Write + Seek>(archive: &mut ArchiveWriter<W>, name: &str, path: &Path) {
    match File::open(path) {
        Ok(mut file) => {
            let modified = file
                .metadata()
                .and_then(|meta| meta.modified())
                .map(zip_system_time)
                .unwrap_or_else(|_| zip_now());
            archive.add_stream(name, modified, &mut file);
        }
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "Cannot open file");
            let text = format!("open {}: {}\n", path.display(), err);
            archive.add_bytes(name, zip_now(), text.as_bytes());
        }
    }
}
