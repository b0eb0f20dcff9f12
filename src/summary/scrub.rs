use reqwest::Url;

use crate::agentlocal::Status;

/// Replacement for both user name and password in redacted URLs.
pub const REDACTED: &str = "xxxxx";

/// Replace credentials embedded in a URL.
///
/// Returns `None` when the URL carries no credentials or cannot be parsed.
pub fn redact_url(raw: &str) -> Option<String> {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(error = %err, "Cannot parse PMM Server URL");
            return None;
        }
    };
    if url.username().is_empty() && url.password().is_none() {
        return None;
    }
    url.set_username(REDACTED).ok()?;
    url.set_password(Some(REDACTED)).ok()?;
    Some(url.to_string())
}

/// Copy of `status` that is safe to put into an archive.
pub fn redact_status(status: &Status) -> Status {
    let mut status = status.clone();
    if let Some(server) = status.server_info.as_mut() {
        if !server.url.is_empty() {
            if let Some(redacted) = redact_url(&server.url) {
                server.url = redacted;
            }
        }
    }
    status
}
