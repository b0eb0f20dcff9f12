//! Summary archive file naming

use chrono::{DateTime, Local, TimeZone};

/// Build `summary_<host>_<timestamp>.zip`, with dots in the host name
/// replaced so the name has a single extension.
pub fn summary_filename<Tz: TimeZone>(hostname: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "summary_{}_{}.zip",
        hostname.replace('.', "_"),
        now.format("%Y_%m_%d_%H_%M_%S")
    )
}

/// Default summary file name for this host at the current time.
pub fn default_summary_filename() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_default();
    summary_filename(&host, &Local::now())
}
