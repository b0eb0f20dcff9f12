//! Build information reported by `pmm-admin --version` and stored in summaries.

pub const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit the binary was built from, when provided at build time.
pub fn full_commit() -> &'static str {
    option_env!("PMM_ADMIN_FULL_COMMIT").unwrap_or("unknown")
}

/// Build timestamp, when provided at build time.
pub fn timestamp() -> &'static str {
    option_env!("PMM_ADMIN_BUILD_TIMESTAMP").unwrap_or("unknown")
}

/// Multi-line version report.
pub fn full_info() -> String {
    format!(
        "ProjectName: {}\nVersion: {}\nPMMVersion: {}\nTimestamp: {}\nFullCommit: {}\n",
        PROJECT_NAME,
        VERSION,
        VERSION,
        timestamp(),
        full_commit()
    )
}
