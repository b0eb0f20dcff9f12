//! Path utilities for pmm-admin files

use std::path::PathBuf;

/// Get the pmm-admin data directory (~/.pmm-admin)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".pmm-admin"))
        .unwrap_or_else(|| PathBuf::from(".pmm-admin"))
}

/// Get the config file path (~/.pmm-admin/config.toml)
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}
