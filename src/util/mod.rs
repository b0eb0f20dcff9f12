//! Utility modules

pub mod names;
pub mod paths;

pub use names::{default_summary_filename, summary_filename};
pub use paths::config_path;
