//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ConfigOverrides;
use crate::summary::SummaryOptions;
use crate::util::default_summary_filename;

#[derive(Debug, Parser)]
#[command(name = "pmm-admin")]
#[command(about = "Administrate PMM Client", long_about = None, version)]
pub struct Cli {
    #[command(flatten)]
    pub globals: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every command.
#[derive(Debug, Clone, Args)]
pub struct GlobalFlags {
    /// Path to the pmm-admin config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Listen port of pmm-agent
    #[arg(long, global = true)]
    pub pmm_agent_listen_port: Option<u16>,

    /// PMM Server URL, overrides the one pmm-agent is connected to
    #[arg(long, global = true)]
    pub server_url: Option<String>,

    /// Skip PMM Server TLS certificate validation
    #[arg(long, global = true)]
    pub server_insecure_tls: bool,

    /// Enable JSON output
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Enable trace logging (implies debug)
    #[arg(long, global = true)]
    pub trace: bool,
}

impl GlobalFlags {
    pub fn config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            pmm_agent_listen_port: self.pmm_agent_listen_port,
            server_url: self.server_url.clone(),
            server_insecure_tls: self.server_insecure_tls,
        }
    }

    /// Default log level; `RUST_LOG` directives are added on top.
    pub fn log_level(&self) -> tracing::Level {
        if self.trace {
            tracing::Level::TRACE
        } else if self.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Fetch system data for diagnostics
    Summary(SummaryArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SummaryArgs {
    /// Summary archive filename
    #[arg(long)]
    pub filename: Option<PathBuf>,

    /// Skip fetching logs.zip from PMM Server
    #[arg(long)]
    pub skip_server: bool,

    /// Include performance profiling data
    #[arg(long)]
    pub pprof: bool,
}

impl SummaryArgs {
    pub fn to_options(&self) -> SummaryOptions {
        SummaryOptions {
            filename: self
                .filename
                .clone()
                .unwrap_or_else(|| PathBuf::from(default_summary_filename())),
            skip_server: self.skip_server,
            pprof: self.pprof,
        }
    }
}
