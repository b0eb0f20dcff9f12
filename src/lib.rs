pub mod agentlocal;
pub mod cli;
pub mod config;
pub mod http;
pub mod summary;
pub mod util;
pub mod version;

pub use agentlocal::{AgentInfo, AgentLocalClient, ServerInfo, Status, StatusError};
pub use config::{Config, ConfigError};
pub use http::{FetchError, Fetcher};
pub use summary::{SummaryBuilder, SummaryError, SummaryOptions, SummaryResult};
