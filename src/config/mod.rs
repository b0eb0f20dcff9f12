mod settings;

pub use settings::{
    AgentConfig, Config, ConfigError, ConfigOverrides, ServerConfig, EXAMPLE_CONFIG,
    DEFAULT_PMM_MANAGED_PPROF_PORT, DEFAULT_QAN_API2_PPROF_PORT,
};
