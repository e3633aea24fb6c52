use job_master_common::SafeDisplay;
use job_master_core::JobMasterConfig;
use serde::{Deserialize, Serialize};

/// Process-level configuration: the coordination kernel's own config
/// (`JobMasterConfig`) plus the bits that only matter once it's wrapped in
/// a server (bind address, logging). Loaded the same way `CloudServiceConfig`
/// is: `ConfigLoader` layering defaults, an optional TOML file, then env.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_host: String,
    pub grpc_port: u16,
    pub job_master: JobMasterConfig,
    pub tracing: job_master_common::TracingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            grpc_port: 9091,
            job_master: JobMasterConfig::default(),
            tracing: job_master_common::TracingConfig::local_dev("job-master-server"),
        }
    }
}

impl SafeDisplay for ServerConfig {
    fn to_safe_string(&self) -> String {
        format!(
            "bind: {}:{}\n{}\n{}",
            self.bind_host,
            self.grpc_port,
            self.job_master.to_safe_string(),
            self.tracing.to_safe_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    #[test]
    fn defaults_are_loadable() {
        let config = ServerConfig::default();
        assert_eq!(config.grpc_port, 9091);
    }
}
