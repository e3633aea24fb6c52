use crate::safe_display::SafeDisplay;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Structured-logging configuration: a `TracingConfig` value that is part
/// of the service config and can be constructed with sane local-dev
/// defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TracingConfig {
    pub service_name: String,
    pub json: bool,
    /// `tracing_subscriber::EnvFilter` directive string, e.g. "info,job_master_core=debug".
    pub filter: String,
}

impl TracingConfig {
    pub fn local_dev(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            json: false,
            filter: "info".to_string(),
        }
    }

    /// Installs a global `tracing` subscriber. Safe to call once at process
    /// startup; a second call returns an error which callers should log and
    /// ignore (repeated init happens routinely when tests share a process).
    pub fn init(&self) -> Result<(), tracing_subscriber::util::TryInitError> {
        let env_filter = EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new("info"));

        if self.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::local_dev("job-master")
    }
}

impl SafeDisplay for TracingConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "service name: {}", self.service_name);
        let _ = writeln!(&mut result, "json: {}", self.json);
        let _ = writeln!(&mut result, "filter: {}", self.filter);
        result
    }
}
