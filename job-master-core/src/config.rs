use job_master_common::SafeDisplay;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the job master facade. Loaded through
/// `job_master_common::config::ConfigLoader<JobMasterConfig>` by the
/// server crate.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct JobMasterConfig {
    /// Maximum number of live plan coordinators (§4.G capacity N).
    pub job_capacity: usize,
    /// Minimum time a finished coordinator is kept before it is purgeable.
    #[serde(with = "humantime_serde")]
    pub finished_job_retention_time: Duration,
    /// Max finished coordinators purged per admission attempt; -1 = unlimited.
    pub finished_job_purge_count: i64,
    /// How often the lost-worker detector sweeps the worker registry.
    #[serde(with = "humantime_serde")]
    pub lost_worker_interval: Duration,
    /// How long a worker may go silent before it is considered lost.
    #[serde(with = "humantime_serde")]
    pub worker_timeout: Duration,
}

impl Default for JobMasterConfig {
    fn default() -> Self {
        Self {
            job_capacity: 100,
            finished_job_retention_time: Duration::from_secs(300),
            finished_job_purge_count: -1,
            lost_worker_interval: Duration::from_secs(30),
            worker_timeout: Duration::from_secs(120),
        }
    }
}

impl SafeDisplay for JobMasterConfig {
    fn to_safe_string(&self) -> String {
        format!(
            "JobMasterConfig {{ job_capacity: {}, finished_job_retention_time: {:?}, finished_job_purge_count: {}, lost_worker_interval: {:?}, worker_timeout: {:?} }}",
            self.job_capacity,
            self.finished_job_retention_time,
            self.finished_job_purge_count,
            self.lost_worker_interval,
            self.worker_timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    #[test]
    fn defaults_match_spec_literals() {
        let config = JobMasterConfig::default();
        assert_eq!(config.job_capacity, 100);
        assert_eq!(config.finished_job_purge_count, -1);
    }
}
