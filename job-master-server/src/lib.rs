//! Outward process wiring for the job master: server-level configuration,
//! wire request/response types, the error boundary onto `tonic::Status`,
//! and service bootstrap. The coordination kernel itself lives in
//! `job_master_core`; this crate only dresses it for a process.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod wire;

pub use bootstrap::Services;
pub use config::ServerConfig;

#[cfg(test)]
test_r::enable!();
