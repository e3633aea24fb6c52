pub mod config;
pub mod safe_display;
pub mod tracing;

pub use config::ConfigLoader;
pub use safe_display::SafeDisplay;
pub use tracing::TracingConfig;

#[cfg(test)]
test_r::enable!();
