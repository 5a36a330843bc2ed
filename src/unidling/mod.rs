pub mod app;
pub mod cluster;
#[cfg(test)]
pub mod memory_cluster;
pub mod metadata;
pub mod orchestrator;
pub mod progress;
pub mod readiness;
pub mod redirector;
pub mod scaler;
pub mod single_flight;
pub mod unidle_error;
