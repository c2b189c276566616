pub mod collector;
pub mod config;
pub mod http;
pub mod metrics;
pub mod monitor;
pub mod rates;
pub mod render;
pub mod snapshot;
pub mod snapshot_log;
pub mod sources;
