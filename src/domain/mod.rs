// Domain layer - Sensor channels, derived state and classification rules
pub mod channel;
pub mod classifier;
pub mod connection;
pub mod dashboard;
pub mod history;
pub mod reading_log;
pub mod telemetry;
