// Live sensor dashboard: MQTT ingestion and derived state for rendering
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
