// Application layer - Ingestion pipeline, state ownership and the session loop
pub mod dashboard_store;
pub mod decoder;
pub mod ingest_service;
pub mod session;
pub mod transport;
