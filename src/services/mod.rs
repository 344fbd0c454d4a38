pub mod ingest;
pub mod reports;
pub mod retention_scheduler;
