pub mod analyzers;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod loader;
pub mod output;
