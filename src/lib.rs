pub mod analysis;
pub mod app;
pub mod config;
pub mod ingest;
pub mod journal;
pub mod logging;
pub mod scout;
pub mod store;
