pub mod api;
pub mod config;
pub mod contract;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod repo;
pub mod service;
pub mod utils;

pub use config::{Config, FeatureFlags, IngestSettings};
