pub mod algorithm_config;
pub mod composition;
pub mod config;
pub mod constraints;
pub mod db;
pub mod engine;
pub mod logging;
pub mod scoring;
pub mod types;
pub mod usage;
