/// Stageboard host: config file, logging, REST-backed store and the CLI.
pub mod cli;
pub mod config;
pub mod log_bridge;
pub mod rest_store;
