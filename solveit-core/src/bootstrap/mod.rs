//! Bootstrap helpers used by the server binary
//!
//! - Configuration loading and validation
//! - Database pool initialization
//! - Object storage initialization

pub mod config;
pub mod database;
pub mod storage;

pub use config::{load_config, log_config_summary};
pub use database::init_database;
pub use storage::init_storage;
