pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod repository;
pub mod storage;
pub mod transaction;

pub use config::Config;
pub use error::{Error, Result};
pub use transaction::UnitOfWork;
