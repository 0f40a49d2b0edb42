use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing {0}")]
    MissingParameter(&'static str),

    #[error("Connection {0} is closed")]
    ConnectionClosed(String),

    #[error("Outbound buffer of connection {0} is full")]
    BufferFull(String),

    #[error("Write to connection {connection_id} timed out after {timeout:?}")]
    WriteTimeout {
        connection_id: String,
        timeout: Duration,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
