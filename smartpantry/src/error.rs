//! Error types for Smart Pantry
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized for the host shell.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("List not found: {0}")]
    ListNotFound(String),

    #[error("Corrupt list snapshot: {0}")]
    CorruptList(String),

    #[error("Malformed timer payload: {0}")]
    MalformedPayload(String),

    #[error("Timer error: {0}")]
    Timer(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Generic(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
