use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TrailError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Anchor submission failed: {0}")]
    AnchorSubmit(String),

    #[error("Anchor confirmation failed: {0}")]
    AnchorConfirm(String),

    #[error("Verification fetch failed: {0}")]
    VerificationFetch(String),

    #[error("Automation engine error: {0}")]
    Engine(String),

    #[error("Execution record not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrailError>;
