use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Wiring errors
    #[error("Missing required collaborator: {0}")]
    MissingCollaborator(String),

    // Validation errors
    #[error("Invalid card UID: {0}")]
    InvalidCardUid(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
