use thiserror::Error;

/// Top-level error type for Hermes.
#[derive(Debug, Error)]
pub enum HermesError {
    /// Socket / connection lifecycle error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Credential or key persistence error.
    #[error("auth error: {0}")]
    Auth(String),

    /// Entity cache or snapshot error.
    #[error("store error: {0}")]
    Store(String),

    /// Error raised by a command module.
    #[error("module error: {0}")]
    Module(String),

    /// Error from an outbound channel (Telegram mirror).
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
