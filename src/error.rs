//! Error types for the version checker skill.

/// Top-level error type for the skill.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    /// Skill configuration could not be loaded or saved.
    #[error("config error: {0}")]
    Config(String),

    /// Host settings store read/write error.
    #[error("settings error: {0}")]
    Settings(String),

    /// Release feed fetch error (network, HTTP status, body).
    #[error("release feed error: {0}")]
    Release(String),

    /// Version string or stored ceiling could not be parsed or encoded.
    #[error("version error: {0}")]
    Version(String),

    /// Host message bus connection or protocol error.
    #[error("bus error: {0}")]
    Bus(String),

    /// Internal channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SkillError>;
