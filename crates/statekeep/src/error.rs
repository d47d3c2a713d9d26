//! Error types for session-state operations.

use crate::token::Token;

/// Error type for session-state operations.
///
/// A lookup miss is never an error; those surface as `None` or an empty
/// attribute list.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store already holds its configured maximum of live entries.
    #[error("State could not be cached: store is full ({max_sessions} entries)")]
    AdmissionDenied { max_sessions: usize },

    /// Another live entry already uses this token.
    #[error("State token already in use: {0}")]
    DuplicateToken(Token),

    /// Failed to parse the `[state]` TOML section.
    #[error("Failed to parse state config: {0}")]
    Config(#[from] toml::de::Error),

    /// The configuration parsed but cannot be used.
    #[error("Invalid state config: {0}")]
    InvalidConfig(String),
}

/// Result type for session-state operations.
pub type Result<T> = std::result::Result<T, Error>;
