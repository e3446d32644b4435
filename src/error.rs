use thiserror::Error;

/// Errors raised by the session lifecycle and signaling core
#[derive(Debug, Error)]
pub enum SessionError {
    /// Signaling input is missing a required field or is not valid JSON
    #[error("invalid offer: {0}")]
    InvalidOffer(String),

    /// A session id was registered twice. Ids are assigned by the connection
    /// layer, so this is an internal invariant violation.
    #[error("session {0} is already registered")]
    DuplicateSession(String),

    /// Another negotiation is already in flight for this session
    #[error("session {0} is already renegotiating, retry later")]
    RenegotiationConflict(String),

    /// The server is tearing down and no longer accepts offers
    #[error("server is shutting down")]
    ShuttingDown,

    #[error("session {0} not found")]
    NotFound(String),

    /// Failure reported by the connection layer during negotiation
    #[error("connection error: {0:#}")]
    Connection(#[from] anyhow::Error),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
