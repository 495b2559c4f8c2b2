//! Shared error type across freestream crates.

use thiserror::Error;

/// Stable error codes, suitable for logs and for replies to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input or configuration.
    BadRequest,
    /// Missing or duplicate session id at open time.
    SessionConflict,
    /// No live session for the given id.
    SessionNotFound,
    /// A listener handler refused the session.
    SessionRejected,
    /// The underlying connection failed.
    Transport,
    /// A listener handler failed.
    Handler,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ClientCode {
    /// String representation used in logs and JSON replies.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::SessionConflict => "SESSION_CONFLICT",
            ClientCode::SessionNotFound => "SESSION_NOT_FOUND",
            ClientCode::SessionRejected => "SESSION_REJECTED",
            ClientCode::Transport => "TRANSPORT",
            ClientCode::Handler => "HANDLER",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, FreestreamError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum FreestreamError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("missing sessionId")]
    MissingSessionId,
    #[error("session already registered: {0}")]
    DuplicateSession(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("session rejected by listener: {0}")]
    SessionRejected(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("handler failed: {0}")]
    Handler(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl FreestreamError {
    /// Map internal error to a stable code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            FreestreamError::BadRequest(_) => ClientCode::BadRequest,
            FreestreamError::MissingSessionId | FreestreamError::DuplicateSession(_) => {
                ClientCode::SessionConflict
            }
            FreestreamError::SessionNotFound(_) => ClientCode::SessionNotFound,
            FreestreamError::SessionRejected(_) => ClientCode::SessionRejected,
            FreestreamError::Transport(_) => ClientCode::Transport,
            FreestreamError::Handler(_) => ClientCode::Handler,
            FreestreamError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            FreestreamError::Internal(_) => ClientCode::Internal,
        }
    }

    /// True for the open-time conflicts (absent or already registered id).
    pub fn is_session_conflict(&self) -> bool {
        self.client_code() == ClientCode::SessionConflict
    }
}
