//! Session error types.

/// Errors surfaced to the embedding application.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("an auth token is required to connect")]
    MissingToken,

    #[error("session is not connected")]
    NotConnected,

    #[error("invalid session url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("chat code must not be empty")]
    EmptyChatCode,

    #[error("chat code '{0}' must be a single path segment")]
    InvalidChatCode(String),

    #[error("actions must be JSON objects")]
    InvalidAction,

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why an inbound frame was dropped.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame 'type' is not a string")]
    InvalidType,

    #[error("unknown frame type '{0}'")]
    UnknownType(String),

    #[error("frame has neither 'type' nor 'id'")]
    Unclassified,
}
