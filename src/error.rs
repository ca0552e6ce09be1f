use thiserror::Error;

/// Failure of any operation against the hosted store or auth service.
///
/// Carried by value through the UI event channel, so every variant holds
/// owned strings rather than the transport's error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response was malformed: {0}")]
    Decode(String),
    #[error("{table} row `{id}` not found")]
    NotFound { table: &'static str, id: String },
    #[error("not signed in")]
    Unauthenticated,
    #[error("{0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}
