use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("generation backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("backend did not answer in time")]
    Timeout,
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend reported an error: {0}")]
    Remote(String),
    #[error("malformed backend reply: {0}")]
    Decode(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ChatError {
    /// True when the server could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ChatError::BackendUnavailable(_))
    }

    pub(crate) fn from_request(e: reqwest::Error) -> Self {
        if e.is_connect() {
            ChatError::BackendUnavailable(e.to_string())
        } else if e.is_timeout() {
            ChatError::Timeout
        } else {
            ChatError::Http(e)
        }
    }
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
