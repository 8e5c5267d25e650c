use thiserror::Error;

use studymate_chat::ChatError;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("generation failed: {0}")]
    Generation(#[from] ChatError),
    #[error("the model returned an empty {0}")]
    EmptyReply(&'static str),
    #[error("no {0} could be read from the model reply")]
    Unparsable(&'static str),
}

impl ToolError {
    /// True when the generation server could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ToolError::Generation(e) if e.is_unavailable())
    }
}

pub type Result<T, E = ToolError> = std::result::Result<T, E>;
