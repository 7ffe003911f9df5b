use std::time::Duration;
use thiserror::Error;

/// Failure reported by a text encoder
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncoderError {
    #[error("Encoder failed: {0}")]
    Failed(String),

    #[error("Encoder worker stopped without a result")]
    Disconnected,
}

/// Every way a caller-facing query can fail.
///
/// "No results" is never an error: an empty list is a successful answer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Entity with ID {0} not found")]
    NotFound(u64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("No titles available for matching")]
    NoCandidates,

    #[error(
        "No close match found for '{query}'. Best match was '{best_title}' with a score of {score}, which is below the cutoff of {cutoff}."
    )]
    NoMatch {
        query: String,
        best_title: String,
        score: u8,
        cutoff: u8,
    },

    #[error("Encoder did not answer within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Encoder(#[from] EncoderError),
}

impl QueryError {
    /// Stable name of the failure kind, for callers that render their own messages
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::NotFound(_) => "not_found",
            QueryError::InvalidInput(_) => "invalid_input",
            QueryError::MissingData(_) => "missing_data",
            QueryError::NoCandidates => "no_candidates",
            QueryError::NoMatch { .. } => "no_match",
            QueryError::Timeout(_) => "timeout",
            QueryError::Encoder(_) => "encoder",
        }
    }
}
