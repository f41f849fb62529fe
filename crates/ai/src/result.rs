use thiserror::Error;

/// Failure modes of the recommendation paths.
///
/// `Generation` and `MalformedResponse` mark the points where the package
/// path gives up and falls back to the deterministic scorer.
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("text generation failed: {0}")]
    Generation(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("recommendation rejected: {0}")]
    Validation(String),
}
