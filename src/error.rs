use roster_vision::GridError;
use std::time::Duration;

/// Failures that make a screenshot unusable as a whole.
/// Anything that only affects one cell degrades that cell instead.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("No text detected in image")]
    NoTextDetected,
    #[error("No power ratings found to anchor grid")]
    NoPowerRatings,
    #[error("Text detection failed: {0:#}")]
    Ocr(anyhow::Error),
    #[error("Text detection timed out after {0:?}")]
    Timeout(Duration),
    #[error("Failed to decode screenshot: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<GridError> for ScanError {
    fn from(e: GridError) -> Self {
        match e {
            GridError::NoPowerRatings => ScanError::NoPowerRatings,
        }
    }
}
