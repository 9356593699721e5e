//! Error kinds at the detect/annotate boundary.
//!
//! Detection failures and rendering failures are kept apart so the caller can
//! tell which half of the pipeline broke. Neither is retried here.

use thiserror::Error;

/// The detection step could not complete.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to decode input image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("model inference failed: {0:#}")]
    Model(anyhow::Error),

    #[error("detector model lock poisoned")]
    ModelPoisoned,
}

/// The annotation step could not complete.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to decode image for drawing: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode annotated image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Failure of a full detect-then-annotate pass.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl PipelineError {
    pub fn is_inference(&self) -> bool {
        matches!(self, PipelineError::Inference(_))
    }

    pub fn is_render(&self) -> bool {
        matches!(self, PipelineError::Render(_))
    }
}
