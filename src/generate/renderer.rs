//! The rendering capability the generator delegates to.

use std::io;

use async_trait::async_trait;

use super::GenerationConfig;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer timed out")]
    Timeout,
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
    #[error("renderer rejected the diagram: {0}")]
    Rejected(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("image conversion failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Turns Mermaid source text into image bytes.
///
/// Implementations must be safe to share across tasks; the generator only
/// ever sees `Arc<dyn Renderer>`.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Short name for logs and generation history.
    fn name(&self) -> &'static str;

    async fn render(&self, source: &str, config: &GenerationConfig)
    -> Result<Vec<u8>, RenderError>;
}
