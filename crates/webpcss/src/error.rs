use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a transform.
///
/// These come from caller supplied configuration. Problems with a single image are
/// [`ReferenceError`]s and only drop that image.
#[derive(Debug, Error)]
pub enum WebpCssError {
  #[error("Invalid options: {0}")]
  Options(#[from] serde_json::Error),

  #[error("Invalid replace_from pattern: {0}")]
  Pattern(#[from] regex::Error),

  #[error("replace_to failed for {url}: {source}")]
  ReplaceTo {
    url: String,
    #[source]
    source: anyhow::Error,
  },

  #[error("localImgFileLocator failed for {url}: {source}")]
  Locator {
    url: String,
    #[source]
    source: anyhow::Error,
  },

  #[error("Image task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// Reasons an image reference is left untouched
#[derive(Debug, Error)]
pub enum ReferenceError {
  #[error("{0} can only be located with a localImgFileLocator")]
  Unresolvable(String),

  #[error("Failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Image is {size} bytes, below minAddClassFileSize of {min_size}")]
  TooSmall { size: u64, min_size: u64 },

  #[error("Data URI has no base64 payload")]
  NotBase64,

  #[error("Invalid base64 payload: {0}")]
  Base64(#[from] base64::DecodeError),

  #[error("Failed to encode webp: {0}")]
  Encode(#[source] anyhow::Error),
}
