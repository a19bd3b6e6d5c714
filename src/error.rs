//! Error taxonomy for the generation pipeline.
//!
//! Notification failures are deliberately absent: the orb client swallows
//! them after logging, so they never surface as values.

use std::path::PathBuf;

/// Failures the gallery can produce.
///
/// `Config` is fatal at startup. `TextGeneration` and `Render` abort the
/// current cycle only. `StoreWrite` is the worst recoverable case — the
/// rendered image may be orphaned on disk. `NotFound` is a read-side error.
#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    /// Bad or missing artist registry, default artist, or data directory.
    #[error("config error: {0}")]
    Config(String),

    /// The chat-completions endpoint failed, timed out, or answered nonsense.
    #[error("text generation failed: {0}")]
    TextGeneration(String),

    /// The image renderer exited non-zero, timed out, or produced no file.
    #[error("render failed: {0}")]
    Render(String),

    /// The persisted piece list could not be atomically replaced.
    #[error("store write failed for {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Read of an out-of-range piece index, or of an empty store.
    #[error("piece {0} not found")]
    NotFound(usize),
}

pub type Result<T> = std::result::Result<T, GalleryError>;
