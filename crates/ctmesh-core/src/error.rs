//! Error types for ctmesh.

use thiserror::Error;

/// The main error type for ctmesh operations.
#[derive(Error, Debug)]
pub enum CtmeshError {
    /// The session has no series manifest on disk.
    #[error("series manifest not found for session '{0}'")]
    ManifestMissing(String),

    /// The manifest exists but could not be interpreted.
    #[error("invalid series manifest: {0}")]
    ManifestInvalid(String),

    /// The manifest resolved to zero slice files present on disk.
    #[error("series '{0}' has no resolvable slices")]
    SeriesEmpty(String),

    /// Session identifiers must be a single path component.
    #[error("invalid session id '{0}'")]
    InvalidSession(String),

    /// No usable 2D slice survived decoding.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Slices could not be assembled into a uniform volume.
    #[error("malformed volume: {0}")]
    MalformedVolume(String),

    /// The requested preset does not exist for this modality.
    #[error("unknown preset '{preset}' for modality '{modality}'")]
    UnknownPreset { preset: String, modality: String },

    /// An explicit threshold window with `min > max` or non-finite bounds.
    #[error("invalid threshold window [{min}, {max}]")]
    InvalidThreshold { min: f32, max: f32 },

    /// A record or backing artifact does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A persisted mask dump could not be decoded.
    #[error("invalid mask file: {0}")]
    InvalidMaskFile(String),

    /// Image encoding error.
    #[error("image error: {0}")]
    ImageError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for ctmesh operations.
pub type Result<T> = std::result::Result<T, CtmeshError>;
