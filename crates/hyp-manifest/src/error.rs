use hyp_drive::DriveError;
use hyp_types::TypeError;

/// Errors from manifest loading and entry-point resolution.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// No `hyperspace.json` at the base location.
    #[error("manifest not found at {0}")]
    ManifestNotFound(String),

    /// The manifest is not a valid JSON document of the expected shape.
    #[error("invalid manifest: {0}")]
    ManifestInvalid(String),

    /// Neither the manifest nor an index file names an entry point.
    #[error("no entry point found at {0}")]
    NoEntryPoint(String),

    /// The base URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] TypeError),

    /// Storage failure other than not-found.
    #[error("drive error: {0}")]
    Drive(#[from] DriveError),
}

/// Result alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;
