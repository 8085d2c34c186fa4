use hyp_types::TypeError;

/// Errors from drive and filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    /// The requested path does not exist.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// A directory operation was attempted on a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A handle was checked in that the pool does not track.
    #[error("unknown drive handle: {0}")]
    UnknownResource(String),

    /// Failure reported by a storage backend.
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error from the local filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A download was canceled before it completed.
    #[error("operation canceled")]
    Cancelled,

    /// The content key could not be parsed.
    #[error("invalid content key: {0}")]
    InvalidKey(#[from] TypeError),
}

impl DriveError {
    /// Map an I/O error for `path`, keeping not-found distinct.
    pub fn from_io(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io(err)
        }
    }

    /// Returns `true` for errors that mean "the path does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotADirectory(_))
    }
}

/// Result alias for drive operations.
pub type DriveResult<T> = Result<T, DriveError>;
