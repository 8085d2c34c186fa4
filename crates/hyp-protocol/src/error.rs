use hyp_drive::DriveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("cannot resolve {name} from {filename}")]
    ResolutionFailed { name: String, filename: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("drive error: {0}")]
    Drive(#[from] DriveError),
}

impl ProtocolError {
    /// Errors a handler answers with 404 rather than a server error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ResolutionFailed { .. } => true,
            Self::Drive(e) => e.is_not_found(),
            Self::InvalidRequest(_) => false,
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
