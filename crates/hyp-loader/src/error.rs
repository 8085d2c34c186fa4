use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Cannot require {name} from {filename}")]
    CannotRequire { name: String, filename: String },

    #[error("built-in module not provided by the host: {0}")]
    BuiltinUnavailable(String),

    #[error("invalid JSON in {filename}: {reason}")]
    InvalidJson { filename: String, reason: String },

    #[error("failed to compile {filename}: {reason}")]
    Compile { filename: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),
}

pub type LoaderResult<T> = Result<T, LoaderError>;
