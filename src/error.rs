//! Unified error type.

use http::StatusCode;
use thiserror::Error;

/// The error type returned by deft's fallible operations.
///
/// Missing input is never an error: absent keys resolve to the caller's
/// default or `None`. This type surfaces infrastructure failures (binding,
/// reading a body) and coercions the caller explicitly opted into
/// (`boolean`, `date` with a format).
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("could not parse `{value}` as a date using `{format}`")]
    DateParse { value: String, format: String },
}

impl Error {
    /// The status a handler's `?` turns this error into.
    ///
    /// Coercion failures are the client's input: `422`. Body failures are
    /// `400`/`413`. Everything else is a server fault.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) | Self::DateParse { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Io(_) | Self::InvalidAddress(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
