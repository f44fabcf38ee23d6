//! Error types shared by every stage of a run.
//!
//! All of these are terminal: nothing is retried and a failed run never
//! writes a document.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reasons the identity provider login can fail.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The entry page did not contain the expected login form.
    #[error("login form not found")]
    LoginFormNotFound,

    /// The login POST answered with a plain 200, which is how the provider
    /// rejects credentials.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Any other status along the login redirect chain.
    #[error("unexpected login response (HTTP {status})")]
    UnexpectedResponse { status: StatusCode },
}

/// Why a single page could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("HTTP {0}")]
    Status(StatusCode),

    #[error("{0}")]
    Transport(#[source] Box<Error>),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("invalid book id {collection:?}: page 0 does not exist")]
    InvalidCollection { collection: String },

    #[error("could not get page {page}: {cause}")]
    Fetch { page: u32, cause: FetchCause },

    #[error("no output file specified")]
    Destination,

    #[error("invalid page range {first}..={last} for a book with {count} pages")]
    InvalidRange { first: u32, last: u32, count: u32 },

    #[error("invalid discovery tuning: {0}")]
    InvalidTuning(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode image for page {page}: {source}")]
    Image {
        page: u32,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to build PDF: {0}")]
    Pdf(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
