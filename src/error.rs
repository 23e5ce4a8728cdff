//! Error types for the spaces-dl application.

use std::path::PathBuf;

use thiserror::Error;

use crate::task::Phase;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // API errors
    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Login subtask '{0}' not recognized and browser login is disabled")]
    UnrecognizedSubtask(String),

    #[error("@{0} is currently suspended")]
    AccountSuspended(String),

    #[error("Browser login timed out after {0} seconds")]
    LoginTimeout(u64),

    #[error("Required cookie '{0}' not found")]
    MissingCookie(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    // Resolution errors
    #[error("No media key found for space {0}; the space may be unavailable")]
    MissingMediaKey(String),

    #[error("Playlist error: {0}")]
    Playlist(String),

    // Download errors
    #[error("Failed to fetch chunk {segment}: giving up after {attempts} attempts: {message}")]
    SegmentRetriesExhausted {
        segment: String,
        attempts: u32,
        message: String,
    },

    // Assembly errors
    #[error("No downloaded chunks found in {0}")]
    EmptyChunks(PathBuf),

    #[error("Chunk missing from disk: {0}")]
    MissingChunk(String),

    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    #[error("FFmpeg not found. Please install ffmpeg and ensure it's in your PATH.")]
    FFmpegNotFound,

    // File system errors
    #[error("Invalid filename (path traversal attempt): {0}")]
    InvalidFilename(String),

    // Task lifecycle errors
    #[error("Task cancelled before the {0} phase")]
    Cancelled(Phase),

    #[error("The {0} phase has already run for this task")]
    PhaseAlreadyRun(Phase),

    #[error("The {phase} phase needs the {requires} phase to complete first")]
    PhaseOrder { phase: Phase, requires: Phase },

    #[error("{phase} phase failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<Error>,
    },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure classes used for retry decisions and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Login could not complete; never retried.
    FatalAuth,
    /// Transport-level failure that may succeed on a later attempt.
    TransientNetwork,
    /// Upstream contract violation or corrupted local state.
    FatalData,
    Config,
    Cancelled,
    Other,
}

impl Error {
    /// Attach the orchestrator phase in which this error surfaced.
    pub fn in_phase(self, phase: Phase) -> Self {
        match self {
            already @ Error::Phase { .. } => already,
            already @ Error::Cancelled(_) => already,
            other => Error::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// Classify the error, looking through phase wrappers.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Phase { source, .. } => source.class(),

            Error::Config(_) | Error::ConfigValidation { .. } | Error::MissingConfig(_) => {
                ErrorClass::Config
            }

            Error::Authentication(_)
            | Error::UnrecognizedSubtask(_)
            | Error::AccountSuspended(_)
            | Error::LoginTimeout(_)
            | Error::MissingCookie(_)
            | Error::Browser(_) => ErrorClass::FatalAuth,

            Error::Http(_) | Error::HttpStatus { .. } | Error::RateLimited(_) => {
                ErrorClass::TransientNetwork
            }

            Error::Api(_)
            | Error::MissingMediaKey(_)
            | Error::Playlist(_)
            | Error::SegmentRetriesExhausted { .. }
            | Error::EmptyChunks(_)
            | Error::MissingChunk(_)
            | Error::FFmpeg(_)
            | Error::FFmpegNotFound
            | Error::Json(_) => ErrorClass::FatalData,

            Error::Cancelled(_) => ErrorClass::Cancelled,

            _ => ErrorClass::Other,
        }
    }

    /// Whether a segment fetch failing with this error should be attempted again.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::TransientNetwork
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.class() {
            ErrorClass::Config => exit_codes::CONFIG_ERROR,
            ErrorClass::FatalAuth => exit_codes::AUTH_ERROR,
            ErrorClass::TransientNetwork | ErrorClass::FatalData => exit_codes::DOWNLOAD_ERROR,
            ErrorClass::Cancelled => exit_codes::ABORT,
            ErrorClass::Other => exit_codes::UNEXPECTED_ERROR,
        }
    }
}

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const ABORT: i32 = 1;
    pub const AUTH_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const DOWNLOAD_ERROR: i32 = 4;
    pub const UNEXPECTED_ERROR: i32 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_wrapper_keeps_class() {
        let err = Error::MissingMediaKey("1abc".into()).in_phase(Phase::Resolve);
        assert_eq!(err.class(), ErrorClass::FatalData);
        assert!(err.to_string().starts_with("Resolve phase failed"));
    }

    #[test]
    fn test_in_phase_does_not_double_wrap() {
        let err = Error::FFmpegNotFound
            .in_phase(Phase::Assemble)
            .in_phase(Phase::Cleanup);
        assert!(matches!(
            err,
            Error::Phase {
                phase: Phase::Assemble,
                ..
            }
        ));
    }

    #[test]
    fn test_transient_classification() {
        let status = Error::HttpStatus {
            status: 503,
            url: "https://cdn/x/a.ts".into(),
        };
        assert!(status.is_transient());
        assert!(!Error::Io(std::io::Error::other("disk full")).is_transient());
        assert!(!Error::AccountSuspended("someone".into()).is_transient());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            Error::AccountSuspended("someone".into())
                .in_phase(Phase::Resolve)
                .exit_code(),
            exit_codes::AUTH_ERROR
        );
        assert_eq!(Error::MissingConfig("x".into()).exit_code(), exit_codes::CONFIG_ERROR);
        assert_eq!(Error::Cancelled(Phase::Acquire).exit_code(), exit_codes::ABORT);
        assert_eq!(
            Error::EmptyChunks(PathBuf::from("chunks")).exit_code(),
            exit_codes::DOWNLOAD_ERROR
        );
    }
}
