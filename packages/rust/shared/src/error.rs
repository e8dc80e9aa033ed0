//! Error types for researchflow.
//!
//! Library crates use [`ResearchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all researchflow operations.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    /// A required credential is absent from the process environment.
    #[error("missing credential: set the {var} environment variable")]
    MissingCredential { var: String },

    /// The pipeline was fed input it cannot work with (e.g. an empty topic).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// `decide`/`act` called before `perceive`.
    #[error("stage `{stage}` used before it perceived any input")]
    NotInitialized { stage: &'static str },

    /// A stage received a handoff value of the wrong kind.
    #[error("stage `{stage}` expected {expected} input, got {found}")]
    UnexpectedInput {
        stage: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// Article search failed (transport error, non-2xx status, bad body).
    #[error("retrieval error: {message}")]
    Retrieval {
        status: Option<u16>,
        message: String,
    },

    /// A single completion request failed.
    #[error("summarization error: {message}")]
    Summarization { message: String },

    /// Writing the output artifact failed.
    #[error("persistence error at {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error outside the output artifact.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ResearchError>;

impl ResearchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-input error from any displayable message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Create a retrieval error, optionally tagged with the HTTP status.
    pub fn retrieval(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Retrieval {
            status,
            message: msg.into(),
        }
    }

    /// Create a summarization error from any displayable message.
    pub fn summarization(msg: impl Into<String>) -> Self {
        Self::Summarization {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` raised while writing the output artifact.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a stage is expected to absorb this error and degrade its output.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Retrieval { .. } | Self::Summarization { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ResearchError::config("bad toml");
        assert_eq!(err.to_string(), "config error: bad toml");

        let err = ResearchError::MissingCredential {
            var: "OPENAI_API_KEY".into(),
        };
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let err = ResearchError::NotInitialized { stage: "intake" };
        assert!(err.to_string().contains("`intake`"));
    }

    #[test]
    fn only_retrieval_and_summarization_are_recoverable() {
        assert!(ResearchError::retrieval(Some(500), "HTTP 500").is_recoverable());
        assert!(ResearchError::summarization("no choices").is_recoverable());

        assert!(!ResearchError::invalid_input("empty topic").is_recoverable());
        assert!(!ResearchError::NotInitialized { stage: "retrieval" }.is_recoverable());
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!ResearchError::persistence("out.txt", io).is_recoverable());
    }
}
