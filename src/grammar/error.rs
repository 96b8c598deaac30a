//! Errors surfaced by the grammar engine.
//!
//!     Lexical mismatches, unterminated blocks and inconsistent element trees are all
//!     recovered locally and never show up here. What remains are setup errors (a rule that
//!     does not compile, a language nobody registered, a broken configuration layer) and the
//!     I/O and size errors of the caller-side tooling.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("invalid token pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no grammar registered for `{0}`")]
    UnknownLanguage(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input is {size} bytes, limit is {limit}")]
    InputTooLarge { size: usize, limit: usize },

    #[error("failed to render {format} output: {message}")]
    Render { format: String, message: String },

    #[error("unknown output format `{0}`")]
    UnknownFormat(String),
}

pub type Result<T, E = GrammarError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = GrammarError::UnknownLanguage("cobol".into());
        assert_eq!(err.to_string(), "no grammar registered for `cobol`");

        let err = GrammarError::InputTooLarge {
            size: 10,
            limit: 5,
        };
        assert_eq!(err.to_string(), "input is 10 bytes, limit is 5");
    }

    #[test]
    fn test_invalid_pattern_keeps_source() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = GrammarError::InvalidPattern {
            pattern: "(".into(),
            source,
        };
        assert!(err.to_string().starts_with("invalid token pattern `(`"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
