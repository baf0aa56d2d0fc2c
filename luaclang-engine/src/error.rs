//! Error types for luaclang-engine
//!
//! The engine reports *why* no translation unit was produced; the binding
//! layer decides how each case is surfaced to scripts.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from index creation and parsing
#[derive(Error, Debug)]
pub enum EngineError {
    /// The grammar could not be loaded into the parser (ABI mismatch)
    #[error("grammar for {language} could not be loaded: {message}")]
    LanguageUnavailable {
        language: &'static str,
        message: String,
    },

    /// Source could not be read
    #[error("cannot read '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No language was given and none could be inferred from the extension
    #[error("cannot infer source language of '{}'", path.display())]
    UnknownLanguage { path: PathBuf },

    /// The parser gave up (timeout or cancellation)
    #[error("parsing '{}' was aborted", path.display())]
    Aborted { path: PathBuf },

    /// Syntax errors with `keep_going` disabled
    #[error("syntax error in '{}' at {line}:{column}", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
    },
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::Syntax {
            path: PathBuf::from("broken.c"),
            line: 3,
            column: 7,
        };
        assert_eq!(err.to_string(), "syntax error in 'broken.c' at 3:7");

        let err = EngineError::UnknownLanguage {
            path: PathBuf::from("notes.txt"),
        };
        assert!(err.to_string().contains("notes.txt"));
    }

    #[test]
    fn test_unreadable_keeps_source() {
        use std::error::Error as _;

        let err = EngineError::Unreadable {
            path: PathBuf::from("gone.c"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("gone.c"));
    }
}
