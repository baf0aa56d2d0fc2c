//! Binding Error Types
//!
//! Every failure a script can observe is one of the variants below. The
//! Display text of each variant starts with its code name, so Lua code can
//! match on `tostring(err):find("UseAfterDispose")`.

use std::path::PathBuf;

use luaclang_engine::EngineError;
use thiserror::Error;

use crate::handle::HandleTag;

/// Binding errors
#[derive(Debug, Error)]
pub enum BindingError {
    /// Source path is missing or not a readable file
    #[error("FileNotFound: cannot open source file '{}'", path.display())]
    FileNotFound { path: PathBuf },

    /// The engine could not set up an index
    #[error("IndexCreationFailed: {0}")]
    IndexCreationFailed(String),

    /// The engine produced no translation unit
    #[error("ParseFailed: '{}': {reason}", path.display())]
    ParseFailed { path: PathBuf, reason: String },

    /// Operation on a disposed parser, or on a handle derived from one
    #[error("UseAfterDispose: {what} belongs to a disposed parser")]
    UseAfterDispose { what: &'static str },

    /// A handle of the wrong kind was passed
    #[error("TypeMismatch: expected {expected} handle, got {found}")]
    TypeMismatch { expected: HandleTag, found: HandleTag },

    /// An argument is not a handle, or not of the expected Lua type
    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),

    /// The handle exists but its kind does not support the operation
    #[error("PreconditionViolated: {operation} requires {requirement}, got {actual}")]
    PreconditionViolated {
        operation: &'static str,
        requirement: &'static str,
        actual: String,
    },

    /// 1-based index outside `1..=count`
    #[error("IndexOutOfRange: index {index} is outside 1..{count}")]
    IndexOutOfRange { index: i64, count: usize },

    /// A visitor returned something other than a directive
    #[error("InvalidVisitorResult: visitor returned {0}, expected \"continue\", \"recurse\" or \"break\"")]
    InvalidVisitorResult(String),
}

impl BindingError {
    /// Taxonomy name of the error
    pub fn code(&self) -> &'static str {
        match self {
            BindingError::FileNotFound { .. } => "FileNotFound",
            BindingError::IndexCreationFailed(_) => "IndexCreationFailed",
            BindingError::ParseFailed { .. } => "ParseFailed",
            BindingError::UseAfterDispose { .. } => "UseAfterDispose",
            BindingError::TypeMismatch { .. } => "TypeMismatch",
            BindingError::InvalidArgument(_) => "InvalidArgument",
            BindingError::PreconditionViolated { .. } => "PreconditionViolated",
            BindingError::IndexOutOfRange { .. } => "IndexOutOfRange",
            BindingError::InvalidVisitorResult(_) => "InvalidVisitorResult",
        }
    }

    pub(crate) fn precondition(
        operation: &'static str,
        requirement: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        BindingError::PreconditionViolated {
            operation,
            requirement,
            actual: actual.into(),
        }
    }

    /// Translate an engine failure raised while opening `path`
    pub(crate) fn from_engine(path: PathBuf, err: EngineError) -> Self {
        match err {
            EngineError::LanguageUnavailable { .. } => {
                BindingError::IndexCreationFailed(err.to_string())
            }
            EngineError::Unreadable { .. }
            | EngineError::UnknownLanguage { .. }
            | EngineError::Aborted { .. }
            | EngineError::Syntax { .. } => BindingError::ParseFailed {
                path,
                reason: err.to_string(),
            },
        }
    }

    /// Find a binding error inside an error raised through Lua
    pub fn from_lua_error(err: &mlua::Error) -> Option<&BindingError> {
        match err {
            mlua::Error::ExternalError(inner) => inner.downcast_ref::<BindingError>(),
            mlua::Error::CallbackError { cause, .. } => Self::from_lua_error(cause),
            mlua::Error::WithContext { cause, .. } => Self::from_lua_error(cause),
            _ => None,
        }
    }
}

impl From<BindingError> for mlua::Error {
    fn from(err: BindingError) -> Self {
        mlua::Error::external(err)
    }
}

/// Result type for binding operations
pub type BindingResult<T> = Result<T, BindingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_starts_with_code() {
        let errors = vec![
            BindingError::FileNotFound {
                path: PathBuf::from("missing.c"),
            },
            BindingError::IndexCreationFailed("abi".to_string()),
            BindingError::ParseFailed {
                path: PathBuf::from("a.c"),
                reason: "aborted".to_string(),
            },
            BindingError::UseAfterDispose { what: "cursor" },
            BindingError::TypeMismatch {
                expected: HandleTag::Cursor,
                found: HandleTag::Type,
            },
            BindingError::InvalidArgument("expected string".to_string()),
            BindingError::precondition("getNumArgs", "a FunctionDecl cursor", "VarDecl"),
            BindingError::IndexOutOfRange { index: 3, count: 2 },
            BindingError::InvalidVisitorResult("nil".to_string()),
        ];
        for err in errors {
            assert!(
                err.to_string().starts_with(err.code()),
                "{} does not start with {}",
                err,
                err.code()
            );
        }
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = BindingError::TypeMismatch {
            expected: HandleTag::Session,
            found: HandleTag::Cursor,
        };
        assert_eq!(
            err.to_string(),
            "TypeMismatch: expected parser handle, got cursor"
        );
    }

    #[test]
    fn test_engine_errors_translate() {
        let err = BindingError::from_engine(
            PathBuf::from("a.c"),
            EngineError::Aborted {
                path: PathBuf::from("a.c"),
            },
        );
        assert_eq!(err.code(), "ParseFailed");

        let err = BindingError::from_engine(
            PathBuf::from("a.c"),
            EngineError::LanguageUnavailable {
                language: "c",
                message: "incompatible".to_string(),
            },
        );
        assert_eq!(err.code(), "IndexCreationFailed");
    }

    #[test]
    fn test_lua_error_roundtrip() {
        let lua_err: mlua::Error = BindingError::UseAfterDispose { what: "parser" }.into();
        let found = BindingError::from_lua_error(&lua_err).unwrap();
        assert_eq!(found.code(), "UseAfterDispose");

        let wrapped = mlua::Error::CallbackError {
            traceback: String::new(),
            cause: std::sync::Arc::new(lua_err),
        };
        assert_eq!(
            BindingError::from_lua_error(&wrapped).map(BindingError::code),
            Some("UseAfterDispose")
        );
        assert!(BindingError::from_lua_error(&mlua::Error::runtime("boom")).is_none());
    }
}
