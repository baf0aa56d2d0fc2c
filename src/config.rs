//! Parser options
//!
//! The optional table passed to `luaclang.newParser(path, options)`. Keys are
//! camelCase; unknown keys are rejected so typos do not silently fall back to
//! defaults.

use luaclang_engine::{IndexOptions, ParseOptions, SourceLanguage};
use mlua::{Lua, LuaSerdeExt, Value};
use serde::Deserialize;

use crate::error::{BindingError, BindingResult};

/// Options for one parser session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SessionOptions {
    /// `"c"` or `"c++"`; inferred from the file extension when absent
    pub language: Option<SourceLanguage>,
    pub exclude_declarations_from_pch: bool,
    /// Log syntax diagnostics at warn level
    pub display_diagnostics: bool,
    pub detailed_preprocessing_record: bool,
    pub skip_function_bodies: bool,
    /// Accept sources with syntax errors
    pub keep_going: bool,
    /// Parse time limit, 0 for none
    pub timeout_micros: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            language: None,
            exclude_declarations_from_pch: false,
            display_diagnostics: false,
            detailed_preprocessing_record: false,
            skip_function_bodies: false,
            keep_going: true,
            timeout_micros: 0,
        }
    }
}

impl SessionOptions {
    /// Read options from a Lua value: `nil` or a table
    pub fn from_lua(lua: &Lua, value: Value) -> BindingResult<Self> {
        match value {
            Value::Nil => Ok(Self::default()),
            Value::Table(ref table) if table.is_empty() => Ok(Self::default()),
            Value::Table(_) => lua
                .from_value(value)
                .map_err(|e| BindingError::InvalidArgument(format!("bad parser options: {}", e))),
            other => Err(BindingError::InvalidArgument(format!(
                "parser options must be a table, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            exclude_declarations_from_pch: self.exclude_declarations_from_pch,
            display_diagnostics: self.display_diagnostics,
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            language: self.language,
            detailed_preprocessing_record: self.detailed_preprocessing_record,
            skip_function_bodies: self.skip_function_bodies,
            keep_going: self.keep_going,
            timeout_micros: self.timeout_micros,
        }
    }
}
