//! Index and parse options
//!
//! An `Index` owns the native parser and produces translation units, the
//! same split libclang makes between `CXIndex` and `CXTranslationUnit`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tree_sitter::Parser;

use crate::builder;
use crate::error::{EngineError, Result};
use crate::unit::TranslationUnit;

// ============================================================================
// Languages
// ============================================================================

/// Source language of a translation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceLanguage {
    #[serde(rename = "c")]
    C,
    #[serde(rename = "c++", alias = "cpp", alias = "cxx")]
    Cpp,
}

impl SourceLanguage {
    /// Infer the language from a file extension; headers default to C
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "c" | "h" | "i" => Some(SourceLanguage::C),
            "cc" | "cpp" | "cxx" | "c++" | "C" | "hh" | "hpp" | "hxx" | "h++" | "ii" => {
                Some(SourceLanguage::Cpp)
            }
            _ => None,
        }
    }

    /// Parse a language name as accepted on the command line and in option tables
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "c" => Some(SourceLanguage::C),
            "c++" | "cpp" | "cxx" => Some(SourceLanguage::Cpp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceLanguage::C => "c",
            SourceLanguage::Cpp => "c++",
        }
    }

    fn grammar(self) -> tree_sitter::Language {
        match self {
            SourceLanguage::C => tree_sitter_c::LANGUAGE.into(),
            SourceLanguage::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Options fixed when the index is created (`clang_createIndex`)
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Accepted for libclang compatibility; there are no precompiled headers
    pub exclude_declarations_from_pch: bool,

    /// Report syntax diagnostics through `tracing` at warn level
    pub display_diagnostics: bool,
}

/// Per-parse options (`CXTranslationUnit_*` flags)
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Language override; inferred from the extension when `None`
    pub language: Option<SourceLanguage>,

    /// Emit `InclusionDirective` and `MacroDefinition` cursors
    pub detailed_preprocessing_record: bool,

    /// Do not build cursors for function bodies
    pub skip_function_bodies: bool,

    /// Produce a translation unit even if the source has syntax errors
    pub keep_going: bool,

    /// Abort parsing after this many microseconds (0 = no limit)
    pub timeout_micros: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            language: None,
            detailed_preprocessing_record: false,
            skip_function_bodies: false,
            keep_going: true,
            timeout_micros: 0,
        }
    }
}

// ============================================================================
// Index
// ============================================================================

/// Parser factory shared by the translation units of one session
pub struct Index {
    parser: Parser,
    language: SourceLanguage,
    options: IndexOptions,
}

impl Index {
    /// Create an index with the C grammar loaded
    pub fn new(options: IndexOptions) -> Result<Self> {
        let mut parser = Parser::new();
        load_grammar(&mut parser, SourceLanguage::C)?;
        Ok(Self {
            parser,
            language: SourceLanguage::C,
            options,
        })
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Parse a file from disk
    pub fn parse(&mut self, path: &Path, options: &ParseOptions) -> Result<TranslationUnit> {
        let source = std::fs::read(path).map_err(|source| EngineError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_source(path, source, options)
    }

    /// Parse in-memory source, reported under `path`
    pub fn parse_source(
        &mut self,
        path: impl Into<PathBuf>,
        source: impl Into<Vec<u8>>,
        options: &ParseOptions,
    ) -> Result<TranslationUnit> {
        let path = path.into();
        let source = source.into();

        let language = options
            .language
            .or_else(|| SourceLanguage::from_path(&path))
            .ok_or_else(|| EngineError::UnknownLanguage { path: path.clone() })?;
        if language != self.language {
            load_grammar(&mut self.parser, language)?;
            self.language = language;
        }

        #[allow(deprecated)]
        self.parser.set_timeout_micros(options.timeout_micros);
        let tree = self.parser.parse(&source, None);
        #[allow(deprecated)]
        self.parser.set_timeout_micros(0);
        let tree = tree.ok_or_else(|| {
            self.parser.reset();
            EngineError::Aborted { path: path.clone() }
        })?;

        let built = builder::build(&tree, &source, &path, language, options);
        if !options.keep_going {
            if let Some(first) = built.diagnostics.first() {
                return Err(EngineError::Syntax {
                    path,
                    line: first.line,
                    column: first.column,
                });
            }
        }

        if self.options.display_diagnostics {
            for diagnostic in &built.diagnostics {
                tracing::warn!(
                    file = %path.display(),
                    line = diagnostic.line,
                    column = diagnostic.column,
                    "{}",
                    diagnostic.message
                );
            }
        }

        tracing::debug!(
            file = %path.display(),
            language = language.name(),
            entities = built.entities.len(),
            diagnostics = built.diagnostics.len(),
            "translation unit built"
        );

        Ok(TranslationUnit::new(path, language, tree, source, built))
    }
}

fn load_grammar(parser: &mut Parser, language: SourceLanguage) -> Result<()> {
    parser
        .set_language(&language.grammar())
        .map_err(|e| EngineError::LanguageUnavailable {
            language: language.name(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::CursorKind;

    #[test]
    fn test_language_from_path() {
        assert_eq!(SourceLanguage::from_path(Path::new("a.c")), Some(SourceLanguage::C));
        assert_eq!(SourceLanguage::from_path(Path::new("a.h")), Some(SourceLanguage::C));
        assert_eq!(SourceLanguage::from_path(Path::new("a.cpp")), Some(SourceLanguage::Cpp));
        assert_eq!(SourceLanguage::from_path(Path::new("a.txt")), None);
        assert_eq!(SourceLanguage::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_language_from_name() {
        assert_eq!(SourceLanguage::from_name("C"), Some(SourceLanguage::C));
        assert_eq!(SourceLanguage::from_name("cpp"), Some(SourceLanguage::Cpp));
        assert_eq!(SourceLanguage::from_name("rust"), None);
    }

    #[test]
    fn test_default_parse_options_keep_going() {
        let options = ParseOptions::default();
        assert!(options.keep_going);
        assert!(!options.skip_function_bodies);
        assert_eq!(options.timeout_micros, 0);
    }

    #[test]
    fn test_parse_source_builds_unit() {
        let mut index = Index::new(IndexOptions::default()).unwrap();
        let unit = index
            .parse_source("add.c", "int add(int a, int b) { return a + b; }", &ParseOptions::default())
            .unwrap();
        assert_eq!(unit.kind(unit.root()), CursorKind::TranslationUnit);
        assert_eq!(unit.language(), SourceLanguage::C);
    }

    #[test]
    fn test_unknown_extension_fails() {
        let mut index = Index::new(IndexOptions::default()).unwrap();
        let err = index
            .parse_source("notes.txt", "int x;", &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownLanguage { .. }));
    }

    #[test]
    fn test_language_override() {
        let mut index = Index::new(IndexOptions::default()).unwrap();
        let options = ParseOptions {
            language: Some(SourceLanguage::C),
            ..ParseOptions::default()
        };
        let unit = index.parse_source("snippet.txt", "int x;", &options).unwrap();
        assert_eq!(unit.language(), SourceLanguage::C);
    }

    #[test]
    fn test_syntax_error_without_keep_going() {
        let mut index = Index::new(IndexOptions::default()).unwrap();
        let options = ParseOptions {
            keep_going: false,
            ..ParseOptions::default()
        };
        let err = index
            .parse_source("broken.c", "int f( { return; }", &options)
            .unwrap_err();
        assert!(matches!(err, EngineError::Syntax { .. }));

        let tolerant = index
            .parse_source("broken.c", "int f( { return; }", &ParseOptions::default())
            .unwrap();
        assert!(!tolerant.diagnostics().is_empty());
    }

    #[test]
    fn test_switching_languages() {
        let mut index = Index::new(IndexOptions::default()).unwrap();
        let cpp = index
            .parse_source("a.cpp", "namespace ns { int x; }", &ParseOptions::default())
            .unwrap();
        assert_eq!(cpp.language(), SourceLanguage::Cpp);
        let c = index
            .parse_source("b.c", "int y;", &ParseOptions::default())
            .unwrap();
        assert_eq!(c.language(), SourceLanguage::C);
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let mut index = Index::new(IndexOptions::default()).unwrap();
        let err = index
            .parse(Path::new("/definitely/not/here.c"), &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Unreadable { .. }));
    }

    #[test]
    fn test_parse_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shapes.hpp");
        std::fs::write(&path, "namespace geo { int x; }\n").unwrap();

        let mut index = Index::new(IndexOptions::default()).unwrap();
        let unit = index.parse(&path, &ParseOptions::default()).unwrap();
        assert_eq!(unit.path(), path.as_path());
        assert_eq!(unit.language(), SourceLanguage::Cpp);
        assert_eq!(unit.source_len(), 25);
        assert!(!unit.has_errors());
    }

    #[test]
    fn test_diagnostics_serialize() {
        let mut index = Index::new(IndexOptions::default()).unwrap();
        let unit = index
            .parse_source("broken.c", "int ok;\nint f( {\n", &ParseOptions::default())
            .unwrap();
        let json = serde_json::to_value(unit.diagnostics()).unwrap();
        let first = &json[0];
        assert!(first["line"].as_u64().unwrap() >= 1);
        assert!(first["column"].as_u64().unwrap() >= 1);
        assert!(first["message"].is_string());
    }
}
