//! luaclang-engine: a clang-style C/C++ AST engine
//!
//! Parses C and C++ sources with tree-sitter and exposes the result the way
//! libclang does: an [`Index`] produces [`TranslationUnit`]s, entities are
//! addressed by [`EntityId`] cursors, and every declaration carries a
//! semantic [`CType`].
//!
//! # Example
//!
//! ```
//! use luaclang_engine::{ChildVisit, CursorKind, Index, IndexOptions, ParseOptions};
//!
//! let mut index = Index::new(IndexOptions::default()).unwrap();
//! let unit = index
//!     .parse_source("add.c", "int add(int a, int b) { return a + b; }", &ParseOptions::default())
//!     .unwrap();
//!
//! let mut functions = Vec::new();
//! unit.visit_children(unit.root(), |cursor, _parent| {
//!     if unit.kind(cursor) == CursorKind::FunctionDecl {
//!         functions.push(unit.spelling(cursor).to_string());
//!     }
//!     ChildVisit::Continue
//! });
//! assert_eq!(functions, vec!["add"]);
//! ```

mod builder;
pub mod error;
pub mod index;
pub mod kinds;
pub mod types;
pub mod unit;

pub use error::{EngineError, Result};
pub use index::{Index, IndexOptions, ParseOptions, SourceLanguage};
pub use kinds::{CursorKind, StorageClass, TypeKind};
pub use types::{ArrayExtent, CType, TagKind};
pub use unit::{ChildVisit, Diagnostic, EntityId, Location, TranslationUnit};
