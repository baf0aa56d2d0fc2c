//! luaclang - C/C++ syntax trees for Lua
//!
//! Exposes parsed C and C++ translation units to Lua 5.4 scripts through a
//! small clang-style API: parsers, cursors and types.
//!
//! # Architecture
//!
//! - **luaclang-engine**: parses sources into an entity arena (tree-sitter)
//! - **session / cursor / ty**: owning and non-owning native handles
//! - **visitor**: the `visitChildren` state machine
//! - **handle / module**: the Lua userdata and the `luaclang` table
//! - **bin/luaclang.rs**: script runner and JSON dumper
//!
//! # Embedding
//!
//! ```rust,no_run
//! let lua = mlua::Lua::new();
//! luaclang::preload(&lua)?;
//! lua.load(r#"
//!     local luaclang = require("luaclang")
//!     luaclang.withParser("add.c", function(parser)
//!         parser:getCursor():visitChildren(function(cursor)
//!             print(cursor:getKind(), cursor:getSpelling())
//!             return "continue"
//!         end)
//!     end)
//! "#).exec()?;
//! # Ok::<(), mlua::Error>(())
//! ```
//!
//! Every binding failure surfaces in Lua as an error whose message starts
//! with its code (`FileNotFound`, `UseAfterDispose`, ...); see
//! [`BindingError`].

pub mod config;
pub mod cursor;
pub mod error;
pub mod handle;
pub mod module;
pub mod names;
pub mod session;
pub mod ty;
pub mod visitor;

pub use config::SessionOptions;
pub use cursor::Cursor;
pub use error::{BindingError, BindingResult};
pub use handle::{Handle, HandleTag};
pub use module::{create_module_table, preload, register};
pub use session::Session;
pub use ty::Type;
pub use visitor::{Directive, VisitError, VisitState, VisitorBridge};

pub use luaclang_engine as engine;

/// Library version, also exposed as `luaclang.VERSION`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point of the loadable module (`require "luaclang"`)
#[cfg(feature = "module")]
#[mlua::lua_module]
fn luaclang(lua: &mlua::Lua) -> mlua::Result<mlua::Table> {
    create_module_table(lua)
}
