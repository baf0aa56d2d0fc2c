//! The `luaclang` Lua table
//!
//! `newParser` and `withParser` are the only ways scripts obtain handles;
//! everything else hangs off the handles themselves.

use mlua::{Function, Lua, MultiValue, Result as LuaResult, Table, Value};

use crate::config::SessionOptions;
use crate::error::BindingError;
use crate::handle::{wrap, Handle};
use crate::session::Session;

/// Build the module table
pub fn create_module_table(lua: &Lua) -> LuaResult<Table> {
    let module = lua.create_table()?;

    module.set("VERSION", crate::VERSION)?;
    module.set("newParser", create_new_parser_function(lua)?)?;
    module.set("withParser", create_with_parser_function(lua)?)?;

    Ok(module)
}

/// Set the `luaclang` global
pub fn register(lua: &Lua) -> LuaResult<()> {
    lua.globals().set("luaclang", create_module_table(lua)?)
}

/// Make `require "luaclang"` resolve without a shared library
pub fn preload(lua: &Lua) -> LuaResult<()> {
    let package: Table = lua.globals().get("package")?;
    let preload: Table = package.get("preload")?;
    preload.set(
        "luaclang",
        lua.create_function(|lua, _: MultiValue| create_module_table(lua))?,
    )
}

fn path_argument(value: &Value) -> Result<String, BindingError> {
    match value {
        Value::String(path) => path
            .to_str()
            .map(|path| path.to_string())
            .map_err(|_| BindingError::InvalidArgument("path is not valid UTF-8".to_string())),
        other => Err(BindingError::InvalidArgument(format!(
            "path must be a string, got {}",
            other.type_name()
        ))),
    }
}

fn open_session(lua: &Lua, path: &Value, options: Value) -> LuaResult<Session> {
    let path = path_argument(path)?;
    let options = SessionOptions::from_lua(lua, options)?;
    Ok(Session::open(path, &options)?)
}

/// `luaclang.newParser(path [, options])`
fn create_new_parser_function(lua: &Lua) -> LuaResult<Function> {
    lua.create_function(|lua, (path, options): (Value, Value)| {
        let session = open_session(lua, &path, options)?;
        wrap(lua, session)
    })
}

/// `luaclang.withParser(path, [options,] fn)`
///
/// Runs `fn(parser)` and disposes the parser on every exit path. Returns
/// whatever `fn` returns; errors raised by `fn` propagate unchanged.
fn create_with_parser_function(lua: &Lua) -> LuaResult<Function> {
    lua.create_function(|lua, args: MultiValue| {
        let mut args = args.into_iter();
        let path = args.next().unwrap_or(Value::Nil);
        let (options, callback) = match (args.next(), args.next(), args.next()) {
            (Some(Value::Function(callback)), None, None) => (Value::Nil, callback),
            (Some(options), Some(Value::Function(callback)), None) => (options, callback),
            _ => {
                return Err(BindingError::InvalidArgument(
                    "withParser expects (path, [options,] function)".to_string(),
                )
                .into())
            }
        };

        let session = open_session(lua, &path, options)?;
        let parser = lua.create_userdata(Handle::Session(session))?;
        let result = callback.call::<MultiValue>(parser.clone());

        if let Ok(handle) = parser.borrow::<Handle>() {
            if let Handle::Session(session) = &*handle {
                session.dispose();
            }
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn source_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".c").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn lua_for(file: &tempfile::NamedTempFile) -> Lua {
        let lua = Lua::new();
        register(&lua).unwrap();
        lua.globals()
            .set("path", file.path().display().to_string())
            .unwrap();
        lua
    }

    #[test]
    fn test_module_table_fields() {
        let lua = Lua::new();
        let module = create_module_table(&lua).unwrap();
        let version: String = module.get("VERSION").unwrap();
        assert_eq!(version, crate::VERSION);
        assert!(module.get::<Function>("newParser").is_ok());
        assert!(module.get::<Function>("withParser").is_ok());
    }

    #[test]
    fn test_new_parser_rejects_bad_path() {
        let lua = Lua::new();
        register(&lua).unwrap();
        let message: String = lua
            .load(
                r#"
                local ok, err = pcall(luaclang.newParser, 42)
                assert(not ok)
                return tostring(err)
                "#,
            )
            .eval()
            .unwrap();
        assert!(message.contains("InvalidArgument"), "{}", message);
    }

    #[test]
    fn test_with_parser_returns_results_and_disposes() {
        let file = source_file("int x;");
        let lua = lua_for(&file);
        lua.load(
            r#"
            local kept
            local a, b = luaclang.withParser(path, function(parser)
                kept = parser
                return parser:getCursor():getKind(), 7
            end)
            assert(a == "Unexposed" and b == 7)
            assert(kept:isDisposed())
            "#,
        )
        .exec()
        .unwrap();
    }

    #[test]
    fn test_with_parser_disposes_on_error() {
        let file = source_file("int x;");
        let lua = lua_for(&file);
        lua.load(
            r#"
            local kept
            local ok, err = pcall(luaclang.withParser, path, {}, function(parser)
                kept = parser
                error("script failed")
            end)
            assert(not ok)
            assert(tostring(err):find("script failed"))
            assert(kept:isDisposed())
            "#,
        )
        .exec()
        .unwrap();
    }

    #[test]
    fn test_with_parser_argument_shapes() {
        let file = source_file("int x;");
        let lua = lua_for(&file);
        lua.load(
            r#"
            assert(not pcall(luaclang.withParser, path))
            assert(not pcall(luaclang.withParser, path, {}, "not a function"))
            assert(not pcall(luaclang.withParser, path, {}, function() end, 1))
            assert(luaclang.withParser(path, nil, function() return true end))
            "#,
        )
        .exec()
        .unwrap();
    }

    #[test]
    fn test_preload() {
        let file = source_file("int x;");
        let lua = Lua::new();
        preload(&lua).unwrap();
        lua.globals()
            .set("path", file.path().display().to_string())
            .unwrap();
        lua.load(
            r#"
            local luaclang = require("luaclang")
            local parser = luaclang.newParser(path)
            assert(parser:getCursor() ~= nil)
            parser:disposeParser()
            "#,
        )
        .exec()
        .unwrap();
    }
}
