//! Opaque Handle Wrapper
//!
//! Sessions, cursors and types reach Lua as one userdata type, `Handle`,
//! tagged with what it wraps. Every method re-validates the tag of its
//! receiver, so calling a cursor method with a type (or with a plain table)
//! fails with a binding error instead of misbehaving.

use mlua::{Lua, LuaSerdeExt, MetaMethod, UserData, UserDataMethods, UserDataRef, Value, Variadic};

use crate::cursor::Cursor;
use crate::error::{BindingError, BindingResult};
use crate::names;
use crate::session::Session;
use crate::ty::Type;
use crate::visitor::visit_with_lua;

/// What a handle wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleTag {
    Session,
    Cursor,
    Type,
}

impl std::fmt::Display for HandleTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HandleTag::Session => "parser",
            HandleTag::Cursor => "cursor",
            HandleTag::Type => "type",
        })
    }
}

/// A tagged native value exposed to Lua
#[derive(Debug)]
pub enum Handle {
    Session(Session),
    Cursor(Cursor),
    Type(Type),
}

impl Handle {
    pub fn tag(&self) -> HandleTag {
        match self {
            Handle::Session(_) => HandleTag::Session,
            Handle::Cursor(_) => HandleTag::Cursor,
            Handle::Type(_) => HandleTag::Type,
        }
    }

    fn mismatch(&self, expected: HandleTag) -> BindingError {
        BindingError::TypeMismatch {
            expected,
            found: self.tag(),
        }
    }

    pub fn session(&self) -> BindingResult<&Session> {
        match self {
            Handle::Session(session) => Ok(session),
            other => Err(other.mismatch(HandleTag::Session)),
        }
    }

    pub fn cursor(&self) -> BindingResult<&Cursor> {
        match self {
            Handle::Cursor(cursor) => Ok(cursor),
            other => Err(other.mismatch(HandleTag::Cursor)),
        }
    }

    pub fn ty(&self) -> BindingResult<&Type> {
        match self {
            Handle::Type(ty) => Ok(ty),
            other => Err(other.mismatch(HandleTag::Type)),
        }
    }
}

impl From<Session> for Handle {
    fn from(session: Session) -> Self {
        Handle::Session(session)
    }
}

impl From<Cursor> for Handle {
    fn from(cursor: Cursor) -> Self {
        Handle::Cursor(cursor)
    }
}

impl From<Type> for Handle {
    fn from(ty: Type) -> Self {
        Handle::Type(ty)
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handle::Session(session) if session.is_disposed() => {
                write!(f, "Parser({}, disposed)", session.id())
            }
            Handle::Session(session) => {
                write!(f, "Parser({} \"{}\")", session.id(), session.path().display())
            }
            Handle::Cursor(cursor) => cursor.fmt(f),
            Handle::Type(ty) => ty.fmt(f),
        }
    }
}

// ============================================================================
// Wrapping
// ============================================================================

/// Hand a native value to Lua
pub fn wrap(lua: &Lua, handle: impl Into<Handle>) -> mlua::Result<Value> {
    Ok(Value::UserData(lua.create_userdata(handle.into())?))
}

/// Like [`wrap`], with `None` becoming `nil`
pub fn wrap_optional<H: Into<Handle>>(lua: &Lua, handle: Option<H>) -> mlua::Result<Value> {
    match handle {
        Some(handle) => wrap(lua, handle),
        None => Ok(Value::Nil),
    }
}

/// Borrow the handle inside a Lua value, whatever its tag
pub fn unwrap(value: &Value) -> BindingResult<UserDataRef<Handle>> {
    match value {
        Value::UserData(userdata) => userdata.borrow::<Handle>().map_err(|_| {
            BindingError::InvalidArgument("expected a luaclang handle, got foreign userdata".to_string())
        }),
        other => Err(BindingError::InvalidArgument(format!(
            "expected a luaclang handle, got {}",
            other.type_name()
        ))),
    }
}

/// Borrow the handle inside a Lua value, requiring `expected`
pub fn unwrap_as(value: &Value, expected: HandleTag) -> BindingResult<UserDataRef<Handle>> {
    let handle = unwrap(value)?;
    if handle.tag() != expected {
        return Err(handle.mismatch(expected));
    }
    Ok(handle)
}

/// 1-based index argument
fn index_argument(value: &Value) -> BindingResult<i64> {
    match value {
        Value::Integer(index) => Ok(*index),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(*n as i64),
        other => Err(BindingError::InvalidArgument(format!(
            "index must be an integer, got {}",
            other.type_name()
        ))),
    }
}

// ============================================================================
// Lua Methods
// ============================================================================

impl UserData for Handle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        add_shared_methods(methods);
        add_session_methods(methods);
        add_cursor_methods(methods);
        add_type_methods(methods);

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.to_string()));

        methods.add_meta_function(MetaMethod::Eq, |_, (a, b): (Value, Value)| {
            let (Ok(a), Ok(b)) = (unwrap(&a), unwrap(&b)) else {
                return Ok(false);
            };
            let equal = match (&*a, &*b) {
                (Handle::Cursor(x), Handle::Cursor(y)) => x.same_entity(y)?,
                (Handle::Type(x), Handle::Type(y)) => x.same_type(y)?,
                (Handle::Session(x), Handle::Session(y)) => x.same_session(y),
                _ => false,
            };
            Ok(equal)
        });

        // `local parser <close> = luaclang.newParser(...)`
        methods.add_meta_method(MetaMethod::Close, |_, this, _error: Value| {
            if let Handle::Session(session) = this {
                session.dispose();
            }
            Ok(())
        });
    }
}

/// Methods that exist on both cursors and types
fn add_shared_methods<M: UserDataMethods<Handle>>(methods: &mut M) {
    methods.add_function("getSpelling", |_, this: Value| {
        let handle = unwrap(&this)?;
        match &*handle {
            Handle::Cursor(cursor) => Ok(cursor.spelling()?),
            Handle::Type(ty) => Ok(ty.spelling()?),
            other => Err(other.mismatch(HandleTag::Cursor).into()),
        }
    });

    methods.add_function("getKind", |_, this: Value| {
        let handle = unwrap(&this)?;
        match &*handle {
            Handle::Cursor(cursor) => Ok(cursor.kind_name()?),
            Handle::Type(ty) => Ok(ty.kind_name()?),
            other => Err(other.mismatch(HandleTag::Cursor).into()),
        }
    });

    methods.add_function("getNumArgs", |_, this: Value| {
        let handle = unwrap(&this)?;
        match &*handle {
            Handle::Cursor(cursor) => Ok(cursor.num_args()?),
            Handle::Type(ty) => Ok(ty.num_args()?),
            other => Err(other.mismatch(HandleTag::Cursor).into()),
        }
    });

    methods.add_function("equals", |_, (this, other): (Value, Value)| {
        let handle = unwrap(&this)?;
        match &*handle {
            Handle::Cursor(cursor) => {
                let other = unwrap_as(&other, HandleTag::Cursor)?;
                Ok(cursor.same_entity(other.cursor()?)?)
            }
            Handle::Type(ty) => {
                let other = unwrap_as(&other, HandleTag::Type)?;
                Ok(ty.same_type(other.ty()?)?)
            }
            session => Err(session.mismatch(HandleTag::Cursor).into()),
        }
    });
}

fn add_session_methods<M: UserDataMethods<Handle>>(methods: &mut M) {
    methods.add_function("disposeParser", |_, this: Value| {
        unwrap(&this)?.session()?.dispose();
        Ok(())
    });

    methods.add_function("isDisposed", |_, this: Value| {
        Ok(unwrap(&this)?.session()?.is_disposed())
    });

    methods.add_function("getCursor", |lua, this: Value| {
        let root = unwrap(&this)?.session()?.root_cursor()?;
        wrap_optional(lua, root)
    });

    methods.add_function("getFileName", |_, this: Value| {
        let handle = unwrap(&this)?;
        Ok(handle.session()?.path().display().to_string())
    });

    methods.add_function("getDiagnostics", |lua, this: Value| {
        let diagnostics = unwrap(&this)?.session()?.diagnostics()?;
        lua.to_value(&diagnostics)
    });
}

fn add_cursor_methods<M: UserDataMethods<Handle>>(methods: &mut M) {
    methods.add_function("getKindSpelling", |_, this: Value| {
        Ok(unwrap(&this)?.cursor()?.kind_spelling()?)
    });

    methods.add_function("getType", |lua, this: Value| {
        let ty = unwrap(&this)?.cursor()?.cursor_type()?;
        wrap_optional(lua, ty)
    });

    methods.add_function("getStorageClass", |_, this: Value| {
        let class = unwrap(&this)?.cursor()?.storage_class()?;
        Ok(names::storage_class_name(class))
    });

    methods.add_function("getArgCursor", |lua, (this, index): (Value, Value)| {
        let handle = unwrap(&this)?;
        let cursor = handle.cursor()?;
        let arg = cursor.arg(index_argument(&index)?)?;
        wrap(lua, arg)
    });

    methods.add_function("getTypedefUnderlyingType", |lua, this: Value| {
        let ty = unwrap(&this)?.cursor()?.typedef_underlying()?;
        wrap_optional(lua, ty)
    });

    methods.add_function("getLocation", |_, this: Value| {
        let (path, at) = unwrap(&this)?.cursor()?.location()?;
        Ok((path.display().to_string(), at.line, at.column))
    });

    methods.add_function("getReferenced", |lua, this: Value| {
        let referenced = unwrap(&this)?.cursor()?.referenced()?;
        wrap_optional(lua, referenced)
    });

    methods.add_function("getSemanticParent", |lua, this: Value| {
        let parent = unwrap(&this)?.cursor()?.semantic_parent()?;
        wrap_optional(lua, parent)
    });

    methods.add_function("isDefinition", |_, this: Value| {
        Ok(unwrap(&this)?.cursor()?.is_definition()?)
    });

    methods.add_function(
        "visitChildren",
        |lua, (this, callback, extra): (Value, Value, Variadic<Value>)| {
            if !extra.is_empty() {
                return Err(BindingError::InvalidArgument(
                    "visitChildren takes a single callback; capture extra state in a closure"
                        .to_string(),
                )
                .into());
            }
            let Value::Function(callback) = callback else {
                return Err(BindingError::InvalidArgument(format!(
                    "visitor must be a function, got {}",
                    callback.type_name()
                ))
                .into());
            };
            // release the userdata borrow before any callback runs
            let cursor = unwrap(&this)?.cursor()?.clone();
            visit_with_lua(lua, &cursor, callback)
        },
    );
}

fn add_type_methods<M: UserDataMethods<Handle>>(methods: &mut M) {
    methods.add_function("getResultType", |lua, this: Value| {
        let result = unwrap(&this)?.ty()?.result_type()?;
        wrap_optional(lua, result)
    });

    methods.add_function("getArgType", |lua, (this, index): (Value, Value)| {
        let handle = unwrap(&this)?;
        let arg = handle.ty()?.arg_type(index_argument(&index)?)?;
        wrap_optional(lua, arg)
    });

    methods.add_function("getElementType", |lua, this: Value| {
        let element = unwrap(&this)?.ty()?.element_type()?;
        wrap_optional(lua, element)
    });

    methods.add_function("getArraySize", |_, this: Value| {
        Ok(unwrap(&this)?.ty()?.array_size()?)
    });

    methods.add_function("getPointeeType", |lua, this: Value| {
        let pointee = unwrap(&this)?.ty()?.pointee_type()?;
        wrap_optional(lua, pointee)
    });

    methods.add_function("getTypeDeclaration", |lua, this: Value| {
        let declaration = unwrap(&this)?.ty()?.declaration()?;
        wrap_optional(lua, declaration)
    });

    methods.add_function("getCanonicalType", |lua, this: Value| {
        let canonical = unwrap(&this)?.ty()?.canonical()?;
        wrap_optional(lua, canonical)
    });

    methods.add_function("isConstQualified", |_, this: Value| {
        Ok(unwrap(&this)?.ty()?.is_const()?)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionOptions;
    use std::io::Write;

    fn lua_with_parser(source: &str) -> (tempfile::NamedTempFile, Lua) {
        let mut file = tempfile::Builder::new().suffix(".c").tempfile().unwrap();
        file.write_all(source.as_bytes()).unwrap();
        let lua = Lua::new();
        let session = Session::open(file.path(), &SessionOptions::default()).unwrap();
        let parser = wrap(&lua, session).unwrap();
        lua.globals().set("parser", parser).unwrap();
        (file, lua)
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(HandleTag::Session.to_string(), "parser");
        assert_eq!(HandleTag::Cursor.to_string(), "cursor");
        assert_eq!(HandleTag::Type.to_string(), "type");
    }

    #[test]
    fn test_unwrap_rejects_non_handles() {
        let lua = Lua::new();
        for value in [
            Value::Nil,
            Value::Integer(7),
            Value::String(lua.create_string("cursor").unwrap()),
            Value::Table(lua.create_table().unwrap()),
        ] {
            let err = unwrap(&value).unwrap_err();
            assert_eq!(err.code(), "InvalidArgument");
        }
    }

    #[test]
    fn test_unwrap_as_checks_tag() {
        let (_file, lua) = lua_with_parser("int x;");
        let parser: Value = lua.globals().get("parser").unwrap();
        assert!(unwrap_as(&parser, HandleTag::Session).is_ok());
        let err = unwrap_as(&parser, HandleTag::Cursor).unwrap_err();
        assert_eq!(err.code(), "TypeMismatch");
    }

    #[test]
    fn test_methods_reject_wrong_receiver() {
        let (_file, lua) = lua_with_parser("int x;");
        let message: String = lua
            .load(
                r#"
                local root = parser:getCursor()
                local ok, err = pcall(root.getCursor, root)
                assert(not ok)
                return tostring(err)
                "#,
            )
            .eval()
            .unwrap();
        assert!(message.contains("TypeMismatch"), "{}", message);

        let message: String = lua
            .load(
                r#"
                local root = parser:getCursor()
                local ok, err = pcall(root.getSpelling, {})
                assert(not ok)
                return tostring(err)
                "#,
            )
            .eval()
            .unwrap();
        assert!(message.contains("InvalidArgument"), "{}", message);
    }

    #[test]
    fn test_tostring_and_eq() {
        let (_file, lua) = lua_with_parser("int add(int a, int b);");
        lua.load(
            r#"
            local root = parser:getCursor()
            assert(root == parser:getCursor())
            assert(root ~= parser)
            local add
            root:visitChildren(function(c) add = c; return "break" end)
            assert(tostring(add) == 'Cursor(FunctionDecl "add")', tostring(add))
            assert(tostring(parser):find("^Parser%("))
            assert(add:getType() == add:getType())
            "#,
        )
        .exec()
        .unwrap();
    }

    #[test]
    fn test_index_argument() {
        assert_eq!(index_argument(&Value::Integer(2)).unwrap(), 2);
        assert_eq!(index_argument(&Value::Number(2.0)).unwrap(), 2);
        assert_eq!(
            index_argument(&Value::Number(1.5)).unwrap_err().code(),
            "InvalidArgument"
        );
        assert_eq!(
            index_argument(&Value::Boolean(true)).unwrap_err().code(),
            "InvalidArgument"
        );
    }
}
