//! Visitor Bridge
//!
//! Adapts the engine's per-node traversal callback to a host callback. One
//! bridge serves one `visitChildren` call and moves `Idle -> Visiting ->
//! Terminated`. A failing callback is recorded, the engine is told to stop,
//! and the failure is returned once the engine has unwound.

use mlua::{Function, Lua, Value};

use luaclang_engine::ChildVisit;

use crate::cursor::Cursor;
use crate::error::{BindingError, BindingResult};
use crate::handle::{wrap, Handle};

/// Continuation requested by a visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Continue,
    Recurse,
    Break,
}

impl Directive {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "continue" => Some(Directive::Continue),
            "recurse" => Some(Directive::Recurse),
            "break" => Some(Directive::Break),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Directive::Continue => "continue",
            Directive::Recurse => "recurse",
            Directive::Break => "break",
        }
    }

    /// Interpret a visitor's return value
    pub fn from_lua(value: &Value) -> BindingResult<Self> {
        let invalid = || BindingError::InvalidVisitorResult(describe(value));
        match value {
            Value::String(s) => {
                let name = s.to_str().map_err(|_| invalid())?;
                Self::from_name(&name).ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }
}

impl From<Directive> for ChildVisit {
    fn from(directive: Directive) -> Self {
        match directive {
            Directive::Continue => ChildVisit::Continue,
            Directive::Recurse => ChildVisit::Recurse,
            Directive::Break => ChildVisit::Break,
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.to_string_lossy()),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => other.type_name().to_string(),
    }
}

/// Bridge lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Idle,
    Visiting,
    Terminated,
}

/// Why a traversal failed
#[derive(Debug)]
pub enum VisitError<E> {
    /// Protocol failure: bad directive, or the session went away mid-walk
    Binding(BindingError),
    /// The host callback itself failed; passed through untouched
    Host(E),
}

impl<E> From<BindingError> for VisitError<E> {
    fn from(err: BindingError) -> Self {
        VisitError::Binding(err)
    }
}

/// Drives one traversal through a host callback
pub struct VisitorBridge<F, E> {
    callback: F,
    state: VisitState,
    failure: Option<VisitError<E>>,
    visited: usize,
}

impl<F, E> VisitorBridge<F, E>
where
    F: FnMut(Cursor, Cursor) -> Result<Directive, VisitError<E>>,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            state: VisitState::Idle,
            failure: None,
            visited: 0,
        }
    }

    pub fn state(&self) -> VisitState {
        self.state
    }

    /// Number of callback invocations so far
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Visit the children of `parent`; `Ok(true)` if a visitor said "break"
    pub fn run(&mut self, parent: &Cursor) -> Result<bool, VisitError<E>> {
        let unit = parent.unit()?;
        let slot = parent.slot().clone();
        self.state = VisitState::Visiting;

        let broke = unit.visit_children(parent.entity(), |child, child_parent| {
            if slot.is_disposed() {
                self.failure = Some(VisitError::Binding(BindingError::UseAfterDispose {
                    what: "cursor",
                }));
                return ChildVisit::Break;
            }

            self.visited += 1;
            let current = Cursor::new(slot.clone(), child);
            let parent = Cursor::new(slot.clone(), child_parent);
            match (self.callback)(current, parent) {
                Ok(directive) => directive.into(),
                Err(err) => {
                    self.failure = Some(err);
                    ChildVisit::Break
                }
            }
        });

        self.state = VisitState::Terminated;
        tracing::trace!(
            session = slot.id(),
            visited = self.visited,
            broke,
            failed = self.failure.is_some(),
            "visit finished"
        );

        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(broke),
        }
    }
}

/// `cursor:visitChildren(fn)` for Lua callbacks
pub(crate) fn visit_with_lua(lua: &Lua, parent: &Cursor, callback: Function) -> mlua::Result<bool> {
    let mut bridge = VisitorBridge::new(|current: Cursor, parent: Cursor| {
        let current = wrap(lua, Handle::Cursor(current)).map_err(VisitError::Host)?;
        let parent = wrap(lua, Handle::Cursor(parent)).map_err(VisitError::Host)?;
        let result: Value = callback
            .call((current, parent))
            .map_err(VisitError::Host)?;
        Ok(Directive::from_lua(&result)?)
    });

    bridge.run(parent).map_err(|err| match err {
        VisitError::Binding(err) => err.into(),
        VisitError::Host(err) => err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionOptions;
    use crate::session::Session;
    use std::io::Write;

    const SOURCE: &str = "int add(int a, int b) { return a + b; }\nint zero;\n";

    fn open() -> (tempfile::NamedTempFile, Session) {
        let mut file = tempfile::Builder::new().suffix(".c").tempfile().unwrap();
        file.write_all(SOURCE.as_bytes()).unwrap();
        let session = Session::open(file.path(), &SessionOptions::default()).unwrap();
        (file, session)
    }

    fn kinds_visited(session: &Session, directive: Directive) -> (Vec<String>, bool) {
        let root = session.root_cursor().unwrap().unwrap();
        let mut seen = Vec::new();
        let mut bridge = VisitorBridge::<_, ()>::new(|cursor: Cursor, _parent: Cursor| {
            seen.push(cursor.kind_spelling().unwrap().to_string());
            Ok(directive)
        });
        let broke = bridge.run(&root).unwrap();
        assert_eq!(bridge.state(), VisitState::Terminated);
        drop(bridge);
        (seen, broke)
    }

    #[test]
    fn test_directive_names() {
        for directive in [Directive::Continue, Directive::Recurse, Directive::Break] {
            assert_eq!(Directive::from_name(directive.name()), Some(directive));
        }
        assert_eq!(Directive::from_name("Continue"), None);
        assert_eq!(Directive::from_name(""), None);
    }

    #[test]
    fn test_break_visits_one_node() {
        let (_file, session) = open();
        let (seen, broke) = kinds_visited(&session, Directive::Break);
        assert_eq!(seen, vec!["FunctionDecl"]);
        assert!(broke);
    }

    #[test]
    fn test_continue_visits_direct_children() {
        let (_file, session) = open();
        let (seen, broke) = kinds_visited(&session, Directive::Continue);
        assert_eq!(seen, vec!["FunctionDecl", "VarDecl"]);
        assert!(!broke);
    }

    #[test]
    fn test_recurse_visits_subtree_in_preorder() {
        let (_file, session) = open();
        let (seen, broke) = kinds_visited(&session, Directive::Recurse);
        assert_eq!(
            seen,
            vec![
                "FunctionDecl",
                "ParmDecl",
                "ParmDecl",
                "CompoundStmt",
                "ReturnStmt",
                "BinaryOperator",
                "DeclRefExpr",
                "DeclRefExpr",
                "VarDecl",
            ]
        );
        assert!(!broke);
    }

    #[test]
    fn test_parent_is_passed() {
        let (_file, session) = open();
        let root = session.root_cursor().unwrap().unwrap();
        let mut bridge = VisitorBridge::<_, ()>::new(|cursor: Cursor, parent: Cursor| {
            let expected = cursor.semantic_parent().unwrap().unwrap();
            assert!(parent.same_entity(&expected).unwrap());
            Ok(Directive::Recurse)
        });
        bridge.run(&root).unwrap();
        assert_eq!(bridge.visited(), 9);
    }

    #[test]
    fn test_host_failure_stops_and_is_returned() {
        let (_file, session) = open();
        let root = session.root_cursor().unwrap().unwrap();
        let mut calls = 0;
        let mut bridge = VisitorBridge::new(|_: Cursor, _: Cursor| {
            calls += 1;
            Err(VisitError::Host("callback exploded"))
        });
        match bridge.run(&root) {
            Err(VisitError::Host(message)) => assert_eq!(message, "callback exploded"),
            other => panic!("unexpected result: {:?}", other),
        }
        drop(bridge);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_dispose_during_visit() {
        let (_file, session) = open();
        let root = session.root_cursor().unwrap().unwrap();
        let mut calls = 0;
        let mut bridge = VisitorBridge::<_, ()>::new(|_: Cursor, _: Cursor| {
            calls += 1;
            session.dispose();
            Ok(Directive::Recurse)
        });
        match bridge.run(&root) {
            Err(VisitError::Binding(err)) => assert_eq!(err.code(), "UseAfterDispose"),
            other => panic!("unexpected result: {:?}", other.map_err(|_| ())),
        }
        drop(bridge);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_run_on_disposed_cursor() {
        let (_file, session) = open();
        let root = session.root_cursor().unwrap().unwrap();
        session.dispose();
        let mut bridge = VisitorBridge::<_, ()>::new(|_: Cursor, _: Cursor| Ok(Directive::Continue));
        assert!(matches!(bridge.run(&root), Err(VisitError::Binding(_))));
        assert_eq!(bridge.state(), VisitState::Idle);
    }

    #[test]
    fn test_directive_from_lua_values() {
        let lua = Lua::new();
        let recurse = Value::String(lua.create_string("recurse").unwrap());
        assert_eq!(Directive::from_lua(&recurse).unwrap(), Directive::Recurse);

        for value in [
            Value::Nil,
            Value::Integer(1),
            Value::Boolean(true),
            Value::String(lua.create_string("stop").unwrap()),
        ] {
            let err = Directive::from_lua(&value).unwrap_err();
            assert_eq!(err.code(), "InvalidVisitorResult");
        }
    }
}
