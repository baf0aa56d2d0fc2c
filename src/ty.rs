//! Type handles

use std::rc::Rc;

use luaclang_engine::{CType, TranslationUnit, TypeKind};

use crate::cursor::{checked_position, Cursor};
use crate::error::{BindingError, BindingResult};
use crate::names;
use crate::session::UnitSlot;

/// Non-owning reference to a semantic type within one session
#[derive(Clone)]
pub struct Type {
    slot: Rc<UnitSlot>,
    ty: Rc<CType>,
}

impl Type {
    /// Wrap `ty`; the invalid type is the null type and yields `None`
    pub(crate) fn new(slot: Rc<UnitSlot>, ty: CType) -> Option<Self> {
        if ty.is_valid() {
            Some(Self {
                slot,
                ty: Rc::new(ty),
            })
        } else {
            None
        }
    }

    fn derive(&self, ty: CType) -> Option<Type> {
        Type::new(self.slot.clone(), ty)
    }

    fn unit(&self) -> BindingResult<Rc<TranslationUnit>> {
        self.slot.unit("type")
    }

    fn live(&self) -> BindingResult<&CType> {
        if self.slot.is_disposed() {
            return Err(BindingError::UseAfterDispose { what: "type" });
        }
        Ok(&self.ty)
    }

    fn require(
        &self,
        operation: &'static str,
        requirement: &'static str,
        accepted: impl Fn(TypeKind) -> bool,
    ) -> BindingResult<&CType> {
        let ty = self.live()?;
        if accepted(ty.kind()) {
            Ok(ty)
        } else {
            Err(BindingError::precondition(operation, requirement, ty.kind().spelling()))
        }
    }

    pub fn spelling(&self) -> BindingResult<String> {
        Ok(self.live()?.spelling())
    }

    pub fn kind(&self) -> BindingResult<TypeKind> {
        Ok(self.live()?.kind())
    }

    pub fn kind_name(&self) -> BindingResult<&'static str> {
        Ok(names::type_kind_name(self.kind()?))
    }

    pub fn is_const(&self) -> BindingResult<bool> {
        Ok(self.live()?.is_const())
    }

    pub fn result_type(&self) -> BindingResult<Option<Type>> {
        let ty = self.require("getResultType", "a function type", TypeKind::is_function)?;
        Ok(ty.result().and_then(|result| self.derive(result.clone())))
    }

    pub fn num_args(&self) -> BindingResult<usize> {
        let ty = self.require("getNumArgs", "a function type", TypeKind::is_function)?;
        Ok(ty.params().map(|params| params.len()).unwrap_or(0))
    }

    /// 1-based parameter type of a function type
    pub fn arg_type(&self, index: i64) -> BindingResult<Option<Type>> {
        let ty = self.require("getArgType", "a function type", TypeKind::is_function)?;
        let params = ty.params().unwrap_or(&[]);
        let position = checked_position(index, params.len())?;
        Ok(self.derive(params[position].clone()))
    }

    pub fn element_type(&self) -> BindingResult<Option<Type>> {
        let ty = self.require("getElementType", "an array type", TypeKind::is_array)?;
        Ok(ty.element().and_then(|element| self.derive(element.clone())))
    }

    pub fn array_size(&self) -> BindingResult<u64> {
        let ty = self.require("getArraySize", "a constant array type", |kind| {
            kind == TypeKind::ConstantArray
        })?;
        ty.array_size()
            .ok_or_else(|| BindingError::precondition("getArraySize", "a constant array type", "unsized array"))
    }

    pub fn pointee_type(&self) -> BindingResult<Option<Type>> {
        let ty = self.require("getPointeeType", "a pointer type", |kind| {
            matches!(kind, TypeKind::Pointer | TypeKind::LValueReference)
        })?;
        Ok(ty.pointee().and_then(|pointee| self.derive(pointee.clone())))
    }

    /// Declaring cursor of a record, enum or typedef type
    pub fn declaration(&self) -> BindingResult<Option<Cursor>> {
        let unit = self.unit()?;
        Ok(unit
            .type_declaration(&self.ty)
            .map(|id| Cursor::new(self.slot.clone(), id)))
    }

    /// The type with typedefs stripped
    pub fn canonical(&self) -> BindingResult<Option<Type>> {
        let unit = self.unit()?;
        Ok(self.derive(unit.canonical(&self.ty)))
    }

    /// Same session and structurally equal
    pub fn same_type(&self, other: &Type) -> BindingResult<bool> {
        self.live()?;
        other.live()?;
        Ok(Rc::ptr_eq(&self.slot, &other.slot) && self.ty == other.ty)
    }
}

impl std::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Type")
            .field("session", &self.slot.id())
            .field("type", &self.ty.spelling())
            .finish()
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.live() {
            Ok(ty) => write!(f, "Type({} \"{}\")", ty.kind(), ty.spelling()),
            Err(_) => f.write_str("Type(disposed)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionOptions;
    use crate::session::Session;
    use std::io::Write;

    const SOURCE: &str = "typedef unsigned int count_t;\n\
                          struct point { int x; int y; };\n\
                          const char *name;\n\
                          int grid[4];\n\
                          count_t total;\n\
                          long scale(struct point *p, double f);\n";

    fn open() -> (tempfile::NamedTempFile, Session) {
        let mut file = tempfile::Builder::new().suffix(".c").tempfile().unwrap();
        file.write_all(SOURCE.as_bytes()).unwrap();
        let session = Session::open(file.path(), &SessionOptions::default()).unwrap();
        (file, session)
    }

    fn declaration(session: &Session, name: &str) -> Cursor {
        let root = session.root_cursor().unwrap().unwrap();
        let unit = root.unit().unwrap();
        let id = unit
            .children(root.entity())
            .iter()
            .copied()
            .find(|id| unit.spelling(*id) == name)
            .unwrap();
        Cursor::new(root.slot().clone(), id)
    }

    fn type_of(session: &Session, name: &str) -> Type {
        declaration(session, name).cursor_type().unwrap().unwrap()
    }

    #[test]
    fn test_pointer_type() {
        let (_file, session) = open();
        let name = type_of(&session, "name");
        assert_eq!(name.kind_name().unwrap(), "Pointer");
        assert_eq!(name.spelling().unwrap(), "const char *");
        let pointee = name.pointee_type().unwrap().unwrap();
        assert_eq!(pointee.kind_name().unwrap(), "Char_S");
        assert!(pointee.is_const().unwrap());
        assert_eq!(
            pointee.pointee_type().unwrap_err().code(),
            "PreconditionViolated"
        );
    }

    #[test]
    fn test_array_type() {
        let (_file, session) = open();
        let grid = type_of(&session, "grid");
        assert_eq!(grid.kind_name().unwrap(), "ConstantArray");
        assert_eq!(grid.array_size().unwrap(), 4);
        assert_eq!(grid.element_type().unwrap().unwrap().kind_name().unwrap(), "Int");
        assert_eq!(
            type_of(&session, "name").array_size().unwrap_err().code(),
            "PreconditionViolated"
        );
    }

    #[test]
    fn test_function_type() {
        let (_file, session) = open();
        let scale = type_of(&session, "scale");
        assert_eq!(scale.kind_name().unwrap(), "FunctionProto");
        assert_eq!(scale.num_args().unwrap(), 2);
        assert_eq!(scale.result_type().unwrap().unwrap().kind_name().unwrap(), "Long");
        let first = scale.arg_type(1).unwrap().unwrap();
        assert_eq!(first.spelling().unwrap(), "struct point *");
        assert_eq!(scale.arg_type(3).unwrap_err().code(), "IndexOutOfRange");

        let record = first.pointee_type().unwrap().unwrap();
        let decl = record.declaration().unwrap().unwrap();
        assert_eq!(decl.kind_name().unwrap(), "StructDecl");
        assert_eq!(decl.spelling().unwrap(), "point");
    }

    #[test]
    fn test_typedef_type() {
        let (_file, session) = open();
        let total = type_of(&session, "total");
        assert_eq!(total.kind_name().unwrap(), "Typedef");
        assert_eq!(total.spelling().unwrap(), "count_t");
        let canonical = total.canonical().unwrap().unwrap();
        assert_eq!(canonical.kind_name().unwrap(), "UInt");

        let typedef = declaration(&session, "count_t");
        let underlying = typedef.typedef_underlying().unwrap().unwrap();
        assert!(underlying.same_type(&canonical).unwrap());
        assert_eq!(total.declaration().unwrap().unwrap().spelling().unwrap(), "count_t");
        assert!(canonical.declaration().unwrap().is_none());
    }

    #[test]
    fn test_types_are_invalidated_by_dispose() {
        let (_file, session) = open();
        let name = type_of(&session, "name");
        session.dispose();
        assert_eq!(name.spelling().unwrap_err().code(), "UseAfterDispose");
        assert_eq!(name.kind_name().unwrap_err().code(), "UseAfterDispose");
        assert_eq!(name.declaration().unwrap_err().code(), "UseAfterDispose");
    }
}
