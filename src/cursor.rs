//! Cursor handles
//!
//! A `Cursor` names one entity of a session's translation unit. It holds
//! the session's slot rather than the unit itself; every query re-checks
//! that the session is still live.

use std::path::PathBuf;
use std::rc::Rc;

use luaclang_engine::{CursorKind, EntityId, Location, StorageClass, TranslationUnit};

use crate::error::{BindingError, BindingResult};
use crate::names;
use crate::session::UnitSlot;
use crate::ty::Type;

/// Non-owning reference to one AST entity
#[derive(Clone)]
pub struct Cursor {
    slot: Rc<UnitSlot>,
    id: EntityId,
}

impl Cursor {
    pub(crate) fn new(slot: Rc<UnitSlot>, id: EntityId) -> Self {
        Self { slot, id }
    }

    pub(crate) fn slot(&self) -> &Rc<UnitSlot> {
        &self.slot
    }

    pub(crate) fn unit(&self) -> BindingResult<Rc<TranslationUnit>> {
        self.slot.unit("cursor")
    }

    pub fn entity(&self) -> EntityId {
        self.id
    }

    pub fn session_id(&self) -> u64 {
        self.slot.id()
    }

    pub fn spelling(&self) -> BindingResult<String> {
        Ok(self.unit()?.spelling(self.id).to_string())
    }

    pub fn kind(&self) -> BindingResult<CursorKind> {
        Ok(self.unit()?.kind(self.id))
    }

    /// Kind from the fixed script-facing set
    pub fn kind_name(&self) -> BindingResult<&'static str> {
        Ok(names::cursor_kind_name(self.kind()?))
    }

    /// Full engine kind name
    pub fn kind_spelling(&self) -> BindingResult<&'static str> {
        Ok(self.kind()?.spelling())
    }

    /// Type of the entity; `None` if it has none
    pub fn cursor_type(&self) -> BindingResult<Option<Type>> {
        let ty = self.unit()?.cursor_type(self.id);
        Ok(Type::new(self.slot.clone(), ty))
    }

    pub fn storage_class(&self) -> BindingResult<StorageClass> {
        Ok(self.unit()?.storage_class(self.id))
    }

    pub fn num_args(&self) -> BindingResult<usize> {
        let unit = self.unit()?;
        self.require(&unit, "getNumArgs", CursorKind::FunctionDecl, "a FunctionDecl cursor")?;
        Ok(unit.arguments(self.id).len())
    }

    /// 1-based argument of a function declaration
    pub fn arg(&self, index: i64) -> BindingResult<Cursor> {
        let unit = self.unit()?;
        self.require(&unit, "getArgCursor", CursorKind::FunctionDecl, "a FunctionDecl cursor")?;
        let args = unit.arguments(self.id);
        let position = checked_position(index, args.len())?;
        Ok(Cursor::new(self.slot.clone(), args[position]))
    }

    pub fn typedef_underlying(&self) -> BindingResult<Option<Type>> {
        let unit = self.unit()?;
        self.require(
            &unit,
            "getTypedefUnderlyingType",
            CursorKind::TypedefDecl,
            "a TypedefDecl cursor",
        )?;
        Ok(unit
            .typedef_underlying(self.id)
            .and_then(|ty| Type::new(self.slot.clone(), ty.clone())))
    }

    pub fn location(&self) -> BindingResult<(PathBuf, Location)> {
        let unit = self.unit()?;
        Ok((unit.path().to_path_buf(), unit.location(self.id)))
    }

    pub fn referenced(&self) -> BindingResult<Option<Cursor>> {
        Ok(self
            .unit()?
            .referenced(self.id)
            .map(|id| Cursor::new(self.slot.clone(), id)))
    }

    pub fn semantic_parent(&self) -> BindingResult<Option<Cursor>> {
        Ok(self
            .unit()?
            .parent(self.id)
            .map(|id| Cursor::new(self.slot.clone(), id)))
    }

    pub fn is_definition(&self) -> BindingResult<bool> {
        Ok(self.unit()?.is_definition(self.id))
    }

    /// Same translation unit and same entity; both sessions must be live
    pub fn same_entity(&self, other: &Cursor) -> BindingResult<bool> {
        self.unit()?;
        other.unit()?;
        Ok(Rc::ptr_eq(&self.slot, &other.slot) && self.id == other.id)
    }

    fn require(
        &self,
        unit: &TranslationUnit,
        operation: &'static str,
        kind: CursorKind,
        requirement: &'static str,
    ) -> BindingResult<()> {
        let actual = unit.kind(self.id);
        if actual == kind {
            Ok(())
        } else {
            Err(BindingError::precondition(operation, requirement, actual.spelling()))
        }
    }
}

/// Convert a 1-based script index into a 0-based position
pub(crate) fn checked_position(index: i64, count: usize) -> BindingResult<usize> {
    if index >= 1 && (index as u64) <= count as u64 {
        Ok(index as usize - 1)
    } else {
        Err(BindingError::IndexOutOfRange { index, count })
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("session", &self.slot.id())
            .field("entity", &self.id)
            .finish()
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.unit() {
            Ok(unit) => write!(
                f,
                "Cursor({} \"{}\")",
                unit.kind(self.id),
                unit.spelling(self.id)
            ),
            Err(_) => f.write_str("Cursor(disposed)"),
        }
    }
}
