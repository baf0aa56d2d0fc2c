//! Translation units
//!
//! A `TranslationUnit` keeps the native syntax tree together with the entity
//! arena built from it. Entities are numbered in pre-order, so an entity's
//! id is always greater than its parent's and than every entity declared
//! before it in the source.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tree_sitter::Tree;

use crate::builder::Built;
use crate::index::SourceLanguage;
use crate::kinds::{CursorKind, StorageClass, TypeKind};
use crate::types::{CType, TagKind};

/// Identity of one entity inside its translation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub(crate) u32);

impl EntityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 1-based source position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// A syntax diagnostic (error or missing token)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Traversal directive returned by a `visit_children` callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildVisit {
    /// Skip the children of this entity, continue with its next sibling
    Continue,
    /// Visit the children of this entity before its next sibling
    Recurse,
    /// Stop the traversal
    Break,
}

#[derive(Debug, Clone)]
pub(crate) struct Entity {
    pub kind: CursorKind,
    pub spelling: String,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub location: Location,
    pub ty: CType,
    pub storage: StorageClass,
    pub underlying: Option<CType>,
    pub definition: bool,
}

/// How an expression's type follows from its operand's type
enum Derivation {
    Same,
    Call,
    Subscript,
    Deref,
    AddressOf,
    Member(EntityId),
}

/// A parsed source file
pub struct TranslationUnit {
    path: PathBuf,
    language: SourceLanguage,
    tree: Tree,
    source: Vec<u8>,
    entities: Vec<Entity>,
    diagnostics: Vec<Diagnostic>,
    typedefs: HashMap<String, EntityId>,
    tags: HashMap<(TagKind, String), EntityId>,
    values: HashMap<String, Vec<EntityId>>,
}

impl TranslationUnit {
    pub(crate) fn new(
        path: PathBuf,
        language: SourceLanguage,
        tree: Tree,
        source: Vec<u8>,
        built: Built,
    ) -> Self {
        Self {
            path,
            language,
            tree,
            source,
            entities: built.entities,
            diagnostics: built.diagnostics,
            typedefs: built.typedefs,
            tags: built.tags,
            values: built.values,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// The translation-unit cursor
    pub fn root(&self) -> EntityId {
        EntityId(0)
    }

    fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }

    pub fn kind(&self, id: EntityId) -> CursorKind {
        self.entity(id).kind
    }

    pub fn spelling(&self, id: EntityId) -> &str {
        &self.entity(id).spelling
    }

    pub fn location(&self, id: EntityId) -> Location {
        self.entity(id).location
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.entity(id).parent
    }

    pub fn children(&self, id: EntityId) -> &[EntityId] {
        &self.entity(id).children
    }

    pub fn storage_class(&self, id: EntityId) -> StorageClass {
        self.entity(id).storage
    }

    pub fn is_definition(&self, id: EntityId) -> bool {
        self.entity(id).definition
    }

    /// Parameters of a function declaration, in order
    pub fn arguments(&self, id: EntityId) -> Vec<EntityId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.kind(*child) == CursorKind::ParmDecl)
            .collect()
    }

    /// Type aliased by a typedef declaration
    pub fn typedef_underlying(&self, id: EntityId) -> Option<&CType> {
        self.entity(id).underlying.as_ref()
    }

    /// Type of an entity; `TypeKind::Invalid` when it has none
    ///
    /// Expression types are derived from operands. The operand chain is
    /// followed down to a typed entity first, then the derivations are
    /// applied in reverse.
    pub fn cursor_type(&self, id: EntityId) -> CType {
        let mut derivations = Vec::new();
        let mut current = id;

        let mut ty = loop {
            let entity = self.entity(current);
            if entity.ty.is_valid() {
                break entity.ty.clone();
            }

            let (derivation, operand) = match entity.kind {
                CursorKind::DeclRefExpr => (Derivation::Same, self.referenced(current)),
                CursorKind::MemberRefExpr => (Derivation::Member(current), self.first_child(current)),
                CursorKind::ParenExpr | CursorKind::CompoundAssignOperator => {
                    (Derivation::Same, self.first_child(current))
                }
                CursorKind::CallExpr => (Derivation::Call, self.first_child(current)),
                CursorKind::ArraySubscriptExpr => (Derivation::Subscript, self.first_child(current)),
                CursorKind::BinaryOperator => match entity.spelling.as_str() {
                    "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||" => {
                        break CType::builtin(TypeKind::Int)
                    }
                    "," => (Derivation::Same, self.children(current).last().copied()),
                    _ => (Derivation::Same, self.first_child(current)),
                },
                CursorKind::ConditionalOperator => {
                    (Derivation::Same, self.children(current).get(1).copied())
                }
                CursorKind::UnaryOperator => match entity.spelling.as_str() {
                    "*" => (Derivation::Deref, self.first_child(current)),
                    "&" => (Derivation::AddressOf, self.first_child(current)),
                    "!" => break CType::builtin(TypeKind::Int),
                    _ => (Derivation::Same, self.first_child(current)),
                },
                _ => break CType::invalid(),
            };

            let Some(operand) = operand else {
                break CType::invalid();
            };
            derivations.push(derivation);
            current = operand;
        };

        while let Some(derivation) = derivations.pop() {
            ty = match derivation {
                Derivation::Same => ty,
                Derivation::Call => {
                    let callee = self.canonical(&ty);
                    let function = match callee.pointee() {
                        Some(pointee) => self.canonical(pointee),
                        None => callee,
                    };
                    function.result().cloned().unwrap_or_else(CType::invalid)
                }
                Derivation::Subscript => {
                    let base = self.canonical(&ty);
                    base.pointee()
                        .or_else(|| base.element())
                        .cloned()
                        .unwrap_or_else(CType::invalid)
                }
                Derivation::Deref => self
                    .canonical(&ty)
                    .pointee()
                    .cloned()
                    .unwrap_or_else(CType::invalid),
                Derivation::AddressOf if ty.is_valid() => CType::pointer_to(ty),
                Derivation::AddressOf => ty,
                Derivation::Member(member) => self
                    .member_field(&ty, self.spelling(member))
                    .map(|field| self.entity(field).ty.clone())
                    .unwrap_or_else(CType::invalid),
            };
        }
        ty
    }

    fn first_child(&self, id: EntityId) -> Option<EntityId> {
        self.children(id).first().copied()
    }

    /// Field `name` of the record `base` points to or names
    fn member_field(&self, base: &CType, name: &str) -> Option<EntityId> {
        let base = self.canonical(base);
        let record = match base.pointee() {
            Some(pointee) => self.canonical(pointee),
            None => base,
        };
        let decl = self.type_declaration(&record)?;
        self.children(decl).iter().copied().find(|field| {
            self.kind(*field) == CursorKind::FieldDecl && self.spelling(*field) == name
        })
    }

    /// Strip typedef sugar, keeping qualifiers
    pub fn canonical(&self, ty: &CType) -> CType {
        let mut current = ty.clone();
        for _ in 0..64 {
            let Some((TagKind::Typedef, _)) = current.tag_name() else {
                break;
            };
            let Some(underlying) = self
                .type_declaration(&current)
                .and_then(|decl| self.typedef_underlying(decl))
            else {
                break;
            };
            current = underlying
                .clone()
                .with_qualifiers(current.is_const(), current.is_volatile());
        }
        current
    }

    /// Declaration of a record, enum or typedef type
    pub fn type_declaration(&self, ty: &CType) -> Option<EntityId> {
        let (tag, name) = ty.tag_name()?;
        match tag {
            TagKind::Typedef => self.typedefs.get(name).copied(),
            _ => self.tags.get(&(tag, name.to_string())).copied(),
        }
    }

    /// Entity referenced by a reference or expression; declarations refer to themselves
    pub fn referenced(&self, id: EntityId) -> Option<EntityId> {
        let entity = self.entity(id);
        if entity.kind.is_declaration() {
            return Some(id);
        }

        match entity.kind {
            CursorKind::DeclRefExpr | CursorKind::CallExpr => {
                self.lookup_value(&entity.spelling, id)
            }
            CursorKind::TypeRef => self.type_declaration(&entity.ty),
            CursorKind::MemberRefExpr => {
                let base = self.first_child(id).map(|child| self.cursor_type(child))?;
                self.member_field(&base, &entity.spelling)
            }
            _ => None,
        }
    }

    /// Resolve `name` as seen from entity `at`: the latest visible declaration
    fn lookup_value(&self, name: &str, at: EntityId) -> Option<EntityId> {
        if name.is_empty() {
            return None;
        }
        let candidates = self.values.get(name)?;
        let visible = |candidate: &&EntityId| match self.scope_of(**candidate) {
            Some(scope) => self.is_ancestor_or_self(scope, at),
            None => false,
        };

        candidates
            .iter()
            .filter(visible)
            .filter(|candidate| **candidate < at)
            .max()
            .or_else(|| {
                candidates
                    .iter()
                    .filter(visible)
                    .filter(|candidate| self.kind(**candidate) == CursorKind::FunctionDecl)
                    .min()
            })
            .copied()
    }

    fn scope_of(&self, id: EntityId) -> Option<EntityId> {
        let mut current = self.parent(id);
        while let Some(ancestor) = current {
            if self.kind(ancestor).opens_scope() {
                return Some(ancestor);
            }
            current = self.parent(ancestor);
        }
        None
    }

    fn is_ancestor_or_self(&self, ancestor: EntityId, mut id: EntityId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent(id) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    /// Depth-first traversal of the children of `parent`
    ///
    /// `visitor` receives each entity with its parent and decides whether to
    /// descend into it. Returns `true` if the traversal was stopped with
    /// [`ChildVisit::Break`].
    pub fn visit_children<F>(&self, parent: EntityId, mut visitor: F) -> bool
    where
        F: FnMut(EntityId, EntityId) -> ChildVisit,
    {
        let mut stack: Vec<(EntityId, usize)> = vec![(parent, 0)];

        while let Some(frame) = stack.last_mut() {
            let (current, position) = *frame;
            let Some(&child) = self.children(current).get(position) else {
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match visitor(child, current) {
                ChildVisit::Break => return true,
                ChildVisit::Continue => {}
                ChildVisit::Recurse => stack.push((child, 0)),
            }
        }

        false
    }
}

impl std::fmt::Debug for TranslationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationUnit")
            .field("path", &self.path)
            .field("language", &self.language)
            .field("entities", &self.entities.len())
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}
